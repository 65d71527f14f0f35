use super::*;
use crate::strategy::Strategy;
use crate::test_utils::{kripke_module, nat_module, parse};

// ========== REWRITE GRAPH TESTS ==========

#[test]
fn states_are_numbered_in_discovery_order() {
    let m = kripke_module(true);
    let mut graph = RewriteGraph::new(&m, parse(&m, "s0"));
    assert_eq!(graph.state_count(), 1);
    assert_eq!(graph.get_next_state(0, 0), Some(1));
    assert_eq!(graph.get_next_state(0, 1), None);
    assert_eq!(graph.get_state_term(1), Some(parse(&m, "s1")));
    assert_eq!(graph.get_next_state(1, 0), Some(2));
    assert_eq!(graph.get_next_state(2, 0), Some(1));
    assert_eq!(graph.state_count(), 3);
}

#[test]
fn parents_and_rules_are_recorded() {
    let m = kripke_module(true);
    let mut graph = RewriteGraph::new(&m, parse(&m, "s0"));
    graph.explore();
    let go = m.rules_labelled("go");
    let back = m.rules_labelled("back");
    assert_eq!(graph.get_rule(0, 0), Some(go[0]));
    assert_eq!(graph.get_rule(1, 0), Some(go[1]));
    assert_eq!(graph.get_rule(2, 0), Some(back[0]));
    assert_eq!(graph.get_state_parent(0), None);
    assert_eq!(graph.get_state_parent(2), Some(1));
    assert_eq!(graph.get_rule(0, 1), None);
}

#[test]
fn explore_counts_reachable_states() {
    let m = nat_module();
    let mut graph = RewriteGraph::new(&m, parse(&m, "g(s(0), s(0))"));
    assert_eq!(graph.explore(), 4);
}

#[test]
fn duplicate_successors_are_merged() {
    let m = nat_module();
    let mut graph = RewriteGraph::new(&m, parse(&m, "g(s(0), s(s(0)))"));
    assert!(graph.get_next_state(0, 1).is_some());
    assert_eq!(graph.get_next_state(0, 2), None);
}

#[test]
fn initial_state_is_reduced() {
    let m = nat_module();
    let graph = RewriteGraph::new(&m, parse(&m, "_+_(s(0), 0)"));
    assert_eq!(graph.get_state_term(0), Some(parse(&m, "s(0)")));
    assert_eq!(graph.get_state_term(1), None);
}

#[test]
fn deadlocks_loop_for_the_checker_only() {
    let m = kripke_module(false);
    let mut graph = RewriteGraph::new(&m, parse(&m, "s0"));
    assert_eq!(graph.get_next_state(1, 0), None);
    assert_eq!(graph.get_next_state(0, 0), Some(1));
    assert_eq!(graph.get_next_state(1, 0), None);
    assert_eq!(graph.successor(1, 0), Some(1));
    assert_eq!(graph.successor(1, 1), None);
    assert_eq!(graph.successor(0, 0), Some(1));
    assert_eq!(graph.successor(7, 0), None);
}

// ========== STRATEGY GRAPH TESTS ==========

#[test]
fn strategy_graph_follows_rule_steps() {
    let m = nat_module();
    let dec = Strategy::apply("dec");
    let s = Strategy::seq(dec.clone(), dec);
    let mut graph = StrategyRewriteGraph::new(&m, parse(&m, "s(s(0))"), s, &[]).unwrap();
    let rule = m.rules_labelled("dec")[0];
    assert_eq!(graph.get_transition(0, 0), Some(Transition::rule(Some(rule))));
    assert_eq!(graph.get_next_state(0, 0), Some(1));
    assert_eq!(graph.get_next_state(1, 0), Some(2));
    assert_eq!(graph.get_state_term(2), Some(parse(&m, "0")));
    assert!(graph.is_solution(2));
    assert!(!graph.is_solution(1));
}

#[test]
fn finished_strategy_is_a_solution_loop() {
    let m = nat_module();
    let mut graph =
        StrategyRewriteGraph::new(&m, parse(&m, "s(0)"), Strategy::apply("dec"), &[]).unwrap();
    assert_eq!(graph.get_next_state(0, 0), Some(1));
    assert_eq!(graph.get_transition(1, 0), Some(Transition::solution()));
    assert_eq!(graph.get_next_state(1, 0), Some(1));
    assert_eq!(graph.get_next_state(1, 1), None);
}

#[test]
fn same_term_may_appear_in_several_states() {
    let m = nat_module();
    let s = Strategy::union(vec![Strategy::apply("dec"), Strategy::idle()]);
    let mut graph = StrategyRewriteGraph::new(&m, parse(&m, "s(0)"), s, &[]).unwrap();
    let kinds: Vec<TransitionKind> = (0..2)
        .filter_map(|i| graph.get_transition(0, i))
        .map(|t| t.kind)
        .collect();
    assert_eq!(kinds, vec![TransitionKind::RuleApplication, TransitionKind::Solution]);
    assert_eq!(graph.get_next_state(0, 1), Some(0));
}

#[test]
fn opaque_calls_collapse_into_one_transition() {
    let m = nat_module();
    let mut graph = StrategyRewriteGraph::new(
        &m,
        parse(&m, "s(s(0))"),
        Strategy::call("down"),
        &["down"],
    )
    .unwrap();
    assert_eq!(graph.get_transition(0, 0), Some(Transition::opaque("down")));
    let next = graph.get_next_state(0, 0).unwrap();
    assert_eq!(graph.get_state_term(next), Some(parse(&m, "0")));
    assert!(graph.is_solution(next));
    assert_eq!(graph.get_transition(0, 1), None);
}

#[test]
fn unknown_strategies_are_rejected() {
    let m = nat_module();
    let result = StrategyRewriteGraph::new(&m, parse(&m, "0"), Strategy::call("nope"), &[]);
    assert!(matches!(result, Err(StrategyError::UnknownStrategy(name)) if name == "nope"));
}

#[test]
fn failed_branches_have_no_successors() {
    let m = nat_module();
    let s = Strategy::seq(Strategy::apply("dec"), Strategy::fail());
    let mut graph = StrategyRewriteGraph::new(&m, parse(&m, "s(0)"), s, &[]).unwrap();
    assert_eq!(graph.get_next_state(0, 0), Some(1));
    assert_eq!(graph.get_next_state(1, 0), None);
    assert_eq!(graph.successor(1, 0), None);
}
