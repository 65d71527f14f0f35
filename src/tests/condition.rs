use super::*;
use crate::test_utils::{kripke_module, nat_module, parse};

fn solve(module: &Module, fragments: Vec<ConditionFragment>, initial: Subst) -> Vec<Subst> {
    ConditionSearch::new(module, fragments.into(), initial).collect()
}

fn binding(module: &Module, var: &str) -> (crate::term::VarId, TermId) {
    let t = parse(module, var);
    (module.terms().is_var(t).unwrap(), t)
}

#[test]
fn empty_condition_returns_the_initial_subst() {
    let m = nat_module();
    let (x, _) = binding(&m, "X:Nat");
    let mut s = Subst::new();
    s.bind(x, parse(&m, "0"));
    assert_eq!(solve(&m, Vec::new(), s.clone()), vec![s]);
}

#[test]
fn equality_compares_normal_forms() {
    let m = nat_module();
    let (x, _) = binding(&m, "X:Nat");
    let mut s = Subst::new();
    s.bind(x, parse(&m, "s(0)"));
    let holds = ConditionFragment::Equality(parse(&m, "_+_(X:Nat, X:Nat)"), parse(&m, "s(s(0))"));
    let fails = ConditionFragment::Equality(parse(&m, "_+_(X:Nat, 0)"), parse(&m, "0"));
    assert_eq!(solve(&m, vec![holds], s.clone()).len(), 1);
    assert!(solve(&m, vec![fails], s).is_empty());
}

#[test]
fn sort_test_uses_the_reduced_term() {
    let m = nat_module();
    let nz = m.signature().find_sort("NzNat").unwrap();
    let zero_sort = m.signature().find_sort("Zero").unwrap();
    let t = parse(&m, "_+_(0, s(0))");
    assert_eq!(
        solve(&m, vec![ConditionFragment::SortTest(t, nz)], Subst::new()).len(),
        1
    );
    assert!(solve(&m, vec![ConditionFragment::SortTest(t, zero_sort)], Subst::new()).is_empty());
}

#[test]
fn assignment_binds_pattern_variables() {
    let m = nat_module();
    let (y, _) = binding(&m, "Y:Nat");
    let fragments = vec![
        ConditionFragment::Assignment(parse(&m, "s(Y:Nat)"), parse(&m, "_+_(s(0), s(0))")),
        ConditionFragment::Equality(parse(&m, "Y:Nat"), parse(&m, "s(0)")),
    ];
    let found = solve(&m, fragments, Subst::new());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get(y), Some(parse(&m, "s(0)")));
}

#[test]
fn unbound_variable_makes_the_fragment_fail() {
    let m = nat_module();
    let fragments = vec![ConditionFragment::Equality(parse(&m, "Z:Nat"), parse(&m, "0"))];
    assert!(solve(&m, fragments, Subst::new()).is_empty());
}

#[test]
fn rewrite_fragment_searches_reachable_terms() {
    let m = kripke_module(true);
    let (s, _) = binding(&m, "S:State");
    let reach_s2 = vec![ConditionFragment::Rewrite(parse(&m, "s0"), parse(&m, "s2"))];
    assert_eq!(solve(&m, reach_s2, Subst::new()).len(), 1);

    let any_state = vec![ConditionFragment::Rewrite(parse(&m, "s0"), parse(&m, "S:State"))];
    let found = solve(&m, any_state, Subst::new());
    let reached: Vec<TermId> = found.iter().filter_map(|x| x.get(s)).collect();
    assert_eq!(reached.len(), 3);
    assert_eq!(reached[0], parse(&m, "s0"));

    let back = vec![ConditionFragment::Rewrite(parse(&m, "s1"), parse(&m, "s0"))];
    assert!(solve(&m, back, Subst::new()).is_empty());
}

#[test]
fn later_fragments_see_earlier_bindings() {
    let m = kripke_module(true);
    let fragments = vec![
        ConditionFragment::Rewrite(parse(&m, "s0"), parse(&m, "S:State")),
        ConditionFragment::Equality(parse(&m, "_|=_(S:State, p)"), parse(&m, "true")),
    ];
    let found = solve(&m, fragments, Subst::new());
    assert_eq!(found.len(), 1);
    let (s, _) = binding(&m, "S:State");
    assert_eq!(found[0].get(s), Some(parse(&m, "s2")));
}
