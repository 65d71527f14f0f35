use super::*;
use crate::condition::ConditionFragment;
use crate::test_utils::{nat_module, parse, set_module};

fn root_matches(module: &Module, pattern: &str, subject: &str) -> Vec<Match> {
    let options = MatchOptions::default();
    match_term(module, parse(module, pattern), parse(module, subject), options).collect()
}

// ========== FREE MATCHING TESTS ==========

#[test]
fn free_pattern_binds_variables() {
    let m = nat_module();
    let found = root_matches(&m, "g(X:Nat, s(Y:Nat))", "g(0, s(s(0)))");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].find(&m, "X"), Some(parse(&m, "0")));
    assert_eq!(found[0].find(&m, "Y"), Some(parse(&m, "s(0)")));
    assert!(found[0].context.is_root());
}

#[test]
fn nonlinear_pattern_needs_equal_subterms() {
    let m = nat_module();
    assert_eq!(root_matches(&m, "g(X:Nat, X:Nat)", "g(s(0), s(0))").len(), 1);
    assert!(root_matches(&m, "g(X:Nat, X:Nat)", "g(0, s(0))").is_empty());
}

#[test]
fn variable_sort_restricts_matches() {
    let m = nat_module();
    assert!(root_matches(&m, "s(X:Zero)", "s(s(0))").is_empty());
    assert_eq!(root_matches(&m, "s(X:NzNat)", "s(s(0))").len(), 1);
}

// ========== ACU MATCHING TESTS ==========

#[test]
fn two_element_variables_split_a_pair_both_ways() {
    let m = set_module();
    let found = root_matches(&m, "_;_(X:Symbol, Y:Symbol)", "_;_(a, b)");
    assert_eq!(found.len(), 2);
    let xs: Vec<TermId> = found.iter().filter_map(|x| x.find(&m, "X")).collect();
    assert!(xs.contains(&parse(&m, "a")));
    assert!(xs.contains(&parse(&m, "b")));
}

#[test]
fn set_variable_takes_the_rest() {
    let m = set_module();
    let found = root_matches(&m, "_;_(X:Symbol, S:SymbolSet)", "_;_(a, b, c)");
    assert_eq!(found.len(), 3);
    for mt in &found {
        let x = mt.find(&m, "X").unwrap();
        let s = mt.find(&m, "S").unwrap();
        assert_eq!(
            mt.instantiate(&m, parse(&m, "_;_(X:Symbol, S:SymbolSet)")),
            parse(&m, "_;_(a, b, c)")
        );
        assert_ne!(x, s);
    }
}

#[test]
fn identity_lets_set_variables_be_empty() {
    let m = set_module();
    let found = root_matches(&m, "_;_(S:SymbolSet, T:SymbolSet)", "_;_(a, b)");
    assert_eq!(found.len(), 4);
    assert!(found
        .iter()
        .any(|x| x.find(&m, "S") == Some(parse(&m, "none"))));
}

#[test]
fn extension_matches_part_of_a_list() {
    let m = set_module();
    let pattern = parse(&m, "_;_(a, X:Symbol)");
    let subject = parse(&m, "_;_(a, b, c)");
    let plain: Vec<Match> = match_term(&m, pattern, subject, MatchOptions::default()).collect();
    assert!(plain.is_empty());

    let options = MatchOptions {
        extension: true,
        ..MatchOptions::default()
    };
    let extended: Vec<Match> = match_term(&m, pattern, subject, options).collect();
    assert_eq!(extended.len(), 2);
    for mt in &extended {
        let portion = mt.context.matched_portion(m.terms(), subject).unwrap();
        assert_eq!(portion, mt.instantiate(&m, pattern));
    }
}

// ========== POSITION WINDOW TESTS ==========

#[test]
fn window_limits_match_depth() {
    let m = nat_module();
    let pattern = parse(&m, "s(X:Nat)");
    let subject = parse(&m, "s(s(0))");
    let count = |window: Window| {
        let options = MatchOptions {
            window,
            ..MatchOptions::default()
        };
        match_term(&m, pattern, subject, options).count()
    };
    assert_eq!(count(Window::root()), 1);
    assert_eq!(count(Window::anywhere()), 2);
    assert_eq!(count(Window::between(1, None)), 1);
    assert_eq!(count(Window::between(2, None)), 0);
}

#[test]
fn matches_come_in_preorder() {
    let m = nat_module();
    let options = MatchOptions {
        window: Window::anywhere(),
        ..MatchOptions::default()
    };
    let found: Vec<usize> = match_term(&m, parse(&m, "s(X:Nat)"), parse(&m, "s(s(0))"), options)
        .map(|x| x.context.depth())
        .collect();
    assert_eq!(found, vec![0, 1]);
}

// ========== CONDITION TESTS ==========

#[test]
fn condition_filters_matches() {
    let m = nat_module();
    let cond: Condition = vec![ConditionFragment::Equality(
        parse(&m, "_+_(X:Nat, 0)"),
        parse(&m, "s(0)"),
    )]
    .into();
    let options = MatchOptions {
        condition: Some(cond),
        window: Window::anywhere(),
        extension: false,
    };
    let found: Vec<Match> =
        match_term(&m, parse(&m, "s(X:Nat)"), parse(&m, "s(s(0))"), options).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].find(&m, "X"), Some(parse(&m, "s(0)")));
}

// ========== SUBSUMPTION TESTS ==========

#[test]
fn instance_checks() {
    let m = nat_module();
    assert!(is_instance(&m, parse(&m, "s(s(X:Nat))"), parse(&m, "s(Y:Nat)")));
    assert!(!is_instance(&m, parse(&m, "s(Y:Nat)"), parse(&m, "s(s(X:Nat))")));
    assert!(subsumes(
        &m,
        &[parse(&m, "X:Nat"), parse(&m, "X:Nat")],
        &[parse(&m, "0"), parse(&m, "0")]
    ));
    assert!(!subsumes(
        &m,
        &[parse(&m, "X:Nat"), parse(&m, "X:Nat")],
        &[parse(&m, "0"), parse(&m, "s(0)")]
    ));
}
