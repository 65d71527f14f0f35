use super::*;
use crate::test_utils::{nat_module, set_module, vending_module};

#[test]
fn parse_constant() {
    let m = nat_module();
    let t = parse_term(&m, "0", None).unwrap();
    let zero = m.signature().find_op("0", 0).unwrap();
    assert_eq!(t, m.terms().constant(zero));
}

#[test]
fn parse_nested_application() {
    let m = nat_module();
    let t = parse_term(&m, "g(s(0), X:Nat)", None).unwrap();
    let terms = m.terms();
    let g = m.signature().find_op("g", 2).unwrap();
    assert_eq!(terms.top_op(t), Some(g));
    assert_eq!(terms.args(t).len(), 2);
}

#[test]
fn whitespace_is_ignored() {
    let m = nat_module();
    assert_eq!(
        parse_term(&m, "  g( s(0) ,X:Nat )  ", None).unwrap(),
        parse_term(&m, "g(s(0),X:Nat)", None).unwrap()
    );
}

#[test]
fn variable_sort_is_the_declared_one() {
    let m = nat_module();
    let t = parse_term(&m, "X:NzNat", None).unwrap();
    let sig = m.signature();
    assert_eq!(m.terms().sort_of(t), sig.find_sort("NzNat").unwrap());
}

#[test]
fn kind_variables_get_the_error_sort() {
    let m = nat_module();
    let t = parse_term(&m, "X:[Nat]", None).unwrap();
    let sorts = m.signature().sorts();
    assert!(sorts.is_error(m.terms().sort_of(t)));
}

#[test]
fn assoc_operators_take_many_arguments() {
    let m = set_module();
    assert_eq!(
        parse_term(&m, "_;_(a, b, c)", None).unwrap(),
        parse_term(&m, "_;_(a, _;_(b, c))", None).unwrap()
    );
}

#[test]
fn overloads_are_resolved_by_kind() {
    let m = vending_module();
    let t = parse_term(&m, "<_>(__(M:Money, a, q))", None).unwrap();
    let state = m.signature().find_sort("State").unwrap();
    assert_eq!(m.terms().kind_of(t), m.signature().sorts().kind(state));
}

#[test]
fn expected_kind_is_enforced() {
    let m = nat_module();
    let nat = m.signature().find_sort("Nat").unwrap();
    let kind = m.signature().sorts().kind(nat);
    assert!(parse_term(&m, "s(0)", Some(kind)).is_ok());

    let v = vending_module();
    let state = v.signature().find_sort("State").unwrap();
    let state_kind = v.signature().sorts().kind(state);
    assert!(parse_term(&v, "$", Some(state_kind)).is_err());
}

// ========== ERROR TESTS ==========

#[test]
fn unknown_operator_fails() {
    let m = nat_module();
    let err = parse_term(&m, "h(0)", None).unwrap_err();
    assert_eq!(err.position, 0);
    assert!(err.message.contains("h"));
}

#[test]
fn unknown_sort_fails() {
    let m = nat_module();
    assert!(parse_term(&m, "X:Int", None).is_err());
}

#[test]
fn unclosed_paren_fails() {
    let m = nat_module();
    assert!(parse_term(&m, "s(0", None).is_err());
}

#[test]
fn trailing_input_fails() {
    let m = nat_module();
    let err = parse_term(&m, "0 0", None).unwrap_err();
    assert_eq!(err.position, 2);
}

#[test]
fn argument_of_wrong_kind_fails() {
    let m = vending_module();
    assert!(parse_term(&m, "<_>(<_>(a))", None).is_err());
}
