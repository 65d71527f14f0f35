use super::*;
use crate::signature::{OpAttrs, SignatureBuilder};
use crate::test_utils::{kripke_module, nat_module, parse, set_module};

// ========== REDUCTION TESTS ==========

#[test]
fn reduce_reaches_normal_form() {
    let m = nat_module();
    let t = parse(&m, "_+_(s(s(0)), s(0))");
    assert_eq!(m.reduce(t), parse(&m, "s(s(s(0)))"));
}

#[test]
fn reduce_counts_equational_steps() {
    let m = nat_module();
    let (nf, steps) = m.reduce_counted(parse(&m, "_+_(s(0), 0)"));
    assert_eq!(nf, parse(&m, "s(0)"));
    assert_eq!(steps, 2);
}

#[test]
fn normal_forms_are_stable() {
    let m = nat_module();
    let nf = m.reduce(parse(&m, "_+_(s(0), s(0))"));
    assert_eq!(m.reduce(nf), nf);
    assert!(!m.is_reducible(nf, EqSet::All));
}

#[test]
fn variant_set_only_uses_variant_equations() {
    let m = nat_module();
    let t = parse(&m, "p(s(0))");
    assert_eq!(m.reduce_with(t, EqSet::Variant), t);
    assert_eq!(m.reduce(t), parse(&m, "0"));
}

#[test]
fn owise_equation_applies_last() {
    let m = kripke_module(true);
    assert_eq!(m.reduce(parse(&m, "_|=_(s2, p)")), parse(&m, "true"));
    assert_eq!(m.reduce(parse(&m, "_|=_(s1, p)")), parse(&m, "false"));
    assert_eq!(m.reduce(parse(&m, "_|=_(s1, q)")), parse(&m, "true"));
}

#[test]
fn stuck_terms_stay_put() {
    let m = nat_module();
    let t = parse(&m, "_+_(X:Nat, 0)");
    assert_eq!(m.reduce(t), t);
}

// ========== MEMBERSHIP TESTS ==========

fn even_module() -> Module {
    let mut sig = SignatureBuilder::new();
    let even = sig.sort("Even");
    let nat = sig.sort("Nat");
    sig.subsort(even, nat).unwrap();
    let zero = sig.op("0", &[], even, OpAttrs::ctor()).unwrap();
    let s = sig.op("s", &[nat], nat, OpAttrs::ctor()).unwrap();
    let mut builder = ModuleBuilder::new("EVEN", sig.build().unwrap());
    let mb = {
        let t = builder.terms();
        let e = t.var("E", even);
        Membership::new(t.app1(s, t.app1(s, e)), even)
    };
    let _ = zero;
    builder.membership(mb);
    builder.build().unwrap()
}

#[test]
fn memberships_refine_least_sorts() {
    let m = even_module();
    let sig = m.signature();
    let even = sig.find_sort("Even").unwrap();
    assert_eq!(m.least_sort(parse(&m, "s(s(0))")), even);
    assert_eq!(sig.sort_name(m.least_sort(parse(&m, "s(0)"))), "Nat");
    assert!(m.has_sort(parse(&m, "s(s(s(s(0))))"), even));
    assert!(!m.has_sort(parse(&m, "s(s(s(0)))"), even));
}

// ========== BUILD CHECK TESTS ==========

#[test]
fn variable_lhs_is_rejected() {
    let mut sig = SignatureBuilder::new();
    let nat = sig.sort("Nat");
    let zero = sig.op("0", &[], nat, OpAttrs::ctor()).unwrap();
    let mut builder = ModuleBuilder::new("BAD", sig.build().unwrap());
    let eq = {
        let t = builder.terms();
        Equation::new(t.var("X", nat), t.constant(zero))
    };
    builder.equation(eq);
    assert!(matches!(builder.build(), Err(ModuleError::VariableLhs(_))));
}

#[test]
fn unbound_rhs_variable_is_rejected() {
    let mut sig = SignatureBuilder::new();
    let nat = sig.sort("Nat");
    let zero = sig.op("0", &[], nat, OpAttrs::ctor()).unwrap();
    let mut builder = ModuleBuilder::new("BAD", sig.build().unwrap());
    let rl = {
        let t = builder.terms();
        Rule::new(t.constant(zero), t.var("Y", nat)).label("oops")
    };
    builder.rule(rl);
    match builder.build() {
        Err(ModuleError::UnboundVariable { statement, var }) => {
            assert_eq!(statement, "rule [oops]");
            assert_eq!(var, "Y");
        }
        other => panic!("expected an unbound variable error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn module_lookups() {
    let m = nat_module();
    assert_eq!(m.name(), "NAT");
    assert_eq!(m.rules_labelled("dec").len(), 1);
    assert!(m.rules_labelled("inc").is_empty());
    assert!(m.strategy("down").is_some());
    assert!(m.has_variant_equations());
    assert!(!set_module().has_variant_equations());
}
