use super::*;
use crate::test_utils::{nat_module, parse, xor_module};

fn var(module: &Module, text: &str) -> VarId {
    module.terms().is_var(parse(module, text)).unwrap()
}

fn all_variants(module: &Module, text: &str, options: VariantOptions) -> Vec<Variant> {
    let t = parse(module, text);
    variants(module, &[t], options).unwrap().collect()
}

// ========== VARIANT GENERATION TESTS ==========

#[test]
fn ground_term_has_its_normal_form_as_only_variant() {
    let m = xor_module();
    let found = all_variants(&m, "_*_(a, a, b)", VariantOptions::default());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].term(), Some(parse(&m, "b")));
    assert!(found[0].subst.is_empty());
}

#[test]
fn first_variant_is_the_identity() {
    let m = xor_module();
    let t = parse(&m, "_*_(X:Xor, Y:Xor)");
    let first = variants(&m, &[t], VariantOptions::default())
        .unwrap()
        .next()
        .unwrap();
    assert_eq!(first.terms, vec![t]);
    assert!(first.subst.is_empty());
}

#[test]
fn xor_variants_include_cancellation() {
    let m = xor_module();
    let found = all_variants(&m, "_*_(X:Xor, Y:Xor)", VariantOptions::default());
    assert!(found.iter().any(|v| v.term() == Some(parse(&m, "mt"))));
}

#[test]
fn variants_are_sound_instances() {
    let m = xor_module();
    let t = parse(&m, "_*_(X:Xor, Y:Xor)");
    let terms = m.terms();
    for v in variants(&m, &[t], VariantOptions::default()).unwrap() {
        let instance = m.reduce_with(apply_subst(t, &v.subst, terms), EqSet::Variant);
        assert_eq!(Some(instance), v.term());
        assert!(!m.is_reducible(instance, EqSet::Variant));
    }
}

#[test]
fn variable_only_input_has_one_variant() {
    let m = nat_module();
    let found = all_variants(&m, "_+_(0, Y:Nat)", VariantOptions::default());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].term(), Some(parse(&m, "Y:Nat")));
}

#[test]
fn infinite_variant_sets_are_produced_lazily() {
    let m = nat_module();
    let t = parse(&m, "_+_(X:Nat, Y:Nat)");
    let x = var(&m, "X:Nat");
    let zero = parse(&m, "0");
    let first: Vec<Variant> = variants(&m, &[t], VariantOptions::default())
        .unwrap()
        .take(3)
        .collect();
    assert_eq!(first.len(), 3);
    assert!(first.iter().any(|v| {
        v.subst.get(x) == Some(zero) && v.term().is_some_and(|u| m.terms().is_var(u).is_some())
    }));
}

#[test]
fn separate_generators_agree_on_every_prefix() {
    let m = nat_module();
    let t = parse(&m, "_+_(X:Nat, Y:Nat)");
    let first = |n| -> Vec<Variant> {
        variants(&m, &[t], VariantOptions::default())
            .unwrap()
            .take(n)
            .collect()
    };
    let long = first(5);
    assert_eq!(long.len(), 5);
    assert_eq!(first(5), long);
    for n in 1..5 {
        assert_eq!(first(n), long[..n].to_vec());
    }

    let x = xor_module();
    let u = parse(&x, "_*_(X:Xor, Y:Xor)");
    let once: Vec<Variant> = variants(&x, &[u], VariantOptions::default()).unwrap().collect();
    let again: Vec<Variant> = variants(&x, &[u], VariantOptions::default()).unwrap().collect();
    assert_eq!(once, again);
}

#[test]
fn search_reports_input_variables() {
    let m = xor_module();
    let t = parse(&m, "_*_(X:Xor, Y:Xor)");
    let mut search = variants(&m, &[t], VariantOptions::default()).unwrap();
    assert_eq!(search.vars().len(), 2);
    assert_eq!(search.generated(), 1);
    let total = search.by_ref().count();
    assert_eq!(search.generated(), total);
}

// ========== OPTION TESTS ==========

#[test]
fn irredundant_variants_are_a_subset() {
    let m = xor_module();
    let all = all_variants(&m, "_*_(X:Xor, a)", VariantOptions::default());
    let minimal = all_variants(
        &m,
        "_*_(X:Xor, a)",
        VariantOptions {
            irredundant: true,
            ..VariantOptions::default()
        },
    );
    assert!(!minimal.is_empty());
    assert!(minimal.len() <= all.len());
    for v in &minimal {
        assert!(all.contains(v));
    }
}

#[test]
fn constraints_stay_irreducible() {
    let m = xor_module();
    let t = parse(&m, "_*_(X:Xor, Y:Xor)");
    let options = VariantOptions {
        constraints: vec![t],
        ..VariantOptions::default()
    };
    let found: Vec<Variant> = variants(&m, &[t], options).unwrap().collect();
    assert_eq!(found[0].terms, vec![t]);
    assert!(found.iter().all(|v| v.term() != Some(parse(&m, "mt"))));
    let terms = m.terms();
    for v in &found {
        assert!(!m.is_reducible(apply_subst(t, &v.subst, terms), EqSet::Variant));
    }
}

// ========== VARIANT UNIFICATION TESTS ==========

#[test]
fn variant_unification_solves_modulo_equations() {
    let m = xor_module();
    let (l, r) = (parse(&m, "_*_(X:Xor, a)"), parse(&m, "b"));
    let x = var(&m, "X:Xor");
    let found: Vec<Subst> = variant_unify(&m, &[(l, r)], false).unwrap().collect();
    assert!(found.iter().any(|s| s.get(x) == Some(parse(&m, "_*_(a, b)"))));
    let terms = m.terms();
    for sigma in &found {
        assert_eq!(
            m.reduce(apply_subst(l, sigma, terms)),
            m.reduce(apply_subst(r, sigma, terms))
        );
    }
}

#[test]
fn filtered_variant_unifiers_are_a_subset() {
    let m = xor_module();
    let (l, r) = (parse(&m, "_*_(X:Xor, Y:Xor)"), parse(&m, "a"));
    let all: Vec<Subst> = variant_unify(&m, &[(l, r)], false).unwrap().collect();
    let filtered: Vec<Subst> = variant_unify(&m, &[(l, r)], true).unwrap().collect();
    assert!(!filtered.is_empty());
    for s in &filtered {
        assert!(all.contains(s));
    }
}

#[test]
fn variant_unification_sees_normal_forms() {
    let m = nat_module();
    let (l, r) = (parse(&m, "_+_(0, Y:Nat)"), parse(&m, "f(0)"));
    let y = var(&m, "Y:Nat");
    let found: Vec<Subst> = variant_unify(&m, &[(l, r)], false).unwrap().collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get(y), Some(parse(&m, "f(0)")));

    let (l, r) = (parse(&m, "_+_(0, s(Y:Nat))"), parse(&m, "0"));
    assert_eq!(variant_unify(&m, &[(l, r)], false).unwrap().count(), 0);
}

// ========== VARIANT MATCHING TESTS ==========

#[test]
fn variant_matching_instantiates_the_pattern_only() {
    let m = xor_module();
    let pattern = parse(&m, "_*_(X:Xor, a)");
    let subject = parse(&m, "b");
    let x = var(&m, "X:Xor");
    let found: Vec<Subst> = variant_match(&m, &[(pattern, subject)]).unwrap().collect();
    assert!(found.iter().any(|s| s.get(x) == Some(parse(&m, "_*_(a, b)"))));
    for s in &found {
        assert!(s.domain().all(|v| v == x));
    }
}

#[test]
fn subject_variables_are_constants() {
    let m = xor_module();
    let pattern = parse(&m, "a");
    let subject = parse(&m, "Z:Xor");
    assert_eq!(variant_match(&m, &[(pattern, subject)]).unwrap().count(), 0);
}
