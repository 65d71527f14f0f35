use super::*;
use crate::module::ModuleBuilder;
use crate::rewrite::one_step;
use crate::signature::{OpAttrs, SignatureBuilder};
use crate::test_utils::parse;

/// `0`, `s`, and special operators `double` (hook "double"), `half`
/// (hook "half", data "2"), `tick` (hook "tick") and plain `id`.
fn hooked_module() -> Module {
    let mut sig = SignatureBuilder::new();
    let nat = sig.sort("Nat");
    sig.op("0", &[], nat, OpAttrs::ctor()).unwrap();
    sig.op("s", &[nat], nat, OpAttrs::ctor()).unwrap();
    sig.op("double", &[nat], nat, OpAttrs::free().special("double", &[]))
        .unwrap();
    sig.op("half", &[nat], nat, OpAttrs::free().special("half", &["2"]))
        .unwrap();
    sig.op("tick", &[nat], nat, OpAttrs::free().special("tick", &[]))
        .unwrap();
    sig.op("id", &[nat], nat, OpAttrs::free()).unwrap();
    ModuleBuilder::new("HOOKED", sig.build().unwrap())
        .build()
        .unwrap()
}

fn numeral(module: &Module, n: usize) -> TermId {
    let sig = module.signature();
    let terms = module.terms();
    let s = sig.find_op("s", 1).unwrap();
    let mut t = terms.constant(sig.find_op("0", 0).unwrap());
    for _ in 0..n {
        t = terms.app1(s, t);
    }
    t
}

fn value(module: &Module, mut t: TermId) -> Option<usize> {
    let terms = module.terms();
    let s = module.signature().find_op("s", 1)?;
    let mut n = 0;
    while terms.top_op(t) == Some(s) {
        t = terms.args(t)[0];
        n += 1;
    }
    (terms.args(t).is_empty()).then_some(n)
}

fn doubling() -> HookRef {
    Arc::new(|t: TermId, data: &HookData<'_>| -> Option<TermId> {
        let arg = data.module.terms().args(t)[0];
        let n = value(data.module, arg)?;
        Some(numeral(data.module, 2 * n))
    })
}

#[test]
fn equational_hook_runs_during_reduction() {
    let mut m = hooked_module();
    assert!(m.connect_eq_hook(Some("double"), Some(doubling())));
    let t = parse(&m, "double(s(s(0)))");
    assert_eq!(value(&m, m.reduce(t)), Some(4));
}

#[test]
fn hook_sees_reduced_arguments() {
    let mut m = hooked_module();
    m.connect_eq_hook(Some("double"), Some(doubling()));
    let t = parse(&m, "double(double(s(0)))");
    assert_eq!(value(&m, m.reduce(t)), Some(4));
}

#[test]
fn hook_data_carries_declared_words() {
    let mut m = hooked_module();
    let halving: HookRef = Arc::new(|t: TermId, data: &HookData<'_>| -> Option<TermId> {
        let divisor: usize = data.data().first()?.parse().ok()?;
        let n = value(data.module, data.module.terms().args(t)[0])?;
        Some(numeral(data.module, n / divisor))
    });
    m.connect_eq_hook(Some("half"), Some(halving));
    let t = parse(&m, "half(s(s(s(s(0)))))");
    assert_eq!(value(&m, m.reduce(t)), Some(2));
}

#[test]
fn default_hook_covers_special_operators_only() {
    let mut m = hooked_module();
    m.connect_eq_hook(None, Some(doubling()));
    assert_eq!(value(&m, m.reduce(parse(&m, "tick(s(0))"))), Some(2));
    let plain = parse(&m, "id(s(0))");
    assert_eq!(m.reduce(plain), plain);
}

#[test]
fn specific_hook_wins_over_default() {
    let mut m = hooked_module();
    let zero: HookRef = Arc::new(|_: TermId, data: &HookData<'_>| -> Option<TermId> {
        Some(numeral(data.module, 0))
    });
    m.connect_eq_hook(None, Some(zero));
    m.connect_eq_hook(Some("double"), Some(doubling()));
    assert_eq!(value(&m, m.reduce(parse(&m, "double(s(0))"))), Some(2));
    assert_eq!(value(&m, m.reduce(parse(&m, "tick(s(0))"))), Some(0));
}

#[test]
fn disconnecting_removes_the_hook() {
    let mut table = HookTable::new();
    assert!(table.is_empty());
    table.connect_eq_hook(Some("double"), Some(doubling()));
    assert!(!table.is_empty());
    table.connect_eq_hook(Some("double"), None);
    assert!(table.is_empty());
}

#[test]
fn connect_reports_whether_anything_was_bound() {
    let mut table = HookTable::new();
    assert!(!table.connect_eq_hook(Some("double"), None));
    assert!(table.connect_eq_hook(Some("double"), Some(doubling())));
    assert!(table.connect_eq_hook(Some("double"), None));
    assert!(!table.connect_rl_hook(None, None));
    assert!(table.connect_rl_hook(None, Some(doubling())));
    assert!(table.connect_rl_hook(None, None));
}

#[test]
fn undeclared_hook_names_are_not_bound() {
    let mut m = hooked_module();
    assert!(!m.connect_eq_hook(Some("triple"), Some(doubling())));
    assert!(!m.connect_rl_hook(Some("triple"), Some(doubling())));
    assert!(m.hooks().is_empty());
    assert!(m.connect_rl_hook(Some("tick"), Some(doubling())));
}

#[test]
fn rule_hook_adds_a_successor() {
    let mut m = hooked_module();
    let untick: HookRef = Arc::new(|t: TermId, data: &HookData<'_>| -> Option<TermId> {
        Some(data.module.terms().args(t)[0])
    });
    m.connect_rl_hook(Some("tick"), Some(untick));
    let t = parse(&m, "tick(s(0))");
    let steps: Vec<_> = one_step(&m, t).collect();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].rule, None);
    assert_eq!(value(&m, steps[0].result), Some(1));
}

#[test]
fn unhooked_special_operator_is_inert() {
    let m = hooked_module();
    let t = parse(&m, "double(s(0))");
    assert_eq!(m.reduce(t), t);
    assert_eq!(one_step(&m, t).count(), 0);
}
