//! Reduction, unification and search benchmarks using Criterion.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rwcore::module::{Equation, Rule};
use rwcore::parse::parse_term;
use rwcore::search::{search, SearchType};
use rwcore::signature::OpId;
use rwcore::unify::unify;
use rwcore::{Module, ModuleBuilder, OpAttrs, SignatureBuilder, TermId};

/// Peano naturals with addition and a rule `s(X) => X`.
fn peano() -> (Module, OpId, OpId, OpId) {
    let mut sig = SignatureBuilder::new();
    let nat = sig.sort("Nat");
    let zero = sig.op("0", &[], nat, OpAttrs::ctor()).unwrap();
    let succ = sig.op("s", &[nat], nat, OpAttrs::ctor()).unwrap();
    let plus = sig.op("_+_", &[nat, nat], nat, OpAttrs::free()).unwrap();
    let mut builder = ModuleBuilder::new("PEANO", sig.build().unwrap());
    let (zero_plus, succ_plus, dec) = {
        let t = builder.terms();
        let x = t.var("X", nat);
        let y = t.var("Y", nat);
        let sx = t.app1(succ, x);
        (
            Equation::new(t.app2(plus, t.constant(zero), y), y),
            Equation::new(t.app2(plus, sx, y), t.app1(succ, t.app2(plus, x, y))),
            Rule::new(sx, x).label("dec"),
        )
    };
    builder.equation(zero_plus).equation(succ_plus).rule(dec);
    (builder.build().unwrap(), zero, succ, plus)
}

/// Build a Peano numeral with n successors: s(s(...s(0)...))
fn build_peano(module: &Module, n: u32, zero: OpId, succ: OpId) -> TermId {
    let terms = module.terms();
    let mut result = terms.constant(zero);
    for _ in 0..n {
        result = terms.app1(succ, result);
    }
    result
}

/// Symbol sets under an associative, commutative union with identity.
fn sets() -> Module {
    let mut sig = SignatureBuilder::new();
    let symbol = sig.sort("Symbol");
    let set = sig.sort("SymbolSet");
    sig.subsort(symbol, set).unwrap();
    for name in ["a", "b", "c", "d"] {
        sig.op(name, &[], symbol, OpAttrs::ctor()).unwrap();
    }
    let none = sig.op("none", &[], set, OpAttrs::ctor()).unwrap();
    sig.op("_;_", &[set, set], set, OpAttrs::acu(none)).unwrap();
    ModuleBuilder::new("SET", sig.build().unwrap())
        .build()
        .unwrap()
}

/// Benchmark equational reduction of n + n.
fn bench_peano_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("peano_add");

    for n in [5, 10, 20] {
        group.bench_with_input(BenchmarkId::new("n", n), &n, |b, &n| {
            let (module, zero, succ, plus) = peano();
            let num = build_peano(&module, n, zero, succ);
            let sum = module.terms().app2(plus, num, num);
            b.iter(|| module.reduce(black_box(sum)));
        });
    }

    group.finish();
}

/// Benchmark ACU unification with a growing number of set variables.
fn bench_acu_unify(c: &mut Criterion) {
    let mut group = c.benchmark_group("acu_unify");
    let cases = [
        ("two_vars", "_;_(S:SymbolSet, T:SymbolSet)", "_;_(a, b, c)"),
        ("three_vars", "_;_(S:SymbolSet, T:SymbolSet, U:SymbolSet)", "_;_(a, b, c)"),
        ("both_sides", "_;_(a, S:SymbolSet)", "_;_(X:Symbol, T:SymbolSet)"),
    ];

    for (name, lhs, rhs) in cases {
        group.bench_function(name, |b| {
            let module = sets();
            let l = parse_term(&module, lhs, None).unwrap();
            let r = parse_term(&module, rhs, None).unwrap();
            b.iter(|| unify(&module, black_box(&[(l, r)]), false).unwrap().count());
        });
    }

    group.finish();
}

/// Benchmark breadth-first search down a chain of rule rewrites.
fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    for n in [10, 50] {
        group.bench_with_input(BenchmarkId::new("depth", n), &n, |b, &n| {
            let (module, zero, succ, _) = peano();
            let start = build_peano(&module, n, zero, succ);
            let target = module.terms().constant(zero);
            b.iter(|| {
                search(&module, black_box(start), SearchType::AnySteps, target, None, None).count()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_peano_add, bench_acu_unify, bench_search);
criterion_main!(benches);
