use crate::module::{Equation, Module, ModuleBuilder, Rule};
use crate::parse::parse_term;
use crate::signature::{OpAttrs, SignatureBuilder};
use crate::strategy::Strategy;
use crate::term::TermId;

/// Parse a term of `module`, panicking with the parse error.
pub(crate) fn parse(module: &Module, text: &str) -> TermId {
    parse_term(module, text, None).unwrap_or_else(|e| panic!("{}: {}", text, e))
}

/// Naturals in Peano notation.
///
/// ```text
/// sorts Zero NzNat Nat . subsorts Zero NzNat < Nat .
/// ops 0 s _+_ f g ; p : Nat -> Nat
/// eq 0 + Y = Y [variant] .
/// eq s(X) + Y = s(X + Y) [variant] .
/// eq p(s(X)) = X .
/// rl [dec] : s(X) => X .
/// strat down := dec ! .
/// ```
pub(crate) fn nat_module() -> Module {
    let mut sig = SignatureBuilder::new();
    let zero_sort = sig.sort("Zero");
    let nz = sig.sort("NzNat");
    let nat = sig.sort("Nat");
    sig.subsort(zero_sort, nat).unwrap();
    sig.subsort(nz, nat).unwrap();
    let zero = sig.op("0", &[], zero_sort, OpAttrs::ctor()).unwrap();
    let s = sig.op("s", &[nat], nz, OpAttrs::ctor()).unwrap();
    let plus = sig.op("_+_", &[nat, nat], nat, OpAttrs::free()).unwrap();
    let pred = sig.op("p", &[nat], nat, OpAttrs::free()).unwrap();
    sig.op("f", &[nat], nat, OpAttrs::free()).unwrap();
    sig.op("g", &[nat, nat], nat, OpAttrs::free()).unwrap();
    let mut builder = ModuleBuilder::new("NAT", sig.build().unwrap());

    let (zero_plus, succ_plus, pred_succ, dec) = {
        let t = builder.terms();
        let x = t.var("X", nat);
        let y = t.var("Y", nat);
        let z = t.constant(zero);
        let sx = t.app1(s, x);
        (
            Equation::new(t.app2(plus, z, y), y).variant(),
            Equation::new(t.app2(plus, sx, y), t.app1(s, t.app2(plus, x, y))).variant(),
            Equation::new(t.app1(pred, sx), x),
            Rule::new(sx, x).label("dec"),
        )
    };
    builder
        .equation(zero_plus)
        .equation(succ_plus)
        .equation(pred_succ)
        .rule(dec)
        .strategy("down", Strategy::normalize(Strategy::apply("dec")));
    builder.build().unwrap()
}

/// Finite sets of symbols.
///
/// ```text
/// sorts Symbol SymbolSet . subsort Symbol < SymbolSet .
/// ops a b c : -> Symbol . op none : -> SymbolSet .
/// op _;_ : SymbolSet SymbolSet -> SymbolSet [assoc comm id: none] .
/// op h : SymbolSet -> SymbolSet .
/// ```
pub(crate) fn set_module() -> Module {
    let mut sig = SignatureBuilder::new();
    let symbol = sig.sort("Symbol");
    let set = sig.sort("SymbolSet");
    sig.subsort(symbol, set).unwrap();
    for name in ["a", "b", "c"] {
        sig.op(name, &[], symbol, OpAttrs::ctor()).unwrap();
    }
    let none = sig.op("none", &[], set, OpAttrs::ctor()).unwrap();
    sig.op("_;_", &[set, set], set, OpAttrs::acu(none)).unwrap();
    sig.op("h", &[set], set, OpAttrs::free()).unwrap();
    ModuleBuilder::new("SET", sig.build().unwrap())
        .build()
        .unwrap()
}

/// Exclusive or over three constants.
///
/// ```text
/// sorts Elem Xor . subsort Elem < Xor .
/// ops a b c : -> Elem . op mt : -> Xor .
/// op _*_ : Xor Xor -> Xor [assoc comm] .
/// eq X * X = mt [variant] .
/// eq X * X * Z = Z [variant] .
/// eq X * mt = X [variant] .
/// ```
pub(crate) fn xor_module() -> Module {
    let mut sig = SignatureBuilder::new();
    let elem = sig.sort("Elem");
    let xor = sig.sort("Xor");
    sig.subsort(elem, xor).unwrap();
    for name in ["a", "b", "c"] {
        sig.op(name, &[], elem, OpAttrs::ctor()).unwrap();
    }
    let mt = sig.op("mt", &[], xor, OpAttrs::ctor()).unwrap();
    let star = sig.op("_*_", &[xor, xor], xor, OpAttrs::ac()).unwrap();
    let mut builder = ModuleBuilder::new("XOR", sig.build().unwrap());
    let equations = {
        let t = builder.terms();
        let x = t.var("X", xor);
        let z = t.var("Z", xor);
        let mt = t.constant(mt);
        let xx = t.app2(star, x, x);
        [
            Equation::new(xx, mt).variant(),
            Equation::new(t.app2(star, xx, z), z).variant(),
            Equation::new(t.app2(star, x, mt), x).variant(),
        ]
    };
    for eq in equations {
        builder.equation(eq);
    }
    builder.build().unwrap()
}

/// A vending machine taking dollars (`$`) and quarters (`q`).
///
/// ```text
/// sorts Coin Item Marking Money State .
/// subsort Coin < Money . subsorts Money Item < Marking .
/// op empty : -> Money . op __ : Money Money -> Money [assoc comm id: empty] .
/// op __ : Marking Marking -> Marking [assoc comm id: empty] .
/// op <_> : Marking -> State .
/// ops $ q : -> Coin . ops a c : -> Item .
/// eq q q q q M:Marking = $ M:Marking [variant] .
/// rl [buy-c] : < M:Marking $ > => < M:Marking c > [narrowing] .
/// rl [buy-a] : < M:Marking $ > => < M:Marking a q > [narrowing] .
/// ```
pub(crate) fn vending_module() -> Module {
    vending(true)
}

/// [`vending_module`] with the change equation written `q q q q = $`.
pub(crate) fn plain_change_vending_module() -> Module {
    vending(false)
}

fn vending(change_context: bool) -> Module {
    let mut sig = SignatureBuilder::new();
    let coin = sig.sort("Coin");
    let item = sig.sort("Item");
    let marking = sig.sort("Marking");
    let money = sig.sort("Money");
    let state = sig.sort("State");
    sig.subsort(coin, money).unwrap();
    sig.subsort(money, marking).unwrap();
    sig.subsort(item, marking).unwrap();
    let empty = sig.op("empty", &[], money, OpAttrs::ctor()).unwrap();
    let juxt = sig.op("__", &[money, money], money, OpAttrs::acu(empty)).unwrap();
    sig.op("__", &[marking, marking], marking, OpAttrs::acu(empty))
        .unwrap();
    let wrap = sig.op("<_>", &[marking], state, OpAttrs::ctor()).unwrap();
    let dollar = sig.op("$", &[], coin, OpAttrs::ctor()).unwrap();
    let quarter = sig.op("q", &[], coin, OpAttrs::ctor()).unwrap();
    let apple = sig.op("a", &[], item, OpAttrs::ctor()).unwrap();
    let cake = sig.op("c", &[], item, OpAttrs::ctor()).unwrap();
    let mut builder = ModuleBuilder::new("VENDING", sig.build().unwrap());

    let (change, buy_c, buy_a) = {
        let t = builder.terms();
        let mk = t.var("M", marking);
        let q = t.constant(quarter);
        let d = t.constant(dollar);
        let change = if change_context {
            Equation::new(
                t.app(juxt, smallvec::smallvec![q, q, q, q, mk]),
                t.app2(juxt, d, mk),
            )
        } else {
            Equation::new(t.app(juxt, smallvec::smallvec![q, q, q, q]), d)
        };
        let paid = t.app1(wrap, t.app2(juxt, mk, d));
        (
            change.variant(),
            Rule::new(paid, t.app1(wrap, t.app2(juxt, mk, t.constant(cake))))
                .label("buy-c")
                .narrowing(),
            Rule::new(
                paid,
                t.app1(wrap, t.app(juxt, smallvec::smallvec![mk, t.constant(apple), q])),
            )
            .label("buy-a")
            .narrowing(),
        )
    };
    builder.equation(change).rule(buy_c).rule(buy_a);
    builder.build().unwrap()
}

/// Three states with a `_|=_` satisfaction relation.
///
/// ```text
/// sorts State Prop Bool . ops s0 s1 s2 : -> State . ops p q r : -> Prop .
/// ops true false : -> Bool . op _|=_ : State Prop -> Bool .
/// eq s2 |= p = true . eq s1 |= q = true . eq S |= P = false [owise] .
/// rl [go] : s0 => s1 . rl [go] : s1 => s2 . rl [back] : s2 => s1 .
/// ```
///
/// Without `looping`, `s1` is a deadlock: only `s0 => s1` is declared.
pub(crate) fn kripke_module(looping: bool) -> Module {
    let mut sig = SignatureBuilder::new();
    let state = sig.sort("State");
    let prop = sig.sort("Prop");
    let bool_sort = sig.sort("Bool");
    let s0 = sig.op("s0", &[], state, OpAttrs::ctor()).unwrap();
    let s1 = sig.op("s1", &[], state, OpAttrs::ctor()).unwrap();
    let s2 = sig.op("s2", &[], state, OpAttrs::ctor()).unwrap();
    let p = sig.op("p", &[], prop, OpAttrs::ctor()).unwrap();
    let q = sig.op("q", &[], prop, OpAttrs::ctor()).unwrap();
    sig.op("r", &[], prop, OpAttrs::ctor()).unwrap();
    let tt = sig.op("true", &[], bool_sort, OpAttrs::ctor()).unwrap();
    let ff = sig.op("false", &[], bool_sort, OpAttrs::ctor()).unwrap();
    let sat = sig.op("_|=_", &[state, prop], bool_sort, OpAttrs::free()).unwrap();
    let mut builder = ModuleBuilder::new("KRIPKE", sig.build().unwrap());

    let (equations, rules) = {
        let t = builder.terms();
        let (s0, s1, s2) = (t.constant(s0), t.constant(s1), t.constant(s2));
        let (p, q) = (t.constant(p), t.constant(q));
        let (tt, ff) = (t.constant(tt), t.constant(ff));
        let any = t.app2(sat, t.var("S", state), t.var("P", prop));
        let equations = vec![
            Equation::new(t.app2(sat, s2, p), tt),
            Equation::new(t.app2(sat, s1, q), tt),
            Equation::new(any, ff).owise(),
        ];
        let mut rules = vec![Rule::new(s0, s1).label("go")];
        if looping {
            rules.push(Rule::new(s1, s2).label("go"));
            rules.push(Rule::new(s2, s1).label("back"));
        }
        (equations, rules)
    };
    for eq in equations {
        builder.equation(eq);
    }
    for rl in rules {
        builder.rule(rl);
    }
    builder.build().unwrap()
}
