//! Linear temporal logic formulas and their Büchi automata.
//!
//! Formulas are put in negation normal form and translated with the
//! tableau construction of Gerth, Peled, Vardi and Wolper into a
//! generalized Büchi automaton, which is then degeneralized with a
//! counter over the acceptance sets.

use crate::term::TermId;
use hashbrown::{HashMap, HashSet};

/// An LTL formula over atomic propositions given as terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    True,
    False,
    Prop(TermId),
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Implies(Box<Formula>, Box<Formula>),
    Next(Box<Formula>),
    Until(Box<Formula>, Box<Formula>),
    Release(Box<Formula>, Box<Formula>),
    Always(Box<Formula>),
    Eventually(Box<Formula>),
}

impl Formula {
    pub fn prop(t: TermId) -> Self {
        Formula::Prop(t)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(f: Formula) -> Self {
        Formula::Not(Box::new(f))
    }

    pub fn and(a: Formula, b: Formula) -> Self {
        Formula::And(Box::new(a), Box::new(b))
    }

    pub fn or(a: Formula, b: Formula) -> Self {
        Formula::Or(Box::new(a), Box::new(b))
    }

    pub fn implies(a: Formula, b: Formula) -> Self {
        Formula::Implies(Box::new(a), Box::new(b))
    }

    pub fn next(f: Formula) -> Self {
        Formula::Next(Box::new(f))
    }

    pub fn until(a: Formula, b: Formula) -> Self {
        Formula::Until(Box::new(a), Box::new(b))
    }

    pub fn release(a: Formula, b: Formula) -> Self {
        Formula::Release(Box::new(a), Box::new(b))
    }

    pub fn always(f: Formula) -> Self {
        Formula::Always(Box::new(f))
    }

    pub fn eventually(f: Formula) -> Self {
        Formula::Eventually(Box::new(f))
    }

    /// Negation normal form: only `True`, `False`, literals, `And`, `Or`,
    /// `Next`, `Until` and `Release` remain, and `Not` only wraps a `Prop`.
    pub fn nnf(&self) -> Formula {
        self.nnf_with(false)
    }

    fn nnf_with(&self, negated: bool) -> Formula {
        use Formula::*;
        let bin = |a: &Formula, b: &Formula, neg: bool| (a.nnf_with(neg), b.nnf_with(neg));
        match (self, negated) {
            (True, false) | (False, true) => True,
            (True, true) | (False, false) => False,
            (Prop(p), false) => Prop(*p),
            (Prop(p), true) => Formula::not(Prop(*p)),
            (Not(f), n) => f.nnf_with(!n),
            (And(a, b), false) | (Or(a, b), true) => {
                let (a, b) = bin(a, b, negated);
                Formula::and(a, b)
            }
            (Or(a, b), false) | (And(a, b), true) => {
                let (a, b) = bin(a, b, negated);
                Formula::or(a, b)
            }
            (Implies(a, b), false) => Formula::or(a.nnf_with(true), b.nnf_with(false)),
            (Implies(a, b), true) => Formula::and(a.nnf_with(false), b.nnf_with(true)),
            (Next(f), n) => Formula::next(f.nnf_with(n)),
            (Until(a, b), false) | (Release(a, b), true) => {
                let (a, b) = bin(a, b, negated);
                Formula::until(a, b)
            }
            (Release(a, b), false) | (Until(a, b), true) => {
                let (a, b) = bin(a, b, negated);
                Formula::release(a, b)
            }
            (Always(f), false) | (Eventually(f), true) => {
                Formula::release(False, f.nnf_with(negated))
            }
            (Eventually(f), false) | (Always(f), true) => Formula::until(True, f.nnf_with(negated)),
        }
    }

    /// Atomic propositions, in first-occurrence order.
    pub fn props(&self) -> Vec<TermId> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(f) = stack.pop() {
            match f {
                Formula::True | Formula::False => {}
                Formula::Prop(p) => {
                    if !out.contains(p) {
                        out.push(*p);
                    }
                }
                Formula::Not(a)
                | Formula::Next(a)
                | Formula::Always(a)
                | Formula::Eventually(a) => stack.push(a),
                Formula::And(a, b)
                | Formula::Or(a, b)
                | Formula::Implies(a, b)
                | Formula::Until(a, b)
                | Formula::Release(a, b) => {
                    stack.push(b);
                    stack.push(a);
                }
            }
        }
        out
    }
}

/// A literal a Büchi state requires of the system state it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal {
    pub prop: TermId,
    pub positive: bool,
}

/// A state of the degeneralized automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuchiState {
    pub literals: Vec<Literal>,
    pub successors: Vec<usize>,
    pub accepting: bool,
}

/// Büchi automaton; a run reads one system state per automaton state.
#[derive(Debug, Clone)]
pub struct BuchiAutomaton {
    pub states: Vec<BuchiState>,
    pub initial: Vec<usize>,
}

impl BuchiAutomaton {
    /// Automaton accepting exactly the runs that satisfy `formula`.
    pub fn from_formula(formula: &Formula) -> Self {
        let nnf = formula.nnf();
        let nodes = tableau(&nnf);
        degeneralize(&nnf, &nodes)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Tableau node of the construction.
#[derive(Debug, Clone)]
struct Node {
    incoming: HashSet<usize>,
    new: Vec<Formula>,
    old: Vec<Formula>,
    next: Vec<Formula>,
}

/// Pseudo node marking the start.
const INIT: usize = usize::MAX;

fn insert(set: &mut Vec<Formula>, f: Formula) {
    if !set.contains(&f) {
        set.push(f);
    }
}

fn same_set(a: &[Formula], b: &[Formula]) -> bool {
    a.len() == b.len() && a.iter().all(|f| b.contains(f))
}

fn negated(f: &Formula) -> Option<Formula> {
    match f {
        Formula::Prop(p) => Some(Formula::not(Formula::Prop(*p))),
        Formula::Not(inner) => match inner.as_ref() {
            Formula::Prop(p) => Some(Formula::Prop(*p)),
            _ => None,
        },
        _ => None,
    }
}

/// Finished tableau nodes; `incoming` refers to other nodes by index.
fn tableau(formula: &Formula) -> Vec<Node> {
    let mut done: Vec<Node> = Vec::new();
    let mut pending: Vec<Node> = vec![Node {
        incoming: [INIT].into_iter().collect(),
        new: vec![formula.clone()],
        old: Vec::new(),
        next: Vec::new(),
    }];

    while let Some(mut node) = pending.pop() {
        let Some(eta) = node.new.pop() else {
            if let Some(existing) = done
                .iter_mut()
                .find(|d| same_set(&d.old, &node.old) && same_set(&d.next, &node.next))
            {
                existing.incoming.extend(node.incoming);
                continue;
            }
            let index = done.len();
            let successor = Node {
                incoming: [index].into_iter().collect(),
                new: node.next.clone(),
                old: Vec::new(),
                next: Vec::new(),
            };
            done.push(node);
            pending.push(successor);
            continue;
        };
        if node.old.contains(&eta) {
            pending.push(node);
            continue;
        }
        match &eta {
            Formula::False => {}
            Formula::True | Formula::Prop(_) | Formula::Not(_) => {
                let contradiction = negated(&eta).is_some_and(|n| node.old.contains(&n));
                if !contradiction {
                    insert(&mut node.old, eta);
                    pending.push(node);
                }
            }
            Formula::And(a, b) => {
                for f in [a.as_ref(), b.as_ref()] {
                    if !node.old.contains(f) {
                        insert(&mut node.new, f.clone());
                    }
                }
                insert(&mut node.old, eta.clone());
                pending.push(node);
            }
            Formula::Next(a) => {
                insert(&mut node.next, a.as_ref().clone());
                insert(&mut node.old, eta.clone());
                pending.push(node);
            }
            Formula::Or(a, b) | Formula::Until(a, b) | Formula::Release(a, b) => {
                let (first_new, first_next, second_new): (Vec<&Formula>, bool, Vec<&Formula>) =
                    match &eta {
                        Formula::Or(..) => (vec![a], false, vec![b]),
                        Formula::Until(..) => (vec![a], true, vec![b]),
                        _ => (vec![b], true, vec![a, b]),
                    };
                let mut first = node.clone();
                let mut second = node;
                for f in first_new {
                    if !first.old.contains(f) {
                        insert(&mut first.new, f.clone());
                    }
                }
                if first_next {
                    insert(&mut first.next, eta.clone());
                }
                for f in second_new {
                    if !second.old.contains(f) {
                        insert(&mut second.new, f.clone());
                    }
                }
                insert(&mut first.old, eta.clone());
                insert(&mut second.old, eta.clone());
                // Explore `first` before `second`.
                pending.push(second);
                pending.push(first);
            }
            // Not produced by the normal form.
            Formula::Implies(..) | Formula::Always(..) | Formula::Eventually(..) => {
                insert(&mut node.new, eta.nnf());
                pending.push(node);
            }
        }
    }
    done
}

fn untils(formula: &Formula, out: &mut Vec<Formula>) {
    match formula {
        Formula::Until(a, b) => {
            if !out.contains(formula) {
                out.push(formula.clone());
            }
            untils(a, out);
            untils(b, out);
        }
        Formula::And(a, b) | Formula::Or(a, b) | Formula::Release(a, b) | Formula::Implies(a, b) => {
            untils(a, out);
            untils(b, out);
        }
        Formula::Not(a) | Formula::Next(a) | Formula::Always(a) | Formula::Eventually(a) => {
            untils(a, out)
        }
        Formula::True | Formula::False | Formula::Prop(_) => {}
    }
}

fn degeneralize(formula: &Formula, nodes: &[Node]) -> BuchiAutomaton {
    let mut goals = Vec::new();
    untils(formula, &mut goals);
    let accepting_sets: Vec<Vec<bool>> = goals
        .iter()
        .map(|g| {
            let Formula::Until(_, b) = g else {
                return vec![true; nodes.len()];
            };
            nodes
                .iter()
                .map(|n| !n.old.contains(g) || n.old.contains(b))
                .collect()
        })
        .collect();
    let k = accepting_sets.len().max(1);
    let in_set = |set: usize, node: usize| {
        accepting_sets
            .get(set)
            .map_or(true, |s| s[node])
    };

    // State (node, counter) gets index node * k + counter.
    let mut successors_of: HashMap<usize, Vec<usize>> = HashMap::new();
    for (j, n) in nodes.iter().enumerate() {
        for &i in n.incoming.iter() {
            if i != INIT {
                successors_of.entry(i).or_default().push(j);
            }
        }
    }
    let mut states = Vec::with_capacity(nodes.len() * k);
    for (q, n) in nodes.iter().enumerate() {
        let literals: Vec<Literal> = n
            .old
            .iter()
            .filter_map(|f| match f {
                Formula::Prop(p) => Some(Literal {
                    prop: *p,
                    positive: true,
                }),
                Formula::Not(inner) => match inner.as_ref() {
                    Formula::Prop(p) => Some(Literal {
                        prop: *p,
                        positive: false,
                    }),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        let mut next_nodes = successors_of.get(&q).cloned().unwrap_or_default();
        next_nodes.sort_unstable();
        for counter in 0..k {
            let next_counter = if in_set(counter, q) {
                (counter + 1) % k
            } else {
                counter
            };
            states.push(BuchiState {
                literals: literals.clone(),
                successors: next_nodes.iter().map(|&j| j * k + next_counter).collect(),
                accepting: counter == 0 && in_set(0, q),
            });
        }
    }
    let mut initial: Vec<usize> = nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.incoming.contains(&INIT))
        .map(|(q, _)| q * k)
        .collect();
    initial.sort_unstable();
    BuchiAutomaton { states, initial }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> Formula {
        Formula::prop(TermId::from_raw(1))
    }

    fn q() -> Formula {
        Formula::prop(TermId::from_raw(2))
    }

    #[test]
    fn nnf_pushes_negation_to_propositions() {
        let f = Formula::not(Formula::always(p()));
        assert_eq!(f.nnf(), Formula::until(Formula::True, Formula::not(p())));
    }

    #[test]
    fn nnf_removes_implication() {
        let f = Formula::implies(p(), Formula::next(q()));
        assert_eq!(f.nnf(), Formula::or(Formula::not(p()), Formula::next(q())));
    }

    #[test]
    fn double_negation_cancels() {
        assert_eq!(Formula::not(Formula::not(p())).nnf(), p());
    }

    #[test]
    fn props_are_listed_once() {
        let f = Formula::until(p(), Formula::and(q(), p()));
        assert_eq!(f.props(), vec![TermId::from_raw(1), TermId::from_raw(2)]);
    }

    #[test]
    fn false_has_an_empty_language() {
        let automaton = BuchiAutomaton::from_formula(&Formula::False);
        assert!(automaton.initial.is_empty());
    }

    #[test]
    fn eventually_has_an_accepting_state() {
        let automaton = BuchiAutomaton::from_formula(&Formula::eventually(p()));
        assert!(!automaton.initial.is_empty());
        assert!(automaton.states.iter().any(|s| s.accepting));
    }
}
