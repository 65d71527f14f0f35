//! LTL model checking over rewrite graphs.
//!
//! The negated formula is turned into a Büchi automaton and the product of
//! the automaton with the graph is searched with a nested depth-first
//! search. An accepting cycle in the product is a counterexample: a lead-in
//! path from the initial state followed by a cycle of graph states.

use crate::ltl::{BuchiAutomaton, Formula, Literal};
use crate::module::Module;
use crate::term::TermId;
use crate::trace::{debug, debug_span};
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use std::fmt;

/// A graph the model checker can explore. States are numbered from the
/// initial state `0`; successors are requested by index until `None`.
pub trait TransitionSystem {
    fn state_term(&self, state: usize) -> Option<TermId>;

    /// The `index`-th successor of `state`, as the checker should see it.
    fn successor(&mut self, state: usize, index: usize) -> Option<usize>;
}

/// Decides atomic propositions on state terms.
pub trait Labeling {
    fn holds(&self, state: TermId, prop: TermId) -> bool;
}

impl<F> Labeling for F
where
    F: Fn(TermId, TermId) -> bool,
{
    fn holds(&self, state: TermId, prop: TermId) -> bool {
        self(state, prop)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelCheckError {
    /// The module lacks an operator the labeling needs.
    MissingOperator(String),
    /// The graph has no state with this number.
    NoSuchState(usize),
}

impl fmt::Display for ModelCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelCheckError::MissingOperator(name) => {
                write!(f, "module does not declare {}", name)
            }
            ModelCheckError::NoSuchState(s) => write!(f, "no state {}", s),
        }
    }
}

impl std::error::Error for ModelCheckError {}

/// Propositions decided by reducing `state |= prop` and comparing the normal
/// form with `true`. Results are cached per state and proposition.
pub struct SatisfactionLabeling<'m> {
    module: &'m Module,
    true_term: TermId,
    cache: Mutex<HashMap<(TermId, TermId), bool>>,
}

impl<'m> SatisfactionLabeling<'m> {
    pub fn new(module: &'m Module) -> Result<Self, ModelCheckError> {
        let sig = module.signature();
        if sig.find_ops("_|=_", 2).is_empty() {
            return Err(ModelCheckError::MissingOperator("_|=_".to_string()));
        }
        let true_op = sig
            .find_op("true", 0)
            .ok_or_else(|| ModelCheckError::MissingOperator("true".to_string()))?;
        Ok(Self {
            module,
            true_term: module.terms().constant(true_op),
            cache: Mutex::new(HashMap::new()),
        })
    }
}

impl Labeling for SatisfactionLabeling<'_> {
    fn holds(&self, state: TermId, prop: TermId) -> bool {
        if let Some(&known) = self.cache.lock().get(&(state, prop)) {
            return known;
        }
        let module = self.module;
        let terms = module.terms();
        let sig = module.signature();
        let kinds = [terms.kind_of(state), terms.kind_of(prop)];
        let result = sig
            .find_ops("_|=_", 2)
            .iter()
            .find(|&&op| sig.domain_kinds(op) == kinds)
            .is_some_and(|&op| module.reduce(terms.app2(op, state, prop)) == self.true_term);
        self.cache.lock().insert((state, prop), result);
        result
    }
}

/// Outcome of a model checking run. When the formula holds, `lead_in` and
/// `cycle` are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCheckResult {
    pub holds: bool,
    /// Graph states from the initial state up to the start of the cycle,
    /// none of them a lap of the cycle.
    pub lead_in: Vec<usize>,
    /// Graph states repeated forever; the last one steps back to the first.
    pub cycle: Vec<usize>,
    /// Size of the automaton built for the negated formula.
    pub buchi_states: usize,
}

type Product = (usize, usize);

struct Checker<'a, S: TransitionSystem, L: Labeling + ?Sized> {
    system: &'a mut S,
    labeling: &'a L,
    automaton: BuchiAutomaton,
    successors: HashMap<Product, Vec<Product>>,
}

impl<S: TransitionSystem, L: Labeling + ?Sized> Checker<'_, S, L> {
    fn admits(&self, state: usize, literals: &[Literal]) -> bool {
        let Some(term) = self.system.state_term(state) else {
            return false;
        };
        literals
            .iter()
            .all(|l| self.labeling.holds(term, l.prop) == l.positive)
    }

    fn system_successors(&mut self, state: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut index = 0;
        while let Some(next) = self.system.successor(state, index) {
            if !out.contains(&next) {
                out.push(next);
            }
            index += 1;
        }
        out
    }

    fn successors(&mut self, node: Product) -> Vec<Product> {
        if let Some(known) = self.successors.get(&node) {
            return known.clone();
        }
        let (state, buchi) = node;
        let next_states = self.system_successors(state);
        let mut out = Vec::new();
        let buchi_next = self.automaton.states[buchi].successors.clone();
        for &s in &next_states {
            for &b in &buchi_next {
                if self.admits(s, &self.automaton.states[b].literals) {
                    out.push((s, b));
                }
            }
        }
        self.successors.insert(node, out.clone());
        out
    }

    fn initial(&self, state: usize) -> Vec<Product> {
        self.automaton
            .initial
            .iter()
            .filter(|&&b| self.admits(state, &self.automaton.states[b].literals))
            .map(|&b| (state, b))
            .collect()
    }

    fn accepting(&self, node: Product) -> bool {
        self.automaton.states[node.1].accepting
    }

    /// Nested depth-first search; returns the outer path to the seed and
    /// the cycle back to it.
    fn search(&mut self, start: usize) -> Option<(Vec<Product>, Vec<Product>)> {
        let mut outer_seen: HashSet<Product> = HashSet::new();
        let mut inner_seen: HashSet<Product> = HashSet::new();
        for root in self.initial(start) {
            if !outer_seen.insert(root) {
                continue;
            }
            // (node, next successor to try)
            let mut stack: Vec<(Product, usize)> = vec![(root, 0)];
            while let Some(&(node, i)) = stack.last() {
                let succs = self.successors(node);
                if let Some(&next) = succs.get(i) {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    if outer_seen.insert(next) {
                        stack.push((next, 0));
                    }
                    continue;
                }
                if self.accepting(node) {
                    if let Some(cycle) = self.find_cycle(node, &mut inner_seen) {
                        let mut lead_in: Vec<Product> = stack.iter().map(|&(n, _)| n).collect();
                        lead_in.pop();
                        return Some((lead_in, cycle));
                    }
                }
                stack.pop();
            }
        }
        None
    }

    fn find_cycle(&mut self, seed: Product, seen: &mut HashSet<Product>) -> Option<Vec<Product>> {
        let mut stack: Vec<(Product, usize)> = vec![(seed, 0)];
        while let Some(&(node, i)) = stack.last() {
            let succs = self.successors(node);
            let Some(&next) = succs.get(i) else {
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            if next == seed {
                return Some(stack.iter().map(|&(n, _)| n).collect());
            }
            if seen.insert(next) {
                stack.push((next, 0));
            }
        }
        None
    }
}

/// Shortest lasso of graph states behind a product counterexample. The
/// projected cycle may repeat a graph cycle several times, and the lead-in
/// may run through laps of it before the automaton reaches its seed.
fn lasso(mut lead_in: Vec<usize>, mut cycle: Vec<usize>) -> (Vec<usize>, Vec<usize>) {
    let len = cycle.len();
    if let Some(period) =
        (1..len).find(|&p| len % p == 0 && (p..len).all(|i| cycle[i] == cycle[i - p]))
    {
        cycle.truncate(period);
    }
    while !cycle.is_empty() && lead_in.last() == cycle.last() {
        lead_in.pop();
        cycle.rotate_right(1);
    }
    (lead_in, cycle)
}

/// Check `formula` on the paths of `system` from `initial`.
pub fn model_check<S, L>(
    system: &mut S,
    initial: usize,
    formula: &Formula,
    labeling: &L,
) -> Result<ModelCheckResult, ModelCheckError>
where
    S: TransitionSystem,
    L: Labeling + ?Sized,
{
    let _span = debug_span!("model_check", initial).entered();
    if system.state_term(initial).is_none() {
        return Err(ModelCheckError::NoSuchState(initial));
    }
    let automaton = BuchiAutomaton::from_formula(&Formula::not(formula.clone()));
    let buchi_states = automaton.len();
    let mut checker = Checker {
        system,
        labeling,
        automaton,
        successors: HashMap::new(),
    };
    let result = match checker.search(initial) {
        None => ModelCheckResult {
            holds: true,
            lead_in: Vec::new(),
            cycle: Vec::new(),
            buchi_states,
        },
        Some((lead_in, cycle)) => {
            let (lead_in, cycle) = lasso(
                lead_in.into_iter().map(|(s, _)| s).collect(),
                cycle.into_iter().map(|(s, _)| s).collect(),
            );
            ModelCheckResult {
                holds: false,
                lead_in,
                cycle,
                buchi_states,
            }
        }
    };
    debug!(
        holds = result.holds,
        product = checker.successors.len(),
        buchi_states,
        "model check finished"
    );
    Ok(result)
}

#[cfg(test)]
#[path = "tests/model_check.rs"]
mod tests;
