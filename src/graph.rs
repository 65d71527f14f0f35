//! Explicit state graphs explored on demand.
//!
//! [`RewriteGraph`] has a state per distinct reduced term reachable by rule
//! rewriting; [`StrategyRewriteGraph`] has a state per configuration of the
//! strategy machine, so the same term may appear in several states. Both
//! number states in discovery order from the initial state `0` and expand a
//! state only when one of its successors is requested.

use crate::ltl::Formula;
use crate::model_check::{model_check, Labeling, ModelCheckError, ModelCheckResult, TransitionSystem};
use crate::module::{Module, RuleId};
use crate::rewrite::{one_step, OneStep};
use crate::strategy::{check_calls, StrategyError, StrategyRef};
use crate::strategy_exec::{step, Config};
use crate::term::TermId;
use crate::trace::trace;
use hashbrown::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    RuleApplication,
    /// A call run to completion as a single step.
    OpaqueStrategy,
    /// The strategy finished; the state loops on itself.
    Solution,
}

/// Label of an edge in a strategy graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transition {
    pub kind: TransitionKind,
    /// The applied rule, `None` for a rule hook.
    pub rule: Option<RuleId>,
    pub strategy: Option<String>,
}

impl Transition {
    pub fn rule(rule: Option<RuleId>) -> Self {
        Self {
            kind: TransitionKind::RuleApplication,
            rule,
            strategy: None,
        }
    }

    pub fn opaque(name: &str) -> Self {
        Self {
            kind: TransitionKind::OpaqueStrategy,
            rule: None,
            strategy: Some(name.to_string()),
        }
    }

    pub fn solution() -> Self {
        Self {
            kind: TransitionKind::Solution,
            rule: None,
            strategy: None,
        }
    }
}

struct GraphState<'m> {
    term: TermId,
    parent: Option<usize>,
    /// Distinct successor states with the first rule that reached each.
    next: Vec<(usize, Option<RuleId>)>,
    pending: Option<OneStep<'m>>,
}

/// States reachable from a term by rule rewriting.
pub struct RewriteGraph<'m> {
    module: &'m Module,
    states: Vec<GraphState<'m>>,
    index: HashMap<TermId, usize>,
}

impl<'m> RewriteGraph<'m> {
    /// The initial state is the reduced form of `term`.
    pub fn new(module: &'m Module, term: TermId) -> Self {
        let mut graph = Self {
            module,
            states: Vec::new(),
            index: HashMap::new(),
        };
        graph.intern(module.reduce(term), None);
        graph
    }

    fn intern(&mut self, term: TermId, parent: Option<usize>) -> usize {
        if let Some(&i) = self.index.get(&term) {
            return i;
        }
        let i = self.states.len();
        self.states.push(GraphState {
            term,
            parent,
            next: Vec::new(),
            pending: Some(one_step(self.module, term)),
        });
        self.index.insert(term, i);
        i
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn get_state_term(&self, state: usize) -> Option<TermId> {
        self.states.get(state).map(|s| s.term)
    }

    /// The state this one was first reached from.
    pub fn get_state_parent(&self, state: usize) -> Option<usize> {
        self.states.get(state).and_then(|s| s.parent)
    }

    /// The `index`-th distinct successor of `state`, computing successors
    /// only as far as needed.
    pub fn get_next_state(&mut self, state: usize, index: usize) -> Option<usize> {
        loop {
            let s = self.states.get_mut(state)?;
            if let Some(&(next, _)) = s.next.get(index) {
                return Some(next);
            }
            let pending = s.pending.as_mut()?;
            let Some(rewrite) = pending.next() else {
                s.pending = None;
                return None;
            };
            let next = self.intern(rewrite.result, Some(state));
            let edges = &mut self.states[state].next;
            if !edges.iter().any(|&(n, _)| n == next) {
                trace!(from = state, to = next, "graph edge");
                edges.push((next, rewrite.rule));
            }
        }
    }

    /// Rule of the transition to the `index`-th successor of `state`.
    pub fn get_rule(&mut self, state: usize, index: usize) -> Option<RuleId> {
        self.get_next_state(state, index)?;
        self.states[state].next[index].1
    }

    /// Expand every reachable state.
    pub fn explore(&mut self) -> usize {
        let mut state = 0;
        while state < self.states.len() {
            let mut i = 0;
            while self.get_next_state(state, i).is_some() {
                i += 1;
            }
            state += 1;
        }
        self.states.len()
    }

    /// Check `formula` from the initial state; propositions are decided by
    /// `labeling`.
    pub fn model_check<L: Labeling + ?Sized>(
        &mut self,
        formula: &Formula,
        labeling: &L,
    ) -> Result<ModelCheckResult, ModelCheckError> {
        model_check(self, 0, formula, labeling)
    }
}

impl TransitionSystem for RewriteGraph<'_> {
    fn state_term(&self, state: usize) -> Option<TermId> {
        self.get_state_term(state)
    }

    /// Deadlocked states behave as if they had a self loop.
    fn successor(&mut self, state: usize, index: usize) -> Option<usize> {
        match self.get_next_state(state, index) {
            None if index == 0 => self.states.get(state).map(|_| state),
            next => next,
        }
    }
}

struct StrategyState {
    config: Config,
    next: Option<Vec<(Transition, usize)>>,
}

/// States of the strategy machine reachable from a term.
pub struct StrategyRewriteGraph<'m> {
    module: &'m Module,
    opaque: HashSet<String>,
    states: Vec<StrategyState>,
    index: HashMap<Config, usize>,
}

impl<'m> StrategyRewriteGraph<'m> {
    /// Calls to the strategies named in `opaque` are single transitions.
    pub fn new(
        module: &'m Module,
        term: TermId,
        strategy: StrategyRef,
        opaque: &[&str],
    ) -> Result<Self, StrategyError> {
        check_calls(module, &strategy)?;
        let mut graph = Self {
            module,
            opaque: opaque.iter().map(|s| s.to_string()).collect(),
            states: Vec::new(),
            index: HashMap::new(),
        };
        graph.intern(Config::new(module.reduce(term), strategy));
        Ok(graph)
    }

    fn intern(&mut self, config: Config) -> usize {
        if let Some(&i) = self.index.get(&config) {
            return i;
        }
        let i = self.states.len();
        self.index.insert(config.clone(), i);
        self.states.push(StrategyState { config, next: None });
        i
    }

    fn expand(&mut self, state: usize) -> Option<&[(Transition, usize)]> {
        let s = self.states.get(state)?;
        if s.next.is_none() {
            let successors = step(self.module, &s.config, &self.opaque);
            let mut edges = Vec::with_capacity(successors.len());
            for (transition, config) in successors {
                let next = self.intern(config);
                edges.push((transition, next));
            }
            self.states[state].next = Some(edges);
        }
        self.states[state].next.as_deref()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn get_state_term(&self, state: usize) -> Option<TermId> {
        self.states.get(state).map(|s| s.config.term)
    }

    /// Has the strategy finished in this state?
    pub fn is_solution(&self, state: usize) -> bool {
        self.states.get(state).is_some_and(|s| s.config.is_solution())
    }

    pub fn get_next_state(&mut self, state: usize, index: usize) -> Option<usize> {
        self.expand(state)?.get(index).map(|(_, n)| *n)
    }

    pub fn get_transition(&mut self, state: usize, index: usize) -> Option<Transition> {
        self.expand(state)?.get(index).map(|(t, _)| t.clone())
    }

    pub fn model_check<L: Labeling + ?Sized>(
        &mut self,
        formula: &Formula,
        labeling: &L,
    ) -> Result<ModelCheckResult, ModelCheckError> {
        model_check(self, 0, formula, labeling)
    }
}

impl TransitionSystem for StrategyRewriteGraph<'_> {
    fn state_term(&self, state: usize) -> Option<TermId> {
        self.get_state_term(state)
    }

    fn successor(&mut self, state: usize, index: usize) -> Option<usize> {
        self.get_next_state(state, index)
    }
}

#[cfg(test)]
#[path = "tests/graph.rs"]
mod tests;
