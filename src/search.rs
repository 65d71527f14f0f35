//! Breadth-first search for reachable states matching a pattern.

use crate::condition::ConditionSearch;
use crate::matching::Matcher;
use crate::module::{Condition, Module, RuleId};
use crate::rewrite::one_step;
use crate::subst::Subst;
use crate::term::TermId;
use hashbrown::HashMap;

use crate::trace::{debug_span, trace};

/// Number of rewrite steps from the initial term to an accepted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchType {
    /// Exactly one step (`=>1`).
    OneStep,
    /// One or more steps (`=>+`).
    AtLeastOne,
    /// Zero or more steps (`=>*`).
    #[default]
    AnySteps,
    /// States without successors (`=>!`).
    NormalForm,
}

impl SearchType {
    fn accepts(self, depth: usize) -> bool {
        match self {
            SearchType::OneStep => depth == 1,
            SearchType::AtLeastOne => depth >= 1,
            SearchType::AnySteps | SearchType::NormalForm => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSolution {
    pub state: usize,
    pub term: TermId,
    pub subst: Subst,
}

#[derive(Debug, Clone)]
struct SearchState {
    term: TermId,
    depth: usize,
    parent: Option<(usize, Option<RuleId>)>,
}

type Solutions<'m> = Box<dyn Iterator<Item = Subst> + 'm>;

/// Lazy breadth-first search. States are numbered in discovery order.
pub struct Search<'m> {
    module: &'m Module,
    pattern: TermId,
    condition: Option<Condition>,
    search_type: SearchType,
    max_depth: Option<usize>,
    initial_subst: Subst,
    states: Vec<SearchState>,
    seen: HashMap<TermId, usize>,
    next_state: usize,
    pending: Option<(usize, Solutions<'m>)>,
    expand_next: Option<usize>,
}

impl<'m> Search<'m> {
    pub fn new(
        module: &'m Module,
        term: TermId,
        search_type: SearchType,
        pattern: TermId,
        condition: Option<Condition>,
        max_depth: Option<usize>,
    ) -> Self {
        Self::with_subst(
            module,
            term,
            search_type,
            pattern,
            condition,
            max_depth,
            Subst::new(),
        )
    }

    /// Search whose pattern matches extend `initial_subst`.
    pub fn with_subst(
        module: &'m Module,
        term: TermId,
        search_type: SearchType,
        pattern: TermId,
        condition: Option<Condition>,
        max_depth: Option<usize>,
        initial_subst: Subst,
    ) -> Self {
        let _span = debug_span!("search", term = term.raw(), ?search_type).entered();
        let root = module.reduce(term);
        let mut seen = HashMap::new();
        seen.insert(root, 0);
        Self {
            module,
            pattern,
            condition,
            search_type,
            max_depth,
            initial_subst,
            states: vec![SearchState {
                term: root,
                depth: 0,
                parent: None,
            }],
            seen,
            next_state: 0,
            pending: None,
            expand_next: None,
        }
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn state_term(&self, state: usize) -> Option<TermId> {
        self.states.get(state).map(|s| s.term)
    }

    /// Terms from the initial state to `state`, each with the rule that
    /// produced it (`None` for the initial term and rule hooks).
    pub fn path_to(&self, state: usize) -> Vec<(TermId, Option<RuleId>)> {
        let mut path = Vec::new();
        let mut current = Some(state);
        while let Some(i) = current {
            let Some(s) = self.states.get(i) else {
                break;
            };
            path.push((s.term, s.parent.and_then(|(_, rule)| rule)));
            current = s.parent.map(|(p, _)| p);
        }
        path.reverse();
        path
    }

    fn can_expand(&self, depth: usize) -> bool {
        if self.search_type == SearchType::OneStep && depth >= 1 {
            return false;
        }
        self.max_depth.map_or(true, |d| depth < d)
    }

    fn expand(&mut self, index: usize) -> bool {
        let (term, depth) = (self.states[index].term, self.states[index].depth);
        let mut any = false;
        for step in one_step(self.module, term) {
            any = true;
            if !self.seen.contains_key(&step.result) {
                let id = self.states.len();
                self.seen.insert(step.result, id);
                self.states.push(SearchState {
                    term: step.result,
                    depth: depth + 1,
                    parent: Some((index, step.rule)),
                });
                trace!(state = id, depth = depth + 1, "search_new_state");
            }
        }
        any
    }

    fn solutions(&self, term: TermId) -> Solutions<'m> {
        let module = self.module;
        let matcher = Matcher::new(module, self.pattern, term, self.initial_subst.clone(), false);
        match self.condition.clone() {
            Some(cond) if !cond.is_empty() => Box::new(
                matcher.flat_map(move |(s, _)| ConditionSearch::new(module, cond.clone(), s)),
            ),
            _ => Box::new(matcher.map(|(s, _)| s)),
        }
    }
}

impl Iterator for Search<'_> {
    type Item = SearchSolution;

    fn next(&mut self) -> Option<SearchSolution> {
        loop {
            if let Some((state, solutions)) = &mut self.pending {
                if let Some(subst) = solutions.next() {
                    let state = *state;
                    return Some(SearchSolution {
                        state,
                        term: self.states[state].term,
                        subst,
                    });
                }
                self.pending = None;
            }
            if let Some(index) = self.expand_next.take() {
                self.expand(index);
                continue;
            }
            if self.next_state >= self.states.len() {
                return None;
            }
            let index = self.next_state;
            self.next_state += 1;
            let SearchState { term, depth, .. } = self.states[index];
            let expandable = self.can_expand(depth);

            if self.search_type == SearchType::NormalForm {
                let has_successors = if expandable {
                    self.expand(index)
                } else {
                    one_step(self.module, term).next().is_some()
                };
                if !has_successors {
                    self.pending = Some((index, self.solutions(term)));
                }
                continue;
            }

            if expandable {
                self.expand_next = Some(index);
            }
            if self.search_type.accepts(depth) {
                self.pending = Some((index, self.solutions(term)));
            }
        }
    }
}

/// Reachable states matching `pattern`; see [`SearchType`].
pub fn search<'m>(
    module: &'m Module,
    term: TermId,
    search_type: SearchType,
    pattern: TermId,
    condition: Option<Condition>,
    max_depth: Option<usize>,
) -> Search<'m> {
    Search::new(module, term, search_type, pattern, condition, max_depth)
}

#[cfg(test)]
#[path = "tests/search.rs"]
mod tests;
