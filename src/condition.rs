//! Conditions of equations, rules and memberships, and their evaluation.
//!
//! A condition is a list of fragments solved left to right; each fragment
//! sees the bindings of the fragments before it. Assignment and rewrite
//! fragments can succeed in several ways, so solving a condition is itself
//! a search: one solution stream per fragment, stacked.

use crate::matching::Matcher;
use crate::module::{Condition, Module};
use crate::search::{Search, SearchType};
use crate::sort::SortId;
use crate::subst::{apply_subst, Subst};
use crate::term::TermId;
use smallvec::SmallVec;

use crate::trace::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionFragment {
    /// `l = r`: both sides have the same normal form.
    Equality(TermId, TermId),
    /// `t : S`: the normal form of `t` has sort `S`.
    SortTest(TermId, SortId),
    /// `p := t`: the normal form of `t` matches `p`, binding its variables.
    Assignment(TermId, TermId),
    /// `t => p`: some term reachable from `t` by rewriting matches `p`.
    Rewrite(TermId, TermId),
}

impl ConditionFragment {
    /// Terms whose variables must be bound before the fragment is evaluated.
    pub fn used_terms(&self) -> SmallVec<[TermId; 2]> {
        match *self {
            ConditionFragment::Equality(l, r) => smallvec::smallvec![l, r],
            ConditionFragment::SortTest(t, _) => smallvec::smallvec![t],
            ConditionFragment::Assignment(_, t) => smallvec::smallvec![t],
            ConditionFragment::Rewrite(t, _) => smallvec::smallvec![t],
        }
    }

    /// Pattern whose variables the fragment binds, if any.
    pub fn binding_pattern(&self) -> Option<TermId> {
        match *self {
            ConditionFragment::Assignment(p, _) | ConditionFragment::Rewrite(_, p) => Some(p),
            _ => None,
        }
    }
}

enum FragmentSolutions<'m> {
    Once(Option<Subst>),
    Matches(Matcher<'m>),
    Reach(Box<Search<'m>>),
}

impl Iterator for FragmentSolutions<'_> {
    type Item = Subst;

    fn next(&mut self) -> Option<Subst> {
        match self {
            FragmentSolutions::Once(s) => s.take(),
            FragmentSolutions::Matches(m) => m.next().map(|(s, _)| s),
            FragmentSolutions::Reach(search) => search.next().map(|sol| sol.subst),
        }
    }
}

/// Lazy solutions of a condition extending a substitution.
pub struct ConditionSearch<'m> {
    module: &'m Module,
    fragments: Condition,
    initial: Option<Subst>,
    stack: Vec<FragmentSolutions<'m>>,
}

impl<'m> ConditionSearch<'m> {
    pub fn new(module: &'m Module, fragments: Condition, initial: Subst) -> Self {
        Self {
            module,
            fragments,
            initial: Some(initial),
            stack: Vec::new(),
        }
    }

    /// Instantiate `t`, or `None` when some of its variables are unbound.
    fn instance(&self, t: TermId, subst: &Subst) -> Option<TermId> {
        let terms = self.module.terms();
        if terms.vars_of(t).iter().any(|v| !subst.is_bound(*v)) {
            trace!(term = t.raw(), "condition_unbound_variable");
            return None;
        }
        Some(apply_subst(t, subst, terms))
    }

    fn open(&self, index: usize, subst: Subst) -> FragmentSolutions<'m> {
        let module = self.module;
        match self.fragments[index] {
            ConditionFragment::Equality(l, r) => {
                let holds = match (self.instance(l, &subst), self.instance(r, &subst)) {
                    (Some(l), Some(r)) => module.reduce(l) == module.reduce(r),
                    _ => false,
                };
                FragmentSolutions::Once(holds.then_some(subst))
            }
            ConditionFragment::SortTest(t, sort) => {
                let holds = match self.instance(t, &subst) {
                    Some(t) => module.has_sort(module.reduce(t), sort),
                    None => false,
                };
                FragmentSolutions::Once(holds.then_some(subst))
            }
            ConditionFragment::Assignment(p, t) => match self.instance(t, &subst) {
                Some(t) => {
                    let value = module.reduce(t);
                    FragmentSolutions::Matches(Matcher::new(module, p, value, subst, false))
                }
                None => FragmentSolutions::Once(None),
            },
            ConditionFragment::Rewrite(t, p) => match self.instance(t, &subst) {
                Some(t) => {
                    let search =
                        Search::with_subst(module, t, SearchType::AnySteps, p, None, None, subst);
                    FragmentSolutions::Reach(Box::new(search))
                }
                None => FragmentSolutions::Once(None),
            },
        }
    }
}

impl Iterator for ConditionSearch<'_> {
    type Item = Subst;

    fn next(&mut self) -> Option<Subst> {
        if let Some(initial) = self.initial.take() {
            if self.fragments.is_empty() {
                return Some(initial);
            }
            let first = self.open(0, initial);
            self.stack.push(first);
        }
        loop {
            let depth = self.stack.len();
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(subst) if depth == self.fragments.len() => return Some(subst),
                Some(subst) => {
                    let next = self.open(depth, subst);
                    self.stack.push(next);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/condition.rs"]
mod tests;
