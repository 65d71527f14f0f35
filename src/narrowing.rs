//! Symbolic reachability by variant-unification narrowing.
//!
//! States are terms in normal form with respect to the variant equations,
//! each with the substitution accumulated on the initial variables. A step
//! renames a narrowing rule apart, unifies its left-hand side with a
//! non-variable subterm modulo the variant equations and the axioms, and
//! normalizes the instantiated result.

use crate::matching::is_instance;
use crate::module::{EqSet, Module, RuleId};
use crate::search::SearchType;
use crate::subst::{apply_subst, FreshVars, Subst};
use crate::term::{TermId, VarId};
use crate::trace::{debug, debug_span, trace};
use crate::unify::{check_theories, drop_instances, UnifyError};
use crate::variant::{normalize_subst, variant_unify_avoiding, VariantUnifierSearch};
use std::collections::VecDeque;

/// Search flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NarrowingOptions {
    /// Drop new states that are instances of a state already visited.
    pub fold: bool,
    /// Drop target unifiers that are instances of another one for the same state.
    pub filter: bool,
    /// Explore states reached by steps that instantiate the state after
    /// those reached by steps that do not.
    pub delay: bool,
}

impl NarrowingOptions {
    pub fn fold() -> Self {
        Self {
            fold: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrowingSolution {
    /// Index of the state whose term unified with the target.
    pub state: usize,
    pub term: TermId,
    /// Accumulated substitution on the variables of the initial terms.
    pub subst: Subst,
    /// Variant unifier of the state term with the target.
    pub unifier: Subst,
}

#[derive(Debug, Clone)]
struct NarrowingState {
    term: TermId,
    subst: Subst,
    depth: usize,
    fresh: FreshVars,
    parent: Option<(usize, RuleId)>,
}

struct Successor {
    term: TermId,
    subst: Subst,
    fresh: FreshVars,
    rule: RuleId,
    instantiating: bool,
}

/// Lazy narrowing search; states are numbered in creation order.
pub struct NarrowingSearch<'m> {
    module: &'m Module,
    target: TermId,
    search_type: SearchType,
    max_depth: Option<usize>,
    options: NarrowingOptions,
    vars: Vec<VarId>,
    states: Vec<NarrowingState>,
    queue: VecDeque<usize>,
    delayed: VecDeque<usize>,
    pending: Option<(usize, VariantUnifierSearch<'m>)>,
    expand_next: Option<usize>,
    frontier: Vec<usize>,
    folded: usize,
}

/// Narrow from `initial` towards states that unify with `target`.
/// `max_depth` bounds the number of steps; `None` leaves it unbounded.
pub fn narrow<'m>(
    module: &'m Module,
    initial: &[TermId],
    search_type: SearchType,
    target: TermId,
    max_depth: Option<usize>,
    options: NarrowingOptions,
) -> Result<NarrowingSearch<'m>, UnifyError> {
    let _span = debug_span!("narrow", initial = initial.len(), ?search_type).entered();
    let terms = module.terms();
    let mut to_check = initial.to_vec();
    to_check.push(target);
    to_check.extend(module.rules().iter().filter(|r| r.narrowing).map(|r| r.lhs));
    to_check.extend(module.equations().iter().filter(|e| e.variant).map(|e| e.lhs));
    check_theories(module, &to_check)?;

    let mut vars = Vec::new();
    for &t in initial {
        terms.collect_vars(t, &mut vars);
    }
    let mut seeds = initial.to_vec();
    seeds.push(target);
    let fresh = FreshVars::above(terms, &seeds);

    let mut search = NarrowingSearch {
        module,
        target,
        search_type,
        max_depth,
        options,
        vars,
        states: Vec::new(),
        queue: VecDeque::new(),
        delayed: VecDeque::new(),
        pending: None,
        expand_next: None,
        frontier: Vec::new(),
        folded: 0,
    };
    for &t in initial {
        let state = NarrowingState {
            term: module.reduce_with(t, EqSet::Variant),
            subst: Subst::new(),
            depth: 0,
            fresh: fresh.clone(),
            parent: None,
        };
        search.add_state(state, false);
    }
    Ok(search)
}

impl<'m> NarrowingSearch<'m> {
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn state_term(&self, state: usize) -> Option<TermId> {
        self.states.get(state).map(|s| s.term)
    }

    /// States reached along the way to `state`, with the rule of each step.
    pub fn path_to(&self, state: usize) -> Vec<(TermId, Option<RuleId>)> {
        let mut path = Vec::new();
        let mut current = Some(state);
        while let Some(i) = current {
            let Some(s) = self.states.get(i) else {
                break;
            };
            path.push((s.term, s.parent.map(|(_, rule)| rule)));
            current = s.parent.map(|(p, _)| p);
        }
        path.reverse();
        path
    }

    /// Number of new states dropped because they were instances of a
    /// visited state.
    pub fn folded(&self) -> usize {
        self.folded
    }

    /// Terms of the states left unexpanded by the depth bound.
    pub fn frontier_states(&self) -> Vec<TermId> {
        self.frontier.iter().map(|&i| self.states[i].term).collect()
    }

    /// Terms of the visited states that are not instances of another
    /// visited state.
    pub fn most_general_states(&self) -> Vec<TermId> {
        let entries = self
            .states
            .iter()
            .map(|s| (vec![s.term], s.term))
            .collect();
        drop_instances(self.module, entries)
    }

    fn add_state(&mut self, state: NarrowingState, instantiating: bool) {
        if self.options.fold
            && self
                .states
                .iter()
                .any(|s| is_instance(self.module, state.term, s.term))
        {
            self.folded += 1;
            trace!(depth = state.depth, "narrowing state folded");
            return;
        }
        let index = self.states.len();
        self.states.push(state);
        if self.options.delay && instantiating {
            self.delayed.push_back(index);
        } else {
            self.queue.push_back(index);
        }
    }

    fn can_expand(&self, depth: usize) -> bool {
        if self.search_type == SearchType::OneStep && depth >= 1 {
            return false;
        }
        self.max_depth.map_or(true, |d| depth < d)
    }

    fn accepts(&self, depth: usize) -> bool {
        match self.search_type {
            SearchType::OneStep => depth == 1,
            SearchType::AtLeastOne => depth >= 1,
            SearchType::AnySteps | SearchType::NormalForm => true,
        }
    }

    /// One-step narrowing successors of a state.
    fn successors(&self, index: usize) -> Vec<Successor> {
        let module = self.module;
        let terms = module.terms();
        let sig = module.signature();
        let state = &self.states[index];
        let state_vars = terms.vars_of(state.term);
        let mut out = Vec::new();

        for (position, sub) in terms.positions(state.term) {
            let Some(sub_op) = terms.top_op(sub) else {
                continue;
            };
            for rule_id in module.rule_ids() {
                let rule = module.rule(rule_id);
                if !rule.narrowing || !rule.condition.is_empty() {
                    continue;
                }
                if terms.top_op(rule.lhs) != Some(sub_op) {
                    continue;
                }
                let mut fresh = state.fresh.clone();
                let (renamed, _) = fresh.rename_apart(terms, &[rule.lhs, rule.rhs]);
                let (lhs, rhs) = (renamed[0], renamed[1]);

                // AC left-hand sides may match part of the subterm.
                let theory = sig.theory(sub_op);
                let mut sides = Vec::new();
                if !theory.is_ac() || !theory.has_identity() {
                    sides.push((lhs, rhs));
                }
                if theory.is_ac() {
                    let kind = sig.range_kind(sub_op);
                    let rest = fresh.fresh(terms, sig.sorts().error_sort(kind));
                    sides.push((terms.app2(sub_op, lhs, rest), terms.app2(sub_op, rhs, rest)));
                }

                for (lhs, rhs) in sides {
                    let mut avoid: Vec<TermId> = state.subst.iter().map(|(_, t)| t).collect();
                    avoid.push(state.term);
                    avoid.push(lhs);
                    avoid.push(rhs);
                    let Ok(unifiers) = variant_unify_avoiding(module, &[(sub, lhs)], false, &avoid)
                    else {
                        continue;
                    };
                    let replaced = terms.replace_at(state.term, &position, rhs);
                    for sigma in unifiers {
                        let term =
                            module.reduce_with(apply_subst(replaced, &sigma, terms), EqSet::Variant);
                        let composed = state.subst.compose(&sigma, terms).restrict(&self.vars);
                        let subst = normalize_subst(module, &composed);
                        let mut next_fresh = fresh.clone();
                        next_fresh.avoid(terms, term);
                        for (_, t) in subst.iter() {
                            next_fresh.avoid(terms, t);
                        }
                        let instantiating = state_vars
                            .iter()
                            .any(|&v| sigma.get(v).is_some_and(|t| terms.is_var(t).is_none()));
                        module.counters().record_narrowing();
                        out.push(Successor {
                            term,
                            subst,
                            fresh: next_fresh,
                            rule: rule_id,
                            instantiating,
                        });
                    }
                }
            }
        }
        out
    }

    fn enqueue(&mut self, index: usize, successors: Vec<Successor>) {
        let depth = self.states[index].depth;
        for s in successors {
            let state = NarrowingState {
                term: s.term,
                subst: s.subst,
                depth: depth + 1,
                fresh: s.fresh,
                parent: Some((index, s.rule)),
            };
            self.add_state(state, s.instantiating);
        }
    }

    fn target_unifiers(&self, index: usize) -> Option<VariantUnifierSearch<'m>> {
        let state = &self.states[index];
        let mut avoid: Vec<TermId> = state.subst.iter().map(|(_, t)| t).collect();
        avoid.push(state.term);
        variant_unify_avoiding(
            self.module,
            &[(state.term, self.target)],
            self.options.filter,
            &avoid,
        )
        .ok()
    }

    fn next_state(&mut self) -> Option<usize> {
        self.queue.pop_front().or_else(|| self.delayed.pop_front())
    }
}

impl Iterator for NarrowingSearch<'_> {
    type Item = NarrowingSolution;

    fn next(&mut self) -> Option<NarrowingSolution> {
        loop {
            if let Some((index, unifiers)) = &mut self.pending {
                if let Some(unifier) = unifiers.next() {
                    let state = &self.states[*index];
                    return Some(NarrowingSolution {
                        state: *index,
                        term: state.term,
                        subst: state.subst.clone(),
                        unifier,
                    });
                }
                self.pending = None;
            }
            if let Some(index) = self.expand_next.take() {
                let successors = self.successors(index);
                self.enqueue(index, successors);
                continue;
            }
            let Some(index) = self.next_state() else {
                debug!(states = self.states.len(), folded = self.folded, "narrowing exhausted");
                return None;
            };
            let depth = self.states[index].depth;
            let expandable = self.can_expand(depth);

            if self.search_type == SearchType::NormalForm {
                let successors = self.successors(index);
                if successors.is_empty() {
                    self.pending = self.target_unifiers(index).map(|u| (index, u));
                } else if expandable {
                    self.enqueue(index, successors);
                } else {
                    self.frontier.push(index);
                }
                continue;
            }

            if expandable {
                self.expand_next = Some(index);
            } else if self.max_depth.is_some_and(|d| depth >= d) {
                self.frontier.push(index);
            }
            if self.accepts(depth) {
                self.pending = self.target_unifiers(index).map(|u| (index, u));
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/narrowing.rs"]
mod tests;
