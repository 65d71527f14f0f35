//! One-step rule rewriting and the rewriting commands built on it.

use crate::context::Context;
use crate::hooks::run_rl_hook;
use crate::matching::{MatchOptions, MatchSearch, Window};
use crate::module::{Module, RuleId};
use crate::subst::{apply_subst, Subst};
use crate::term::{Position, TermId};
use crate::trace::debug;

/// One rewrite of a term: which rule (`None` for a rule hook), how it
/// matched and the reduced result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteStep {
    pub rule: Option<RuleId>,
    pub subst: Subst,
    pub context: Context,
    pub result: TermId,
}

/// Lazy one-step successors: rules in declaration order, each at every
/// position in pre-order, then rule hooks by position.
pub struct OneStep<'m> {
    module: &'m Module,
    term: TermId,
    rules: Vec<RuleId>,
    next_rule: usize,
    current: Option<(RuleId, MatchSearch<'m>)>,
    hook_positions: Option<std::vec::IntoIter<(Position, TermId)>>,
    with_hooks: bool,
}

impl<'m> OneStep<'m> {
    fn with_rules(module: &'m Module, term: TermId, rules: Vec<RuleId>, with_hooks: bool) -> Self {
        Self {
            module,
            term,
            rules,
            next_rule: 0,
            current: None,
            hook_positions: None,
            with_hooks,
        }
    }

    pub fn term(&self) -> TermId {
        self.term
    }

    fn hook_step(&mut self) -> Option<RewriteStep> {
        let module = self.module;
        let terms = module.terms();
        let positions = self
            .hook_positions
            .get_or_insert_with(|| terms.positions(self.term).into_iter());
        for (position, sub) in positions.by_ref() {
            let Some(op) = terms.top_op(sub) else {
                continue;
            };
            if let Some(replacement) = run_rl_hook(module, op, sub) {
                if replacement == sub {
                    continue;
                }
                module.counters().record_rule();
                let context = Context::at(position, None);
                let result = module.reduce(context.plug(terms, self.term, replacement));
                return Some(RewriteStep {
                    rule: None,
                    subst: Subst::new(),
                    context,
                    result,
                });
            }
        }
        None
    }
}

impl Iterator for OneStep<'_> {
    type Item = RewriteStep;

    fn next(&mut self) -> Option<RewriteStep> {
        let module = self.module;
        let terms = module.terms();
        loop {
            if let Some((rule_id, matches)) = &mut self.current {
                if let Some(m) = matches.next() {
                    let rule = module.rule(*rule_id);
                    let rhs = apply_subst(rule.rhs, &m.subst, terms);
                    let result = module.reduce(m.context.plug(terms, self.term, rhs));
                    module.counters().record_rule();
                    return Some(RewriteStep {
                        rule: Some(*rule_id),
                        subst: m.subst,
                        context: m.context,
                        result,
                    });
                }
                self.current = None;
            }
            if self.next_rule < self.rules.len() {
                let rule_id = self.rules[self.next_rule];
                self.next_rule += 1;
                let rule = module.rule(rule_id);
                let options = MatchOptions {
                    condition: Some(rule.condition.clone()),
                    window: Window::anywhere(),
                    extension: true,
                };
                let matches = MatchSearch::new(module, rule.lhs, self.term, options);
                self.current = Some((rule_id, matches));
                continue;
            }
            if self.with_hooks {
                return self.hook_step();
            }
            return None;
        }
    }
}

/// All one-step rewrites of `term`.
pub fn one_step(module: &Module, term: TermId) -> OneStep<'_> {
    OneStep::with_rules(module, term, module.rule_ids().collect(), true)
}

/// One-step rewrites with the rules labelled `label`, or every rule.
pub fn apply_rule<'m>(module: &'m Module, term: TermId, label: Option<&str>) -> OneStep<'m> {
    match label {
        Some(l) => OneStep::with_rules(module, term, module.rules_labelled(l), false),
        None => one_step(module, term),
    }
}

/// Rewrite with the first applicable rule until none applies or `bound`
/// rule steps were taken. Returns the result and the number of equation
/// and rule steps spent.
pub fn rewrite(module: &Module, term: TermId, bound: Option<u64>) -> (TermId, u64) {
    let before = module.counters().report();
    let mut current = module.reduce(term);
    let mut steps = 0u64;
    while bound.map_or(true, |b| steps < b) {
        match one_step(module, current).next() {
            Some(step) => {
                current = step.result;
                steps += 1;
            }
            None => break,
        }
    }
    debug!(steps, "rewrite finished");
    (current, module.counters().report().since(&before).total())
}

/// Fair rewriting: rules take turns, each applied at most `gas` times per
/// round, until a round changes nothing or `bound` rule steps were taken.
pub fn frewrite(module: &Module, term: TermId, bound: Option<u64>, gas: Option<u64>) -> (TermId, u64) {
    let before = module.counters().report();
    let mut current = module.reduce(term);
    let mut steps = 0u64;
    let gas = gas.unwrap_or(1).max(1);
    'rounds: loop {
        let mut progressed = false;
        for rule in module.rule_ids() {
            for _ in 0..gas {
                if bound.is_some_and(|b| steps >= b) {
                    break 'rounds;
                }
                let next = OneStep::with_rules(module, current, vec![rule], false).next();
                match next {
                    Some(step) => {
                        current = step.result;
                        steps += 1;
                        progressed = true;
                    }
                    None => break,
                }
            }
        }
        if !progressed {
            break;
        }
    }
    (current, module.counters().report().since(&before).total())
}

/// A caller-held reference to a term that reduction and rewriting update
/// in place. Other holders of the original term are unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootTerm {
    term: TermId,
}

impl RootTerm {
    pub fn new(term: TermId) -> Self {
        Self { term }
    }

    pub fn get(&self) -> TermId {
        self.term
    }

    /// Reduce to normal form; returns the number of equational steps.
    pub fn reduce(&mut self, module: &Module) -> u64 {
        let (nf, steps) = module.reduce_counted(self.term);
        self.term = nf;
        steps
    }

    pub fn rewrite(&mut self, module: &Module, bound: Option<u64>) -> u64 {
        let (result, steps) = rewrite(module, self.term, bound);
        self.term = result;
        steps
    }

    pub fn frewrite(&mut self, module: &Module, bound: Option<u64>, gas: Option<u64>) -> u64 {
        let (result, steps) = frewrite(module, self.term, bound, gas);
        self.term = result;
        steps
    }
}

impl From<TermId> for RootTerm {
    fn from(term: TermId) -> Self {
        Self::new(term)
    }
}

#[cfg(test)]
#[path = "tests/rewrite.rs"]
mod tests;
