//! The strategy machine.
//!
//! A configuration is a term together with the stack of strategies still to
//! run on it. Control steps (sequencing, choice, iteration) rearrange the
//! stack; `Apply` rewrites the term. A configuration whose stack is empty
//! is a solution. Configurations are compared by term and by the identity
//! of the strategy nodes on the stack, which is what makes `s *` loops
//! terminate.

use crate::graph::Transition;
use crate::matching::{MatchOptions, MatchSearch, Window};
use crate::module::Module;
use crate::rewrite::{apply_rule, OneStep};
use crate::strategy::{check_calls, Strategy, StrategyError, StrategyRef};
use crate::term::TermId;
use crate::trace::{debug_span, trace};
use hashbrown::HashSet;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A term and the strategies left to apply to it, innermost last.
#[derive(Debug, Clone)]
pub struct Config {
    pub term: TermId,
    cont: Vec<StrategyRef>,
}

impl Config {
    pub fn new(term: TermId, strategy: StrategyRef) -> Self {
        Self {
            term,
            cont: vec![strategy],
        }
    }

    /// Has the strategy finished on this term?
    pub fn is_solution(&self) -> bool {
        self.cont.is_empty()
    }
}

fn cont_key(cont: &[StrategyRef]) -> Vec<usize> {
    cont.iter().map(|s| Arc::as_ptr(s) as usize).collect()
}

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        self.term == other.term
            && self.cont.len() == other.cont.len()
            && self
                .cont
                .iter()
                .zip(other.cont.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }
}

impl Eq for Config {}

impl Hash for Config {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.term.hash(state);
        cont_key(&self.cont).hash(state);
    }
}

fn pushed(cont: &[StrategyRef], more: &[&StrategyRef]) -> Vec<StrategyRef> {
    let mut out = cont.to_vec();
    out.extend(more.iter().map(|s| (*s).clone()));
    out
}

/// Does `pattern` match `term` (at the root or anywhere) under `condition`?
fn test_holds(module: &Module, term: TermId, strategy: &Strategy) -> bool {
    let Strategy::Test {
        pattern,
        condition,
        anywhere,
    } = strategy
    else {
        return false;
    };
    let options = MatchOptions {
        condition: condition.clone(),
        window: if *anywhere {
            Window::anywhere()
        } else {
            Window::root()
        },
        extension: *anywhere,
    };
    MatchSearch::new(module, *pattern, term, options).next().is_some()
}

enum Task<'m> {
    Run(Config),
    Rewrites {
        steps: OneStep<'m>,
        cont: Vec<StrategyRef>,
    },
    Branch {
        sub: Box<StrategySearch<'m>>,
        then: StrategyRef,
        otherwise: StrategyRef,
        term: TermId,
        cont: Vec<StrategyRef>,
        found: bool,
    },
    One {
        sub: Box<StrategySearch<'m>>,
        cont: Vec<StrategyRef>,
    },
}

/// Lazy solutions of a strategy on a term, without repetitions.
pub struct StrategySearch<'m> {
    module: &'m Module,
    tasks: VecDeque<Task<'m>>,
    seen: HashSet<Config>,
    solutions: HashSet<TermId>,
    fair: bool,
}

/// Rewrite `term` with `strategy`, depth first and left to right.
pub fn srewrite<'m>(
    module: &'m Module,
    term: TermId,
    strategy: &StrategyRef,
) -> Result<StrategySearch<'m>, StrategyError> {
    check_calls(module, strategy)?;
    Ok(StrategySearch::new(module, term, strategy.clone(), false))
}

/// Like [`srewrite`] but exploring configurations breadth first, so every
/// solution is eventually produced even when some branch never ends.
pub fn srewrite_fair<'m>(
    module: &'m Module,
    term: TermId,
    strategy: &StrategyRef,
) -> Result<StrategySearch<'m>, StrategyError> {
    check_calls(module, strategy)?;
    Ok(StrategySearch::new(module, term, strategy.clone(), true))
}

impl<'m> StrategySearch<'m> {
    fn new(module: &'m Module, term: TermId, strategy: StrategyRef, fair: bool) -> Self {
        let _span = debug_span!("srewrite", term = term.raw(), fair).entered();
        let mut tasks = VecDeque::new();
        tasks.push_back(Task::Run(Config::new(module.reduce(term), strategy)));
        Self {
            module,
            tasks,
            seen: HashSet::new(),
            solutions: HashSet::new(),
            fair,
        }
    }

    fn sub(&self, term: TermId, strategy: StrategyRef) -> Box<StrategySearch<'m>> {
        Box::new(StrategySearch::new(self.module, term, strategy, false))
    }

    fn pop(&mut self) -> Option<Task<'m>> {
        if self.fair {
            self.tasks.pop_front()
        } else {
            self.tasks.pop_back()
        }
    }

    /// Queue tasks so that they are taken in the given order.
    fn push_ordered(&mut self, tasks: Vec<Task<'m>>) {
        if self.fair {
            self.tasks.extend(tasks);
        } else {
            self.tasks.extend(tasks.into_iter().rev());
        }
    }

    /// Queue `first`, then the generator it came from.
    fn push_resumed(&mut self, first: Task<'m>, resume: Task<'m>) {
        self.push_ordered(vec![first, resume]);
    }

    /// Run one control step; returns a solution when one is reached.
    fn run(&mut self, config: Config) -> Option<TermId> {
        if !self.seen.insert(config.clone()) {
            return None;
        }
        let Config { term, mut cont } = config;
        let Some(top) = cont.pop() else {
            return self.solutions.insert(term).then_some(term);
        };
        let module = self.module;
        match top.as_ref() {
            Strategy::Idle => self.push_ordered(vec![Task::Run(Config { term, cont })]),
            Strategy::Fail => {}
            Strategy::Apply(label) => {
                let steps = apply_rule(module, term, label.as_deref());
                self.push_ordered(vec![Task::Rewrites { steps, cont }]);
            }
            Strategy::Test { .. } => {
                if test_holds(module, term, &top) {
                    self.push_ordered(vec![Task::Run(Config { term, cont })]);
                }
            }
            Strategy::Seq(a, b) => {
                cont.push(b.clone());
                cont.push(a.clone());
                self.push_ordered(vec![Task::Run(Config { term, cont })]);
            }
            Strategy::Union(alternatives) => {
                let tasks = alternatives
                    .iter()
                    .map(|a| Task::Run(Config {
                        term,
                        cont: pushed(&cont, &[a]),
                    }))
                    .collect();
                self.push_ordered(tasks);
            }
            Strategy::Iterate(s) => {
                let again = pushed(&cont, &[&top, s]);
                self.push_ordered(vec![
                    Task::Run(Config { term, cont }),
                    Task::Run(Config { term, cont: again }),
                ]);
            }
            Strategy::Plus(s) => {
                cont.push(Strategy::iterate(s.clone()));
                cont.push(s.clone());
                self.push_ordered(vec![Task::Run(Config { term, cont })]);
            }
            Strategy::Normalize(s) => {
                let sub = self.sub(term, s.clone());
                self.push_ordered(vec![Task::Branch {
                    sub,
                    then: top.clone(),
                    otherwise: Strategy::idle(),
                    term,
                    cont,
                    found: false,
                }]);
            }
            Strategy::Branch {
                cond,
                then,
                otherwise,
            } => {
                let sub = self.sub(term, cond.clone());
                self.push_ordered(vec![Task::Branch {
                    sub,
                    then: then.clone(),
                    otherwise: otherwise.clone(),
                    term,
                    cont,
                    found: false,
                }]);
            }
            Strategy::Try(s) | Strategy::Not(s) => {
                let then = match top.as_ref() {
                    Strategy::Not(_) => Strategy::fail(),
                    _ => Strategy::idle(),
                };
                let sub = self.sub(term, s.clone());
                self.push_ordered(vec![Task::Branch {
                    sub,
                    then,
                    otherwise: Strategy::idle(),
                    term,
                    cont,
                    found: false,
                }]);
            }
            Strategy::One(s) => {
                let sub = self.sub(term, s.clone());
                self.push_ordered(vec![Task::One { sub, cont }]);
            }
            Strategy::Call(name) => {
                if let Some(body) = module.strategy(name) {
                    cont.push(body.clone());
                    self.push_ordered(vec![Task::Run(Config { term, cont })]);
                }
            }
        }
        None
    }
}

impl Iterator for StrategySearch<'_> {
    type Item = TermId;

    fn next(&mut self) -> Option<TermId> {
        while let Some(task) = self.pop() {
            match task {
                Task::Run(config) => {
                    if let Some(solution) = self.run(config) {
                        trace!(term = solution.raw(), "strategy solution");
                        return Some(solution);
                    }
                }
                Task::Rewrites { mut steps, cont } => {
                    if let Some(step) = steps.next() {
                        self.module.counters().record_strategy();
                        let first = Task::Run(Config {
                            term: step.result,
                            cont: cont.clone(),
                        });
                        self.push_resumed(first, Task::Rewrites { steps, cont });
                    }
                }
                Task::Branch {
                    mut sub,
                    then,
                    otherwise,
                    term,
                    cont,
                    found,
                } => match sub.next() {
                    // A failing continuation makes further results pointless.
                    Some(_) if matches!(then.as_ref(), Strategy::Fail) => {}
                    Some(result) => {
                        let first = Task::Run(Config {
                            term: result,
                            cont: pushed(&cont, &[&then]),
                        });
                        let resume = Task::Branch {
                            sub,
                            then,
                            otherwise,
                            term,
                            cont,
                            found: true,
                        };
                        self.push_resumed(first, resume);
                    }
                    None if !found => {
                        let cont = pushed(&cont, &[&otherwise]);
                        self.push_ordered(vec![Task::Run(Config { term, cont })]);
                    }
                    None => {}
                },
                Task::One { mut sub, cont } => {
                    if let Some(result) = sub.next() {
                        self.push_ordered(vec![Task::Run(Config { term: result, cont })]);
                    }
                }
            }
        }
        None
    }
}

/// Does `strategy` have at least one solution on `term`?
fn succeeds(module: &Module, term: TermId, strategy: StrategyRef) -> bool {
    StrategySearch::new(module, term, strategy, false)
        .next()
        .is_some()
}

/// Transitions out of a configuration: rule applications and opaque calls
/// change the term, control steps are followed silently, and reaching the
/// end of the strategy is a `Solution` self loop.
pub(crate) fn step(
    module: &Module,
    config: &Config,
    opaque: &HashSet<String>,
) -> Vec<(Transition, Config)> {
    let term = config.term;
    let mut out: Vec<(Transition, Config)> = Vec::new();
    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    // Keeps visited stacks alive so their node addresses stay unique.
    let mut visited: Vec<Vec<StrategyRef>> = Vec::new();
    let mut work: Vec<Vec<StrategyRef>> = vec![config.cont.clone()];

    while let Some(mut cont) = work.pop() {
        if !seen.insert(cont_key(&cont)) {
            continue;
        }
        visited.push(cont.clone());
        let Some(top) = cont.pop() else {
            out.push((Transition::solution(), config.clone()));
            continue;
        };
        match top.as_ref() {
            Strategy::Idle => work.push(cont),
            Strategy::Fail => {}
            Strategy::Apply(label) => {
                for s in apply_rule(module, term, label.as_deref()) {
                    module.counters().record_strategy();
                    out.push((Transition::rule(s.rule), Config { term: s.result, cont: cont.clone() }));
                }
            }
            Strategy::Test { .. } => {
                if test_holds(module, term, &top) {
                    work.push(cont);
                }
            }
            Strategy::Seq(a, b) => {
                cont.push(b.clone());
                cont.push(a.clone());
                work.push(cont);
            }
            Strategy::Union(alternatives) => {
                for a in alternatives.iter().rev() {
                    work.push(pushed(&cont, &[a]));
                }
            }
            Strategy::Iterate(s) => {
                work.push(pushed(&cont, &[&top, s]));
                work.push(cont);
            }
            Strategy::Plus(s) => {
                cont.push(Strategy::iterate(s.clone()));
                cont.push(s.clone());
                work.push(cont);
            }
            Strategy::Normalize(s) => {
                if succeeds(module, term, s.clone()) {
                    cont.push(top.clone());
                    cont.push(s.clone());
                }
                work.push(cont);
            }
            Strategy::Branch {
                cond,
                then,
                otherwise,
            } => {
                if succeeds(module, term, cond.clone()) {
                    cont.push(then.clone());
                    cont.push(cond.clone());
                } else {
                    cont.push(otherwise.clone());
                }
                work.push(cont);
            }
            Strategy::Try(s) => {
                if succeeds(module, term, s.clone()) {
                    cont.push(s.clone());
                }
                work.push(cont);
            }
            Strategy::Not(s) => {
                if !succeeds(module, term, s.clone()) {
                    work.push(cont);
                }
            }
            Strategy::One(s) => {
                let first = StrategySearch::new(module, term, s.clone(), false).next();
                if let Some(result) = first {
                    let label = top.to_string();
                    out.push((Transition::opaque(&label), Config { term: result, cont }));
                }
            }
            Strategy::Call(name) => {
                let Some(body) = module.strategy(name) else {
                    continue;
                };
                if opaque.contains(name) {
                    for result in StrategySearch::new(module, term, body.clone(), false) {
                        out.push((Transition::opaque(name), Config { term: result, cont: cont.clone() }));
                    }
                } else {
                    cont.push(body.clone());
                    work.push(cont);
                }
            }
        }
    }

    let mut unique: Vec<(Transition, Config)> = Vec::with_capacity(out.len());
    for entry in out {
        if !unique.contains(&entry) {
            unique.push(entry);
        }
    }
    trace!(successors = unique.len(), "strategy step");
    unique
}

#[cfg(test)]
#[path = "tests/strategy.rs"]
mod tests;
