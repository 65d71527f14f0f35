//! Order-sorted unification modulo free, C, AC and ACU operators.
//!
//! The solver runs a depth-first search over states made of an idempotent
//! substitution and the equations still to solve. Deterministic steps
//! (decomposition, variable elimination) rewrite a state in place;
//! commutative decomposition, sort specialization and AC column choices
//! split it into alternatives.

use crate::ac_unify::{AcProblem, AcStart};
use crate::matching::subsumes;
use crate::module::Module;
use crate::signature::{OpId, Theory};
use crate::sort::SortId;
use crate::subst::{apply_subst, FreshVars, Subst};
use crate::term::{Args, Term, TermId, TermStore, VarId};
use hashbrown::HashSet;
use smallvec::SmallVec;
use std::fmt;

use crate::trace::{debug_span, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnifyError {
    /// An operator of the problem has a theory without a unification
    /// algorithm here (A, AU and idempotent operators).
    UnsupportedTheory { op: String, theory: Theory },
}

impl fmt::Display for UnifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnifyError::UnsupportedTheory { op, theory } => {
                write!(f, "unification modulo {:?} is not supported (operator {})", theory, op)
            }
        }
    }
}

impl std::error::Error for UnifyError {}

#[derive(Debug, Clone)]
struct State {
    subst: Subst,
    eqs: Vec<(TermId, TermId)>,
    fresh: FreshVars,
}

enum Frame {
    State(State),
    /// Remaining column choices of an AC equation; `base` is the state
    /// without that equation.
    Ac { base: State, problem: AcProblem },
}

enum Step {
    Solved(Subst),
    Failed,
    Split(Vec<State>),
    Ac(State, AcProblem),
}

/// Lazy stream of unifiers of an equation list. Every unifier binds only
/// variables of the problem; fresh variables in its range are named `#n`.
pub struct UnifierSearch<'m> {
    module: &'m Module,
    vars: Vec<VarId>,
    stack: Vec<Frame>,
    seen: HashSet<Subst>,
    /// Irredundant mode: all unifiers, computed on first demand.
    buffered: Option<std::vec::IntoIter<Subst>>,
    irredundant: bool,
}

/// Unify every `(l, r)` pair simultaneously.
pub fn unify<'m>(
    module: &'m Module,
    equations: &[(TermId, TermId)],
    irredundant: bool,
) -> Result<UnifierSearch<'m>, UnifyError> {
    let terms = module.terms();
    let all: Vec<TermId> = equations.iter().flat_map(|&(l, r)| [l, r]).collect();
    check_theories(module, &all)?;
    Ok(unify_from(module, equations, irredundant, FreshVars::above(terms, &all)))
}

/// Unification whose fresh variables are drawn from `fresh`. Operators are
/// assumed to have been checked with [`check_theories`].
pub(crate) fn unify_from<'m>(
    module: &'m Module,
    equations: &[(TermId, TermId)],
    irredundant: bool,
    fresh: FreshVars,
) -> UnifierSearch<'m> {
    let _span = debug_span!("unify", equations = equations.len(), irredundant).entered();
    let terms = module.terms();
    let mut vars = Vec::new();
    for &(l, r) in equations {
        terms.collect_vars(l, &mut vars);
        terms.collect_vars(r, &mut vars);
    }
    let state = State {
        subst: Subst::new(),
        eqs: equations.iter().rev().copied().collect(),
        fresh,
    };
    UnifierSearch {
        module,
        vars,
        stack: vec![Frame::State(state)],
        seen: HashSet::new(),
        buffered: None,
        irredundant,
    }
}

/// Fail on operators of `terms` whose theory has no unification algorithm.
pub(crate) fn check_theories(module: &Module, terms_to_check: &[TermId]) -> Result<(), UnifyError> {
    let terms = module.terms();
    let sig = module.signature();
    let mut stack: Vec<TermId> = terms_to_check.to_vec();
    let mut visited: HashSet<TermId> = HashSet::new();
    while let Some(t) = stack.pop() {
        if !visited.insert(t) {
            continue;
        }
        if let Term::App(op, args) = terms.term(t) {
            let theory = sig.theory(op);
            let supported = matches!(theory, Theory::Free | Theory::Comm | Theory::AC | Theory::ACU);
            if !supported {
                return Err(UnifyError::UnsupportedTheory {
                    op: sig.op_name(op).to_string(),
                    theory,
                });
            }
            stack.extend(args);
        }
    }
    Ok(())
}

/// Images of `vars` under `subst`, unbound variables standing for themselves.
pub(crate) fn images(terms: &TermStore, vars: &[VarId], subst: &Subst) -> Vec<TermId> {
    vars.iter()
        .map(|&v| subst.get(v).unwrap_or_else(|| terms.var_term(v)))
        .collect()
}

/// Drop every entry whose key list is an instance of another entry's. Of
/// two entries that are instances of each other the earlier is kept.
pub(crate) fn drop_instances<T>(module: &Module, entries: Vec<(Vec<TermId>, T)>) -> Vec<T> {
    let redundant: Vec<bool> = entries
        .iter()
        .enumerate()
        .map(|(i, (specific, _))| {
            entries.iter().enumerate().any(|(j, (general, _))| {
                j != i
                    && subsumes(module, general, specific)
                    && (j < i || !subsumes(module, specific, general))
            })
        })
        .collect();
    entries
        .into_iter()
        .zip(redundant)
        .filter(|(_, r)| !r)
        .map(|((_, value), _)| value)
        .collect()
}

impl<'m> UnifierSearch<'m> {
    /// Variables of the equations, in first-occurrence order.
    pub fn problem_vars(&self) -> &[VarId] {
        &self.vars
    }

    fn next_raw(&mut self) -> Option<Subst> {
        let module = self.module;
        while let Some(frame) = self.stack.pop() {
            let state = match frame {
                Frame::State(state) => state,
                Frame::Ac { base, mut problem } => {
                    let mut fresh = base.fresh.clone();
                    let Some(eqs) = problem.next_solution(module, &mut fresh) else {
                        continue;
                    };
                    let mut next = base.clone();
                    next.fresh = fresh;
                    next.eqs.extend(eqs.into_iter().rev());
                    self.stack.push(Frame::Ac { base, problem });
                    next
                }
            };
            match solve(module, state) {
                Step::Solved(subst) => {
                    let restricted = subst.restrict(&self.vars);
                    if self.seen.insert(restricted.clone()) {
                        return Some(restricted);
                    }
                    trace!("unify_duplicate_solution");
                }
                Step::Failed => {}
                Step::Split(states) => {
                    self.stack
                        .extend(states.into_iter().rev().map(Frame::State));
                }
                Step::Ac(base, problem) => self.stack.push(Frame::Ac { base, problem }),
            }
        }
        None
    }

    /// Every unifier, minus those that are instances of another one.
    fn irredundant_set(&mut self) -> Vec<Subst> {
        let mut all = Vec::new();
        while let Some(s) = self.next_raw() {
            all.push(s);
        }
        let terms = self.module.terms();
        let entries = all
            .into_iter()
            .map(|s| (images(terms, &self.vars, &s), s))
            .collect();
        drop_instances(self.module, entries)
    }
}

impl Iterator for UnifierSearch<'_> {
    type Item = Subst;

    fn next(&mut self) -> Option<Subst> {
        if !self.irredundant {
            return self.next_raw();
        }
        if self.buffered.is_none() {
            let set = self.irredundant_set();
            self.buffered = Some(set.into_iter());
        }
        self.buffered.as_mut().and_then(|it| it.next())
    }
}

/// Bind `var` to `t`, keeping the substitution idempotent and the pending
/// equations instantiated.
fn eliminate(state: &mut State, var: VarId, t: TermId, terms: &TermStore) {
    let mut single = Subst::new();
    single.bind(var, t);
    let mut subst = Subst::new();
    for (v, image) in state.subst.iter() {
        subst.bind(v, apply_subst(image, &single, terms));
    }
    subst.bind(var, t);
    state.subst = subst;
    for eq in state.eqs.iter_mut() {
        eq.0 = apply_subst(eq.0, &single, terms);
        eq.1 = apply_subst(eq.1, &single, terms);
    }
}

/// Sorts a variable of sort `sort` may be narrowed to: itself and every
/// user sort below it.
fn sorts_below(module: &Module, sort: SortId) -> SmallVec<[SortId; 8]> {
    let sorts = module.signature().sorts();
    let mut out: SmallVec<[SortId; 8]> = SmallVec::new();
    out.push(sort);
    for &s in sorts.sorts_of(sorts.kind(sort)) {
        if s != sort && sorts.leq(s, sort) {
            out.push(s);
        }
    }
    out
}

/// Maximal common subsorts of `a` and `b`.
fn common_subsorts(module: &Module, a: SortId, b: SortId) -> SmallVec<[SortId; 4]> {
    let sorts = module.signature().sorts();
    if sorts.kind(a) != sorts.kind(b) {
        return SmallVec::new();
    }
    if sorts.leq(a, b) {
        return smallvec::smallvec![a];
    }
    if sorts.leq(b, a) {
        return smallvec::smallvec![b];
    }
    let common: SmallVec<[SortId; 8]> = sorts
        .sorts_of(sorts.kind(a))
        .iter()
        .copied()
        .filter(|&s| sorts.leq(s, a) && sorts.leq(s, b))
        .collect();
    common
        .iter()
        .copied()
        .filter(|&c| !common.iter().any(|&d| sorts.lt(c, d)))
        .collect()
}

/// Instances of `t` obtained by lowering the sorts of its variables so that
/// the result has a sort below `target`. Only the maximal assignments are
/// returned, each as a renaming to fresh variables.
fn specializations(
    module: &Module,
    t: TermId,
    target: SortId,
    fresh: &FreshVars,
) -> Vec<(Subst, FreshVars)> {
    let terms = module.terms();
    let sorts = module.signature().sorts();
    let vars = terms.vars_of(t);
    if vars.is_empty() {
        return Vec::new();
    }
    let choices: Vec<SmallVec<[SortId; 8]>> = vars
        .iter()
        .map(|&v| sorts_below(module, terms.var_sort(v)))
        .collect();

    // Odometer over sort choices, checking each assignment with a sample
    // instance built from variables of the chosen sorts.
    let mut counter = vec![0usize; vars.len()];
    let mut valid: Vec<Vec<SortId>> = Vec::new();
    loop {
        let assignment: Vec<SortId> = counter
            .iter()
            .zip(choices.iter())
            .map(|(&i, c)| c[i])
            .collect();
        let mut sample_fresh = fresh.clone();
        let mut sample = Subst::new();
        for (&v, &s) in vars.iter().zip(assignment.iter()) {
            sample.bind(v, sample_fresh.fresh(terms, s));
        }
        let instance = apply_subst(t, &sample, terms);
        if sorts.leq(terms.sort_of(instance), target) {
            valid.push(assignment);
        }
        let mut k = 0;
        loop {
            if k == counter.len() {
                return maximal_renamings(module, &vars, valid, fresh);
            }
            counter[k] += 1;
            if counter[k] < choices[k].len() {
                break;
            }
            counter[k] = 0;
            k += 1;
        }
    }
}

fn maximal_renamings(
    module: &Module,
    vars: &[VarId],
    valid: Vec<Vec<SortId>>,
    fresh: &FreshVars,
) -> Vec<(Subst, FreshVars)> {
    let terms = module.terms();
    let sorts = module.signature().sorts();
    let below = |a: &[SortId], b: &[SortId]| a != b && a.iter().zip(b).all(|(&x, &y)| sorts.leq(x, y));
    let mut out = Vec::new();
    for a in valid.iter() {
        if valid.iter().any(|b| below(a.as_slice(), b.as_slice())) {
            continue;
        }
        let mut f = fresh.clone();
        let mut renaming = Subst::new();
        for (&v, &s) in vars.iter().zip(a.iter()) {
            if s != terms.var_sort(v) {
                renaming.bind(v, f.fresh(terms, s));
            }
        }
        out.push((renaming, f));
    }
    out
}

/// Solve `var = t` where `t` is not `var`.
fn bind_var(module: &Module, mut state: State, var: VarId, t: TermId) -> Step {
    let terms = module.terms();
    let sorts = module.signature().sorts();
    let var_sort = terms.var_sort(var);

    if let Some(w) = terms.is_var(t) {
        let w_sort = terms.var_sort(w);
        if sorts.leq(w_sort, var_sort) {
            eliminate(&mut state, var, t, terms);
            return Step::Split(vec![state]);
        }
        if sorts.leq(var_sort, w_sort) {
            eliminate(&mut state, w, terms.var_term(var), terms);
            return Step::Split(vec![state]);
        }
        let mut out = Vec::new();
        for s in common_subsorts(module, var_sort, w_sort) {
            let mut next = state.clone();
            let z = next.fresh.fresh(terms, s);
            eliminate(&mut next, var, z, terms);
            eliminate(&mut next, w, z, terms);
            out.push(next);
        }
        return Step::Split(out);
    }

    if terms.occurs(var, t) {
        // x = f(.., x, ..) is solvable only by collapsing f to its identity.
        return match terms.top_op(t) {
            Some(op) if terms.identity_of(op).is_some() => {
                let lhs: Args = smallvec::smallvec![terms.var_term(var)];
                ac_step(module, state, op, lhs, terms.list_of(op, t))
            }
            _ => Step::Failed,
        };
    }
    if sorts.kind(terms.sort_of(t)) != sorts.kind(var_sort) {
        return Step::Failed;
    }
    if sorts.leq(terms.sort_of(t), var_sort) {
        eliminate(&mut state, var, t, terms);
        return Step::Split(vec![state]);
    }
    let out = specializations(module, t, var_sort, &state.fresh)
        .into_iter()
        .map(|(renaming, fresh)| {
            let mut next = state.clone();
            next.fresh = fresh;
            for (v, image) in renaming.iter() {
                eliminate(&mut next, v, image, terms);
            }
            let t = apply_subst(t, &renaming, terms);
            eliminate(&mut next, var, t, terms);
            next
        })
        .collect();
    Step::Split(out)
}

fn ac_step(module: &Module, mut state: State, op: OpId, lhs: Args, rhs: Args) -> Step {
    match AcProblem::start(module, op, lhs, rhs) {
        AcStart::Solved => Step::Split(vec![state]),
        AcStart::Fail => Step::Failed,
        AcStart::Identity(eqs) => {
            state.eqs.extend(eqs.into_iter().rev());
            Step::Split(vec![state])
        }
        AcStart::Search(problem) => Step::Ac(state, problem),
    }
}

/// Run deterministic steps until the state is solved, fails or branches.
fn solve(module: &Module, mut state: State) -> Step {
    let terms = module.terms();
    let sig = module.signature();
    loop {
        let Some((l, r)) = state.eqs.pop() else {
            return Step::Solved(state.subst);
        };
        if l == r {
            continue;
        }
        let step = match (terms.term(l), terms.term(r)) {
            (Term::Var(x), _) => bind_var(module, state, x, r),
            (_, Term::Var(y)) => bind_var(module, state, y, l),
            (Term::App(f, fa), Term::App(g, ga)) if f == g => match sig.theory(f) {
                Theory::Free => {
                    if fa.len() != ga.len() {
                        return Step::Failed;
                    }
                    state.eqs.extend(fa.iter().copied().zip(ga.iter().copied()).rev());
                    continue;
                }
                Theory::Comm => {
                    let straight = [(fa[0], ga[0]), (fa[1], ga[1])];
                    let crossed = [(fa[0], ga[1]), (fa[1], ga[0])];
                    let mut first = state.clone();
                    first.eqs.extend(straight.into_iter().rev());
                    if fa[0] == fa[1] || ga[0] == ga[1] {
                        state = first;
                        continue;
                    }
                    let mut second = state;
                    second.eqs.extend(crossed.into_iter().rev());
                    Step::Split(vec![first, second])
                }
                _ => ac_step(module, state, f, fa, ga),
            },
            (Term::App(f, _), Term::App(g, _)) => {
                // Different tops meet only through an identity collapse.
                let op = [f, g]
                    .into_iter()
                    .find(|&op| sig.theory(op).is_ac() && sig.theory(op).has_identity());
                match op {
                    Some(op) => ac_step(module, state, op, terms.list_of(op, l), terms.list_of(op, r)),
                    None => Step::Failed,
                }
            }
        };
        // Single-successor splits continue in place.
        match step {
            Step::Split(mut states) if states.len() == 1 => match states.pop() {
                Some(next) => state = next,
                None => return Step::Failed,
            },
            other => return other,
        }
    }
}

#[cfg(test)]
#[path = "tests/unify.rs"]
mod tests;
