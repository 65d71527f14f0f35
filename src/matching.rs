//! Matching modulo the operators' equational attributes.
//!
//! Pattern variables are bound, subject variables are treated as constants.
//! The search is a depth-first walk over an explicit stack of frames; every
//! choice point (comm argument order, which AC argument a subpattern takes,
//! which sub-multiset or segment a variable takes) is a cursor that produces
//! its alternatives one at a time, so no solution set is ever materialized.

use crate::condition::ConditionSearch;
use crate::context::{Context, Extension};
use crate::module::{Condition, Module};
use crate::signature::{OpId, Theory};
use crate::subst::{apply_subst, Subst};
use crate::term::{Args, Position, Term, TermId, VarId};
use smallvec::SmallVec;

use crate::trace::{debug_span, trace};

/// Pending AC problem: pattern arguments against a multiset of subject
/// arguments.
#[derive(Debug, Clone)]
struct AcGoal {
    op: OpId,
    /// Pattern arguments not yet classified.
    unclassified: SmallVec<[TermId; 4]>,
    /// Non-variable, non-ground pattern arguments.
    subpatterns: SmallVec<[TermId; 4]>,
    /// Variables with their multiplicity.
    vars: SmallVec<[(VarId, u32); 4]>,
    /// Distinct subject arguments with the number still available.
    elems: SmallVec<[TermId; 8]>,
    counts: SmallVec<[u32; 8]>,
    /// Idempotent operators: elements may be shared, but each must be used.
    covered: SmallVec<[bool; 8]>,
    idem: bool,
    extension: bool,
}

impl AcGoal {
    fn new(op: OpId, idem: bool, pattern: Args, subject: Args, extension: bool) -> Self {
        let mut elems: SmallVec<[TermId; 8]> = SmallVec::new();
        let mut counts: SmallVec<[u32; 8]> = SmallVec::new();
        for s in subject {
            match elems.iter().position(|&e| e == s) {
                Some(i) => counts[i] += 1,
                None => {
                    elems.push(s);
                    counts.push(1);
                }
            }
        }
        let covered = SmallVec::from_elem(false, elems.len());
        Self {
            op,
            unclassified: pattern,
            subpatterns: SmallVec::new(),
            vars: SmallVec::new(),
            elems,
            counts,
            covered,
            idem,
            extension,
        }
    }

    /// Consume one occurrence of `t`.
    fn take(&mut self, t: TermId) -> bool {
        match self.elems.iter().position(|&e| e == t) {
            Some(i) if self.idem => {
                self.covered[i] = true;
                true
            }
            Some(i) if self.counts[i] > 0 => {
                self.counts[i] -= 1;
                true
            }
            _ => false,
        }
    }

    fn remaining(&self) -> Args {
        let mut out = SmallVec::new();
        for (i, &e) in self.elems.iter().enumerate() {
            if self.idem {
                if !self.covered[i] {
                    out.push(e);
                }
            } else {
                for _ in 0..self.counts[i] {
                    out.push(e);
                }
            }
        }
        out
    }
}

/// Pending assoc problem: pattern arguments against a sequence of subject
/// arguments, consumed left to right.
#[derive(Debug, Clone)]
struct AssocGoal {
    op: OpId,
    pattern: Args,
    next_pattern: usize,
    subject: Args,
    next_subject: usize,
    /// Extension segments still to choose.
    extend_left: bool,
    extend_right: bool,
    left: Args,
}

#[derive(Debug, Clone)]
enum TheoryGoal {
    Ac(AcGoal),
    Assoc(AssocGoal),
}

#[derive(Debug, Clone)]
struct State {
    subst: Subst,
    /// Pattern/subject pairs, processed from the end.
    simple: SmallVec<[(TermId, TermId); 8]>,
    theory: SmallVec<[TheoryGoal; 2]>,
    extension: Option<Extension>,
}

/// Who receives an AC sub-multiset or an assoc segment.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Var(VarId),
    LeftExtension,
}

#[derive(Debug)]
enum Cursor {
    Comm {
        pattern: [TermId; 2],
        subject: [TermId; 2],
        next: u8,
    },
    /// Which subject argument the first subpattern takes.
    AcSubpattern { goal: AcGoal, next: usize },
    /// Which sub-multiset the first variable takes; odometer over counts.
    AcVar {
        goal: AcGoal,
        var: VarId,
        mult: u32,
        min: SmallVec<[u32; 8]>,
        max: SmallVec<[u32; 8]>,
        choice: Option<SmallVec<[u32; 8]>>,
    },
    /// Length of the segment the next slot takes.
    AssocSegment {
        goal: AssocGoal,
        slot: Slot,
        len: usize,
        max: usize,
    },
}

enum Outcome {
    Solved(State),
    Failed,
    Branch(State, Cursor),
}

enum Frame {
    Ready(State),
    Choice(State, Cursor),
}

/// Lazy matcher of one or more pattern/subject pairs at their roots.
///
/// Yields the substitution and, for matches with extension, the unmatched
/// arguments of the subject's top assoc/AC operator.
pub struct Matcher<'m> {
    module: &'m Module,
    stack: Vec<Frame>,
}

impl<'m> Matcher<'m> {
    /// Match `pattern` against `subject`, extending `initial`. With
    /// `extension`, a pattern headed by an assoc or AC operator may match
    /// part of the subject's arguments.
    pub fn new(
        module: &'m Module,
        pattern: TermId,
        subject: TermId,
        initial: Subst,
        extension: bool,
    ) -> Self {
        let mut state = State {
            subst: initial,
            simple: SmallVec::new(),
            theory: SmallVec::new(),
            extension: None,
        };
        let terms = module.terms();
        let root_op = terms.top_op(pattern);
        match root_op {
            Some(op)
                if extension
                    && terms.top_op(subject) == Some(op)
                    && module.signature().theory(op).is_assoc() =>
            {
                let goal = theory_goal(module, op, terms.args(pattern), terms.args(subject), true);
                state.theory.push(goal);
            }
            _ => state.simple.push((pattern, subject)),
        }
        Self {
            module,
            stack: vec![Frame::Ready(state)],
        }
    }

    /// Simultaneous matching of several pairs.
    pub fn pairs(module: &'m Module, pairs: &[(TermId, TermId)], initial: Subst) -> Self {
        let state = State {
            subst: initial,
            simple: pairs.iter().rev().copied().collect(),
            theory: SmallVec::new(),
            extension: None,
        };
        Self {
            module,
            stack: vec![Frame::Ready(state)],
        }
    }

    fn run(&self, mut st: State) -> Outcome {
        loop {
            if let Some((p, s)) = st.simple.pop() {
                match self.simple_step(&mut st, p, s) {
                    Err(()) => return Outcome::Failed,
                    Ok(Some(cursor)) => return Outcome::Branch(st, cursor),
                    Ok(None) => continue,
                }
            }
            let step = match st.theory.pop() {
                None => return Outcome::Solved(st),
                Some(TheoryGoal::Ac(goal)) => self.ac_step(&mut st, goal),
                Some(TheoryGoal::Assoc(goal)) => self.assoc_step(&mut st, goal),
            };
            match step {
                Err(()) => return Outcome::Failed,
                Ok(Some(cursor)) => return Outcome::Branch(st, cursor),
                Ok(None) => {}
            }
        }
    }

    fn bind_checked(&self, st: &mut State, v: VarId, value: TermId) -> bool {
        match st.subst.get(v) {
            Some(b) => b == value,
            None => {
                let terms = self.module.terms();
                if !self.module.has_sort(value, terms.var_sort(v)) {
                    return false;
                }
                st.subst.bind(v, value);
                true
            }
        }
    }

    fn simple_step(&self, st: &mut State, p: TermId, s: TermId) -> Result<Option<Cursor>, ()> {
        let terms = self.module.terms();
        if terms.is_ground(p) {
            return if p == s { Ok(None) } else { Err(()) };
        }
        match terms.term(p) {
            Term::Var(v) => {
                if self.bind_checked(st, v, s) {
                    Ok(None)
                } else {
                    Err(())
                }
            }
            Term::App(op, pargs) => match self.module.signature().theory(op) {
                Theory::Free => match terms.term(s) {
                    Term::App(sop, sargs) if sop == op && sargs.len() == pargs.len() => {
                        for (pa, sa) in pargs.iter().zip(sargs.iter()).rev() {
                            st.simple.push((*pa, *sa));
                        }
                        Ok(None)
                    }
                    _ => Err(()),
                },
                Theory::Comm => match terms.term(s) {
                    Term::App(sop, sargs) if sop == op && sargs.len() == 2 => {
                        if sargs[0] == sargs[1] {
                            st.simple.push((pargs[1], sargs[1]));
                            st.simple.push((pargs[0], sargs[0]));
                            Ok(None)
                        } else {
                            Ok(Some(Cursor::Comm {
                                pattern: [pargs[0], pargs[1]],
                                subject: [sargs[0], sargs[1]],
                                next: 0,
                            }))
                        }
                    }
                    _ => Err(()),
                },
                _ => {
                    let sargs = terms.list_of(op, s);
                    st.theory
                        .push(theory_goal(self.module, op, pargs, sargs, false));
                    Ok(None)
                }
            },
        }
    }

    fn ac_step(&self, st: &mut State, mut goal: AcGoal) -> Result<Option<Cursor>, ()> {
        let terms = self.module.terms();

        let pending = std::mem::take(&mut goal.unclassified);
        for p in pending {
            if terms.is_ground(p) {
                if !goal.take(p) {
                    return Err(());
                }
                continue;
            }
            match terms.term(p) {
                Term::Var(v) => match goal.vars.iter_mut().find(|(w, _)| *w == v) {
                    Some(entry) => entry.1 += 1,
                    None => goal.vars.push((v, 1)),
                },
                Term::App(..) => goal.subpatterns.push(p),
            }
        }

        // Variables bound since the last visit consume their value.
        let mut i = 0;
        while i < goal.vars.len() {
            let (v, mult) = goal.vars[i];
            match st.subst.get(v) {
                Some(value) => {
                    for e in terms.list_of(goal.op, value) {
                        for _ in 0..mult {
                            if !goal.take(e) {
                                return Err(());
                            }
                        }
                    }
                    goal.vars.remove(i);
                }
                None => i += 1,
            }
        }

        if !goal.subpatterns.is_empty() {
            return Ok(Some(Cursor::AcSubpattern { goal, next: 0 }));
        }

        if let Some(&(var, mult)) = goal.vars.first() {
            let last = goal.vars.len() == 1 && !goal.extension;
            let n = goal.elems.len();
            let mut min: SmallVec<[u32; 8]> = SmallVec::from_elem(0, n);
            let mut max: SmallVec<[u32; 8]> = SmallVec::from_elem(0, n);
            for j in 0..n {
                if goal.idem {
                    max[j] = 1;
                    if last && !goal.covered[j] {
                        min[j] = 1;
                    }
                } else {
                    max[j] = goal.counts[j] / mult;
                    if last {
                        if goal.counts[j] % mult != 0 {
                            return Err(());
                        }
                        min[j] = max[j];
                    }
                }
            }
            return Ok(Some(Cursor::AcVar {
                goal,
                var,
                mult,
                min,
                max,
                choice: None,
            }));
        }

        let rest = goal.remaining();
        if goal.extension {
            st.extension = Some(Extension::Ac { op: goal.op, rest });
            Ok(None)
        } else if rest.is_empty() {
            Ok(None)
        } else {
            Err(())
        }
    }

    fn assoc_step(&self, st: &mut State, mut goal: AssocGoal) -> Result<Option<Cursor>, ()> {
        let terms = self.module.terms();
        let has_identity = self.module.signature().identity(goal.op).is_some();
        loop {
            let available = goal.subject.len() - goal.next_subject;
            if goal.extend_left {
                return Ok(Some(Cursor::AssocSegment {
                    slot: Slot::LeftExtension,
                    len: 0,
                    max: available,
                    goal,
                }));
            }
            if goal.next_pattern == goal.pattern.len() {
                let right: Args = goal.subject[goal.next_subject..].iter().copied().collect();
                if goal.extend_right {
                    st.extension = Some(Extension::Assoc {
                        op: goal.op,
                        left: goal.left,
                        right,
                    });
                    return Ok(None);
                }
                return if right.is_empty() { Ok(None) } else { Err(()) };
            }
            let p = goal.pattern[goal.next_pattern];
            let is_last = goal.next_pattern + 1 == goal.pattern.len() && !goal.extend_right;

            if terms.is_ground(p) {
                if available == 0 || goal.subject[goal.next_subject] != p {
                    return Err(());
                }
                goal.next_pattern += 1;
                goal.next_subject += 1;
                continue;
            }
            match terms.term(p) {
                Term::Var(v) => {
                    if let Some(value) = st.subst.get(v) {
                        let seg = terms.list_of(goal.op, value);
                        let end = goal.next_subject + seg.len();
                        if end > goal.subject.len() || goal.subject[goal.next_subject..end] != seg[..]
                        {
                            return Err(());
                        }
                        goal.next_pattern += 1;
                        goal.next_subject = end;
                        continue;
                    }
                    let min = if has_identity { 0 } else { 1 };
                    if is_last {
                        if available < min {
                            return Err(());
                        }
                        let value = segment(self.module, goal.op, &goal.subject[goal.next_subject..])
                            .ok_or(())?;
                        if !self.bind_checked(st, v, value) {
                            return Err(());
                        }
                        goal.next_pattern += 1;
                        goal.next_subject = goal.subject.len();
                        continue;
                    }
                    if available < min {
                        return Err(());
                    }
                    return Ok(Some(Cursor::AssocSegment {
                        slot: Slot::Var(v),
                        len: min,
                        max: available,
                        goal,
                    }));
                }
                Term::App(..) => {
                    if available == 0 {
                        return Err(());
                    }
                    let s = goal.subject[goal.next_subject];
                    goal.next_pattern += 1;
                    goal.next_subject += 1;
                    st.theory.push(TheoryGoal::Assoc(goal));
                    st.simple.push((p, s));
                    return Ok(None);
                }
            }
        }
    }

    /// Next alternative of a cursor, skipping ones that fail immediately.
    fn advance(&self, base: &State, cursor: &mut Cursor) -> Option<State> {
        let terms = self.module.terms();
        match cursor {
            Cursor::Comm {
                pattern,
                subject,
                next,
            } => {
                if *next > 1 {
                    return None;
                }
                let mut st = base.clone();
                let (a, b) = if *next == 0 {
                    (subject[0], subject[1])
                } else {
                    (subject[1], subject[0])
                };
                *next += 1;
                st.simple.push((pattern[1], b));
                st.simple.push((pattern[0], a));
                Some(st)
            }
            Cursor::AcSubpattern { goal, next } => {
                while *next < goal.elems.len() {
                    let j = *next;
                    *next += 1;
                    if !goal.idem && goal.counts[j] == 0 {
                        continue;
                    }
                    let elem = goal.elems[j];
                    let head = terms.top_op(goal.subpatterns[0]);
                    let collapses = head.is_some_and(|op| {
                        self.module.signature().theory(op).has_identity()
                    });
                    if !collapses && terms.top_op(elem) != head {
                        continue;
                    }
                    let mut g = goal.clone();
                    let p = g.subpatterns.remove(0);
                    g.take(elem);
                    let mut st = base.clone();
                    st.theory.push(TheoryGoal::Ac(g));
                    st.simple.push((p, elem));
                    return Some(st);
                }
                None
            }
            Cursor::AcVar {
                goal,
                var,
                mult,
                min,
                max,
                choice,
            } => loop {
                let current = match choice.take() {
                    None => min.clone(),
                    Some(mut c) => {
                        if !odometer_step(&mut c, min, max) {
                            return None;
                        }
                        c
                    }
                };
                *choice = Some(current.clone());

                let mut elems: Args = SmallVec::new();
                for (j, &k) in current.iter().enumerate() {
                    for _ in 0..k {
                        elems.push(goal.elems[j]);
                    }
                }
                let Some(value) = segment(self.module, goal.op, &elems) else {
                    continue;
                };
                let mut st = base.clone();
                if !self.bind_checked(&mut st, *var, value) {
                    continue;
                }
                let mut g = goal.clone();
                g.vars.remove(0);
                for (j, &k) in current.iter().enumerate() {
                    if g.idem {
                        if k > 0 {
                            g.covered[j] = true;
                        }
                    } else {
                        g.counts[j] -= k * *mult;
                    }
                }
                st.theory.push(TheoryGoal::Ac(g));
                return Some(st);
            },
            Cursor::AssocSegment {
                goal,
                slot,
                len,
                max,
            } => {
                while *len <= *max {
                    let l = *len;
                    *len += 1;
                    let start = goal.next_subject;
                    let seg = &goal.subject[start..start + l];
                    let mut st = base.clone();
                    let mut g = goal.clone();
                    match *slot {
                        Slot::LeftExtension => {
                            g.left = seg.iter().copied().collect();
                            g.extend_left = false;
                        }
                        Slot::Var(v) => {
                            let Some(value) = segment(self.module, g.op, seg) else {
                                continue;
                            };
                            if !self.bind_checked(&mut st, v, value) {
                                continue;
                            }
                            g.next_pattern += 1;
                        }
                    }
                    g.next_subject += l;
                    st.theory.push(TheoryGoal::Assoc(g));
                    return Some(st);
                }
                None
            }
        }
    }
}

/// Advance a mixed-radix counter bounded by `min..=max`, lowest digit first.
fn odometer_step(c: &mut [u32], min: &[u32], max: &[u32]) -> bool {
    for j in 0..c.len() {
        if c[j] < max[j] {
            c[j] += 1;
            for k in 0..j {
                c[k] = min[k];
            }
            return true;
        }
    }
    false
}

/// The term `op(elems)`, or the identity for an empty list.
fn segment(module: &Module, op: OpId, elems: &[TermId]) -> Option<TermId> {
    let terms = module.terms();
    match elems.len() {
        0 => terms.identity_of(op),
        1 => Some(elems[0]),
        _ => Some(terms.app(op, elems.iter().copied().collect())),
    }
}

fn theory_goal(module: &Module, op: OpId, pattern: Args, subject: Args, extension: bool) -> TheoryGoal {
    let theory = module.signature().theory(op);
    if theory.is_ac() {
        TheoryGoal::Ac(AcGoal::new(op, theory.is_idem(), pattern, subject, extension))
    } else {
        TheoryGoal::Assoc(AssocGoal {
            op,
            pattern,
            next_pattern: 0,
            subject,
            next_subject: 0,
            extend_left: extension,
            extend_right: extension,
            left: SmallVec::new(),
        })
    }
}

impl Iterator for Matcher<'_> {
    type Item = (Subst, Option<Extension>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stack.pop()? {
                Frame::Ready(st) => match self.run(st) {
                    Outcome::Solved(st) => {
                        trace!(bindings = st.subst.len(), "match_solution");
                        let ext = st.extension.filter(|e| !e.is_empty());
                        return Some((st.subst, ext));
                    }
                    Outcome::Failed => continue,
                    Outcome::Branch(st, cursor) => self.stack.push(Frame::Choice(st, cursor)),
                },
                Frame::Choice(st, mut cursor) => {
                    if let Some(next) = self.advance(&st, &mut cursor) {
                        self.stack.push(Frame::Choice(st, cursor));
                        self.stack.push(Frame::Ready(next));
                    }
                }
            }
        }
    }
}

// ========== MATCHING AT POSITIONS ==========

/// Subject positions to try, by depth from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub min_depth: usize,
    /// `None` is unbounded.
    pub max_depth: Option<usize>,
}

impl Window {
    /// The root only.
    pub fn root() -> Self {
        Self {
            min_depth: 0,
            max_depth: Some(0),
        }
    }

    /// Every position of the subject.
    pub fn anywhere() -> Self {
        Self {
            min_depth: 0,
            max_depth: None,
        }
    }

    pub fn between(min_depth: usize, max_depth: Option<usize>) -> Self {
        Self {
            min_depth,
            max_depth,
        }
    }

    pub fn contains(&self, depth: usize) -> bool {
        depth >= self.min_depth && self.max_depth.map_or(true, |m| depth <= m)
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::root()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchOptions {
    pub condition: Option<Condition>,
    pub window: Window,
    pub extension: bool,
}

/// A match: the substitution and where in the subject it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub subst: Subst,
    pub context: Context,
}

impl Match {
    /// Binding of the variable named `name` (of any sort).
    pub fn find(&self, module: &Module, name: &str) -> Option<TermId> {
        let terms = module.terms();
        self.subst
            .iter()
            .find(|(v, _)| terms.var_name(*v) == name)
            .map(|(_, t)| t)
    }

    pub fn instantiate(&self, module: &Module, t: TermId) -> TermId {
        apply_subst(t, &self.subst, module.terms())
    }
}

/// Lazy matches of a pattern at the subject positions inside a window, in
/// pre-order, left to right, each filtered through the condition.
pub struct MatchSearch<'m> {
    module: &'m Module,
    pattern: TermId,
    subject: TermId,
    options: MatchOptions,
    positions: std::vec::IntoIter<(Position, TermId)>,
    current: Option<(Position, Matcher<'m>)>,
    pending: Option<(ConditionSearch<'m>, Context)>,
}

impl<'m> MatchSearch<'m> {
    pub fn new(module: &'m Module, pattern: TermId, subject: TermId, options: MatchOptions) -> Self {
        let _span = debug_span!("match_search", pattern = pattern.raw(), subject = subject.raw())
            .entered();
        let window = options.window;
        let positions: Vec<(Position, TermId)> = module
            .terms()
            .positions(subject)
            .into_iter()
            .filter(|(p, _)| window.contains(p.len()))
            .collect();
        Self {
            module,
            pattern,
            subject,
            options,
            positions: positions.into_iter(),
            current: None,
            pending: None,
        }
    }

    pub fn subject(&self) -> TermId {
        self.subject
    }
}

impl Iterator for MatchSearch<'_> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        loop {
            if let Some((conditions, context)) = &mut self.pending {
                match conditions.next() {
                    Some(subst) => {
                        return Some(Match {
                            subst,
                            context: context.clone(),
                        })
                    }
                    None => self.pending = None,
                }
            }
            if let Some((position, matcher)) = &mut self.current {
                match matcher.next() {
                    Some((subst, extension)) => {
                        let context = Context::at(position.clone(), extension);
                        match &self.options.condition {
                            Some(cond) if !cond.is_empty() => {
                                let search = ConditionSearch::new(self.module, cond.clone(), subst);
                                self.pending = Some((search, context));
                            }
                            _ => return Some(Match { subst, context }),
                        }
                        continue;
                    }
                    None => self.current = None,
                }
            }
            let (position, sub) = self.positions.next()?;
            let matcher = Matcher::new(
                self.module,
                self.pattern,
                sub,
                Subst::new(),
                self.options.extension,
            );
            self.current = Some((position, matcher));
        }
    }
}

/// All matches of `pattern` in `subject`.
pub fn match_term<'m>(
    module: &'m Module,
    pattern: TermId,
    subject: TermId,
    options: MatchOptions,
) -> MatchSearch<'m> {
    MatchSearch::new(module, pattern, subject, options)
}

/// Simultaneous matching of pattern/subject pairs.
pub fn match_pairs<'m>(module: &'m Module, pairs: &[(TermId, TermId)]) -> Matcher<'m> {
    Matcher::pairs(module, pairs, Subst::new())
}

/// Is every `specific[i]` an instance of `general[i]` under one substitution?
pub fn subsumes(module: &Module, general: &[TermId], specific: &[TermId]) -> bool {
    if general.len() != specific.len() {
        return false;
    }
    let pairs: SmallVec<[(TermId, TermId); 8]> = general
        .iter()
        .copied()
        .zip(specific.iter().copied())
        .collect();
    match_pairs(module, &pairs).next().is_some()
}

pub fn is_instance(module: &Module, specific: TermId, general: TermId) -> bool {
    subsumes(module, &[general], &[specific])
}

#[cfg(test)]
#[path = "tests/matching.rs"]
mod tests;
