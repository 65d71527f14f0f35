//! Modules: a signature plus equations, memberships, rules and strategy
//! definitions, and the equational simplifier built on them.
//!
//! A module is assembled once with [`ModuleBuilder`] and is immutable from
//! then on. Every search borrows it, so a module cannot be redefined while
//! an iterator derived from it is alive.

use crate::condition::{ConditionFragment, ConditionSearch};
use crate::hooks::{run_eq_hook, HookRef, HookTable};
use crate::matching::Matcher;
use crate::signature::{OpId, Signature, SignatureRef};
use crate::sort::SortId;
use crate::stats::RewriteCounters;
use crate::strategy::StrategyRef;
use crate::subst::{apply_subst, Subst};
use crate::term::{Term, TermId, TermStore, VarId};
use crate::trace::{debug, trace};
use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

pub type Condition = Arc<[ConditionFragment]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EqId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) u32);

impl EqId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl RuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

fn no_condition() -> Condition {
    Arc::from(Vec::new())
}

#[derive(Debug, Clone)]
pub struct Equation {
    pub lhs: TermId,
    pub rhs: TermId,
    pub condition: Condition,
    pub label: Option<String>,
    pub owise: bool,
    pub variant: bool,
}

impl Equation {
    pub fn new(lhs: TermId, rhs: TermId) -> Self {
        Self {
            lhs,
            rhs,
            condition: no_condition(),
            label: None,
            owise: false,
            variant: false,
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn when(mut self, condition: Vec<ConditionFragment>) -> Self {
        self.condition = Arc::from(condition);
        self
    }

    pub fn owise(mut self) -> Self {
        self.owise = true;
        self
    }

    pub fn variant(mut self) -> Self {
        self.variant = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub lhs: TermId,
    pub rhs: TermId,
    pub condition: Condition,
    pub label: Option<String>,
    pub narrowing: bool,
}

impl Rule {
    pub fn new(lhs: TermId, rhs: TermId) -> Self {
        Self {
            lhs,
            rhs,
            condition: no_condition(),
            label: None,
            narrowing: false,
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn when(mut self, condition: Vec<ConditionFragment>) -> Self {
        self.condition = Arc::from(condition);
        self
    }

    pub fn narrowing(mut self) -> Self {
        self.narrowing = true;
        self
    }
}

/// Membership axiom `lhs : sort if condition`.
#[derive(Debug, Clone)]
pub struct Membership {
    pub lhs: TermId,
    pub sort: SortId,
    pub condition: Condition,
    pub label: Option<String>,
}

impl Membership {
    pub fn new(lhs: TermId, sort: SortId) -> Self {
        Self {
            lhs,
            sort,
            condition: no_condition(),
            label: None,
        }
    }

    pub fn when(mut self, condition: Vec<ConditionFragment>) -> Self {
        self.condition = Arc::from(condition);
        self
    }
}

/// Which equations a simplification uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EqSet {
    All,
    /// Only equations flagged `variant`.
    Variant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// The left-hand side of an equation, rule or membership is a variable.
    VariableLhs(String),
    /// A variable of a right-hand side or condition is never bound.
    UnboundVariable { statement: String, var: String },
    /// Both sides of a statement belong to different kinds.
    KindMismatch(String),
    DuplicateStrategy(String),
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleError::VariableLhs(s) => write!(f, "left-hand side of {} is a variable", s),
            ModuleError::UnboundVariable { statement, var } => {
                write!(f, "variable {} of {} is not bound by its left-hand side", var, statement)
            }
            ModuleError::KindMismatch(s) => write!(f, "sides of {} have different kinds", s),
            ModuleError::DuplicateStrategy(s) => write!(f, "strategy {} defined twice", s),
        }
    }
}

impl std::error::Error for ModuleError {}

/// Collects the statements of a module over a finished signature.
pub struct ModuleBuilder {
    name: String,
    terms: TermStore,
    equations: Vec<Equation>,
    rules: Vec<Rule>,
    memberships: Vec<Membership>,
    strategies: Vec<(String, StrategyRef)>,
}

impl ModuleBuilder {
    pub fn new(name: &str, signature: Signature) -> Self {
        Self {
            name: name.to_string(),
            terms: TermStore::new(Arc::new(signature)),
            equations: Vec::new(),
            rules: Vec::new(),
            memberships: Vec::new(),
            strategies: Vec::new(),
        }
    }

    /// Store for building the statements' terms.
    pub fn terms(&self) -> &TermStore {
        &self.terms
    }

    pub fn signature(&self) -> &Signature {
        self.terms.signature()
    }

    pub fn equation(&mut self, eq: Equation) -> &mut Self {
        self.equations.push(eq);
        self
    }

    pub fn rule(&mut self, rule: Rule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn membership(&mut self, mb: Membership) -> &mut Self {
        self.memberships.push(mb);
        self
    }

    /// Named strategy definition, callable with `Strategy::Call`.
    pub fn strategy(&mut self, name: &str, body: StrategyRef) -> &mut Self {
        self.strategies.push((name.to_string(), body));
        self
    }

    pub fn build(self) -> Result<Module, ModuleError> {
        for (i, eq) in self.equations.iter().enumerate() {
            let what = statement_name("equation", i, eq.label.as_deref());
            self.check_statement(&what, eq.lhs, &[eq.rhs], &eq.condition, true)?;
        }
        for (i, rl) in self.rules.iter().enumerate() {
            let what = statement_name("rule", i, rl.label.as_deref());
            self.check_statement(&what, rl.lhs, &[rl.rhs], &rl.condition, true)?;
        }
        for (i, mb) in self.memberships.iter().enumerate() {
            let what = statement_name("membership", i, mb.label.as_deref());
            self.check_statement(&what, mb.lhs, &[], &mb.condition, false)?;
        }

        let mut strategies = HashMap::new();
        for (name, body) in self.strategies {
            if strategies.insert(name.clone(), body).is_some() {
                return Err(ModuleError::DuplicateStrategy(name));
            }
        }

        let mut eq_index: HashMap<OpId, SmallVec<[EqId; 4]>> = HashMap::new();
        let order = self
            .equations
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.owise)
            .chain(self.equations.iter().enumerate().filter(|(_, e)| e.owise));
        for (i, eq) in order {
            if let Some(op) = self.terms.top_op(eq.lhs) {
                eq_index.entry(op).or_default().push(EqId(i as u32));
            }
        }
        let mut mb_index: HashMap<OpId, SmallVec<[usize; 4]>> = HashMap::new();
        for (i, mb) in self.memberships.iter().enumerate() {
            if let Some(op) = self.terms.top_op(mb.lhs) {
                mb_index.entry(op).or_default().push(i);
            }
        }

        debug!(
            module = %self.name,
            equations = self.equations.len(),
            rules = self.rules.len(),
            "module built"
        );

        Ok(Module {
            name: self.name,
            terms: self.terms,
            equations: self.equations,
            rules: self.rules,
            memberships: self.memberships,
            strategies,
            eq_index,
            mb_index,
            hooks: HookTable::new(),
            nf_cache: RwLock::new(HashMap::new()),
            sort_cache: RwLock::new(HashMap::new()),
            counters: RewriteCounters::new(),
        })
    }

    fn check_statement(
        &self,
        what: &str,
        lhs: TermId,
        rhs: &[TermId],
        condition: &[ConditionFragment],
        lhs_must_be_app: bool,
    ) -> Result<(), ModuleError> {
        let terms = &self.terms;
        if lhs_must_be_app && terms.is_var(lhs).is_some() {
            return Err(ModuleError::VariableLhs(what.to_string()));
        }
        for &r in rhs {
            if terms.kind_of(r) != terms.kind_of(lhs) {
                return Err(ModuleError::KindMismatch(what.to_string()));
            }
        }
        let mut bound = terms.vars_of(lhs);
        let unbound = |bound: &[VarId], t: TermId| -> Result<(), ModuleError> {
            match terms.vars_of(t).into_iter().find(|v| !bound.contains(v)) {
                Some(v) => Err(ModuleError::UnboundVariable {
                    statement: what.to_string(),
                    var: terms.var_name(v),
                }),
                None => Ok(()),
            }
        };
        for fragment in condition {
            for t in fragment.used_terms() {
                unbound(&bound, t)?;
            }
            if let Some(p) = fragment.binding_pattern() {
                terms.collect_vars(p, &mut bound);
            }
        }
        for &r in rhs {
            unbound(&bound, r)?;
        }
        Ok(())
    }
}

fn statement_name(kind: &str, index: usize, label: Option<&str>) -> String {
    match label {
        Some(l) => format!("{} [{}]", kind, l),
        None => format!("{} #{}", kind, index),
    }
}

/// A finished module.
pub struct Module {
    name: String,
    terms: TermStore,
    equations: Vec<Equation>,
    rules: Vec<Rule>,
    memberships: Vec<Membership>,
    strategies: HashMap<String, StrategyRef>,
    /// Equations by the top operator of their left-hand side, owise last.
    eq_index: HashMap<OpId, SmallVec<[EqId; 4]>>,
    mb_index: HashMap<OpId, SmallVec<[usize; 4]>>,
    hooks: HookTable,
    nf_cache: RwLock<HashMap<(TermId, EqSet), TermId>>,
    sort_cache: RwLock<HashMap<TermId, SortId>>,
    counters: RewriteCounters,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn terms(&self) -> &TermStore {
        &self.terms
    }

    pub fn signature(&self) -> &Signature {
        self.terms.signature()
    }

    pub fn signature_ref(&self) -> &SignatureRef {
        self.terms.signature_ref()
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn equation(&self, id: EqId) -> &Equation {
        &self.equations[id.index()]
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    pub fn rule_ids(&self) -> impl Iterator<Item = RuleId> {
        (0..self.rules.len() as u32).map(RuleId)
    }

    /// Rules with the given label, in declaration order.
    pub fn rules_labelled(&self, label: &str) -> Vec<RuleId> {
        self.rule_ids()
            .filter(|&r| self.rule(r).label.as_deref() == Some(label))
            .collect()
    }

    pub fn memberships(&self) -> &[Membership] {
        &self.memberships
    }

    pub fn strategy(&self, name: &str) -> Option<&StrategyRef> {
        self.strategies.get(name)
    }

    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    pub fn counters(&self) -> &RewriteCounters {
        &self.counters
    }

    pub fn has_variant_equations(&self) -> bool {
        self.equations.iter().any(|e| e.variant)
    }

    /// Attach an equational hook; see [`HookTable::connect_eq_hook`]. A
    /// name no special operator of the signature declares is not bound.
    pub fn connect_eq_hook(&mut self, name: Option<&str>, hook: Option<HookRef>) -> bool {
        if hook.is_some() && !self.declares_hook(name) {
            return false;
        }
        self.nf_cache.get_mut().clear();
        self.hooks.connect_eq_hook(name, hook)
    }

    pub fn connect_rl_hook(&mut self, name: Option<&str>, hook: Option<HookRef>) -> bool {
        if hook.is_some() && !self.declares_hook(name) {
            return false;
        }
        self.hooks.connect_rl_hook(name, hook)
    }

    fn declares_hook(&self, name: Option<&str>) -> bool {
        let Some(name) = name else {
            return true;
        };
        let sig = self.signature();
        sig.ops()
            .any(|op| sig.special(op).is_some_and(|s| s.name == name))
    }

    /// Equations that may apply at a term headed by `op`, in application order.
    pub(crate) fn equations_for(&self, op: OpId, set: EqSet) -> impl Iterator<Item = EqId> + '_ {
        self.eq_index
            .get(&op)
            .into_iter()
            .flat_map(|v| v.iter().copied())
            .filter(move |&e| set == EqSet::All || self.equation(e).variant)
    }

    // ========== REDUCTION ==========

    /// Equational normal form of `t`.
    pub fn reduce(&self, t: TermId) -> TermId {
        self.reduce_with(t, EqSet::All)
    }

    /// Normal form together with the number of equational steps taken.
    pub fn reduce_counted(&self, t: TermId) -> (TermId, u64) {
        let before = self.counters.report();
        let nf = self.reduce(t);
        (nf, self.counters.report().since(&before).equation_steps)
    }

    pub fn reduce_with(&self, t: TermId, set: EqSet) -> TermId {
        if let Some(&nf) = self.nf_cache.read().get(&(t, set)) {
            return nf;
        }
        let mut current = self.reduce_args(t, set);
        while let Some(next) = self.top_step(current, set) {
            trace!(from = current.raw(), to = next.raw(), "equational step");
            current = self.reduce_args(next, set);
        }
        let mut cache = self.nf_cache.write();
        cache.insert((t, set), current);
        cache.insert((current, set), current);
        current
    }

    /// Is `t` reducible with the given equations?
    pub fn is_reducible(&self, t: TermId, set: EqSet) -> bool {
        self.reduce_with(t, set) != t
    }

    fn reduce_args(&self, t: TermId, set: EqSet) -> TermId {
        match self.terms.term(t) {
            Term::Var(_) => t,
            Term::App(op, args) => {
                if args.is_empty() {
                    return t;
                }
                let reduced: SmallVec<[TermId; 4]> =
                    args.iter().map(|&a| self.reduce_with(a, set)).collect();
                if reduced == args {
                    t
                } else {
                    self.terms.app(op, reduced)
                }
            }
        }
    }

    /// One equational step at the root of a term whose arguments are in
    /// normal form.
    fn top_step(&self, t: TermId, set: EqSet) -> Option<TermId> {
        let op = self.terms.top_op(t)?;
        if set == EqSet::All {
            if let Some(r) = run_eq_hook(self, op, t) {
                if r != t {
                    self.counters.record_equation();
                    return Some(r);
                }
            }
        }
        let extension = self.signature().theory(op).is_assoc();
        for e in self.equations_for(op, set) {
            let eq = self.equation(e);
            let ext = extension && self.terms.top_op(eq.lhs) == Some(op);
            let matches = Matcher::new(self, eq.lhs, t, Subst::new(), ext);
            for (subst, context) in matches {
                let mut solutions = ConditionSearch::new(self, eq.condition.clone(), subst);
                if let Some(sigma) = solutions.next() {
                    self.counters.record_equation();
                    let rhs = apply_subst(eq.rhs, &sigma, &self.terms);
                    let result = match context {
                        Some(ext) => ext.plug(&self.terms, rhs),
                        None => rhs,
                    };
                    return Some(result);
                }
            }
        }
        None
    }

    // ========== SORTS ==========

    /// Least sort of `t` refined by the membership axioms.
    pub fn least_sort(&self, t: TermId) -> SortId {
        if self.memberships.is_empty() {
            return self.terms.sort_of(t);
        }
        if let Some(&s) = self.sort_cache.read().get(&t) {
            return s;
        }
        let (op, args) = match self.terms.term(t) {
            Term::Var(v) => return self.terms.var_sort(v),
            Term::App(op, args) => (op, args),
        };
        let arg_sorts: SmallVec<[SortId; 4]> = args.iter().map(|&a| self.least_sort(a)).collect();
        let mut sort = self.signature().least_sort(op, &arg_sorts);
        // Provisional entry for membership conditions that ask about `t`.
        self.sort_cache.write().insert(t, sort);

        let sorts = self.signature().sorts();
        let candidates = self.mb_index.get(&op).cloned().unwrap_or_default();
        let mut changed = true;
        while changed {
            changed = false;
            for &i in candidates.iter() {
                let mb = &self.memberships[i];
                if sorts.kind(mb.sort) != sorts.kind(sort) || sorts.leq(sort, mb.sort) {
                    continue;
                }
                let applies = Matcher::new(self, mb.lhs, t, Subst::new(), false).any(|(s, _)| {
                    ConditionSearch::new(self, mb.condition.clone(), s)
                        .next()
                        .is_some()
                });
                if applies {
                    self.counters.record_membership();
                    sort = if sorts.is_error(sort) {
                        mb.sort
                    } else {
                        sorts.glb(sort, mb.sort).unwrap_or(mb.sort)
                    };
                    self.sort_cache.write().insert(t, sort);
                    changed = true;
                }
            }
        }
        sort
    }

    /// Does `t` have sort `sort` (after membership refinement)?
    pub fn has_sort(&self, t: TermId, sort: SortId) -> bool {
        self.signature().sorts().leq(self.least_sort(t), sort)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("equations", &self.equations.len())
            .field("rules", &self.rules.len())
            .field("memberships", &self.memberships.len())
            .field("hooks", &self.hooks)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/module.rs"]
mod tests;
