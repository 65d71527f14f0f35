//! Callbacks attached to special operators.
//!
//! An operator declared with `special` names a hook; at reduction time the
//! equational hook registered under that name (or the default equational
//! hook, when none is registered) is asked to simplify the term, and at
//! rewrite time the rule hook contributes a one-step successor.

use crate::module::Module;
use crate::signature::{OpId, Special};
use crate::term::TermId;
use hashbrown::HashMap;
use std::sync::Arc;

/// What a hook sees besides the term it is called on.
pub struct HookData<'a> {
    pub module: &'a Module,
    pub op: OpId,
    pub special: &'a Special,
}

impl HookData<'_> {
    /// Extra words declared with the special operator.
    pub fn data(&self) -> &[String] {
        &self.special.data
    }
}

/// A callback attached to a special operator. Returning `None` leaves the
/// term untouched.
///
/// Hooks must be pure: reduction results are memoized.
pub trait Hook: Send + Sync {
    fn run(&self, term: TermId, data: &HookData<'_>) -> Option<TermId>;
}

impl<F> Hook for F
where
    F: Fn(TermId, &HookData<'_>) -> Option<TermId> + Send + Sync,
{
    fn run(&self, term: TermId, data: &HookData<'_>) -> Option<TermId> {
        self(term, data)
    }
}

pub type HookRef = Arc<dyn Hook>;

#[derive(Default)]
struct HookMap {
    named: HashMap<String, HookRef>,
    default: Option<HookRef>,
}

impl HookMap {
    /// Whether a hook was bound, or removed from where one was bound.
    fn connect(&mut self, name: Option<&str>, hook: Option<HookRef>) -> bool {
        match (name, hook) {
            (Some(n), Some(h)) => {
                self.named.insert(n.to_string(), h);
                true
            }
            (Some(n), None) => self.named.remove(n).is_some(),
            (None, Some(h)) => {
                self.default = Some(h);
                true
            }
            (None, None) => self.default.take().is_some(),
        }
    }

    fn lookup(&self, special: &Special) -> Option<&HookRef> {
        self.named.get(&special.name).or(self.default.as_ref())
    }
}

/// Equational and rule hooks of a module.
#[derive(Default)]
pub struct HookTable {
    eq: HookMap,
    rl: HookMap,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or with `hook = None`, remove) the equational hook `name`.
    /// `name = None` sets the default hook used by special operators that
    /// have no hook of their own. Removing a hook that is not there returns
    /// `false`.
    pub fn connect_eq_hook(&mut self, name: Option<&str>, hook: Option<HookRef>) -> bool {
        self.eq.connect(name, hook)
    }

    pub fn connect_rl_hook(&mut self, name: Option<&str>, hook: Option<HookRef>) -> bool {
        self.rl.connect(name, hook)
    }

    pub fn eq_hook(&self, special: &Special) -> Option<&HookRef> {
        self.eq.lookup(special)
    }

    pub fn rl_hook(&self, special: &Special) -> Option<&HookRef> {
        self.rl.lookup(special)
    }

    pub fn is_empty(&self) -> bool {
        self.eq.named.is_empty()
            && self.eq.default.is_none()
            && self.rl.named.is_empty()
            && self.rl.default.is_none()
    }
}

impl std::fmt::Debug for HookTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookTable")
            .field("eq", &self.eq.named.keys().collect::<Vec<_>>())
            .field("eq_default", &self.eq.default.is_some())
            .field("rl", &self.rl.named.keys().collect::<Vec<_>>())
            .field("rl_default", &self.rl.default.is_some())
            .finish()
    }
}

/// Apply the equational hook of `op`, if it is special and one is connected.
pub(crate) fn run_eq_hook(module: &Module, op: OpId, term: TermId) -> Option<TermId> {
    let special = module.signature().special(op)?;
    let hook = module.hooks().eq_hook(special)?;
    hook.run(term, &HookData { module, op, special })
}

pub(crate) fn run_rl_hook(module: &Module, op: OpId, term: TermId) -> Option<TermId> {
    let special = module.signature().special(op)?;
    let hook = module.hooks().rl_hook(special)?;
    hook.run(term, &HookData { module, op, special })
}

#[cfg(test)]
#[path = "tests/hooks.rs"]
mod tests;
