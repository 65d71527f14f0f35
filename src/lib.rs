//! Order-sorted term rewriting core.
//!
//! A [`Module`](module::Module) bundles a signature with equations,
//! memberships, rules and named strategies. On top of it the crate
//! provides equational reduction, matching and unification modulo
//! associativity, commutativity, identity and idempotence, rule rewriting
//! and search, variant generation, narrowing, a strategy interpreter and
//! LTL model checking over rewrite graphs.

pub mod ac_unify;
pub mod condition;
pub mod context;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod ltl;
pub mod matching;
pub mod model_check;
pub mod module;
pub mod narrowing;
pub mod parse;
pub mod rewrite;
pub mod search;
pub mod signature;
pub mod sort;
pub mod stats;
pub mod strategy;
pub mod strategy_exec;
pub mod subst;
pub mod symbol;
pub mod term;
pub mod trace;
pub mod unify;
pub mod variant;

pub use error::{Error, Result};
pub use module::{Module, ModuleBuilder};
pub use signature::{OpAttrs, Signature, SignatureBuilder};
pub use term::{TermId, TermStore};

#[cfg(test)]
pub(crate) mod test_utils;
