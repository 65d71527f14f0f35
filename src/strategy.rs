//! Strategy expressions.
//!
//! Strategies are immutable trees shared through [`StrategyRef`]. The
//! interpreter identifies a strategy node by its allocation, so a loop such
//! as `s *` revisits the same node and repeated configurations are
//! recognized.

use crate::module::{Condition, Module};
use crate::term::TermId;
use hashbrown::HashSet;
use std::fmt;
use std::sync::Arc;

pub type StrategyRef = Arc<Strategy>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Succeeds once, leaving the term unchanged.
    Idle,
    Fail,
    /// One rewrite anywhere with the rules labelled `label`, or any rule.
    Apply(Option<String>),
    /// Succeeds unchanged when `pattern` matches (at the root or, with
    /// `anywhere`, at some subterm) and the condition holds.
    Test {
        pattern: TermId,
        condition: Option<Condition>,
        anywhere: bool,
    },
    Seq(StrategyRef, StrategyRef),
    /// Every alternative, left to right.
    Union(Vec<StrategyRef>),
    /// Zero or more applications.
    Iterate(StrategyRef),
    /// One or more applications.
    Plus(StrategyRef),
    /// Apply until no longer possible (`s !`).
    Normalize(StrategyRef),
    /// `cond ? then : otherwise`: `then` on every result of `cond`, or
    /// `otherwise` on the original term when `cond` has none.
    Branch {
        cond: StrategyRef,
        then: StrategyRef,
        otherwise: StrategyRef,
    },
    /// The first result only.
    One(StrategyRef),
    /// `s ? idle : idle`.
    Try(StrategyRef),
    /// `s ? fail : idle`.
    Not(StrategyRef),
    /// A named strategy of the module.
    Call(String),
}

impl Strategy {
    pub fn idle() -> StrategyRef {
        Arc::new(Strategy::Idle)
    }

    pub fn fail() -> StrategyRef {
        Arc::new(Strategy::Fail)
    }

    pub fn apply(label: &str) -> StrategyRef {
        Arc::new(Strategy::Apply(Some(label.to_string())))
    }

    /// Any rule (`all`).
    pub fn all() -> StrategyRef {
        Arc::new(Strategy::Apply(None))
    }

    pub fn test(pattern: TermId, condition: Option<Condition>) -> StrategyRef {
        Arc::new(Strategy::Test {
            pattern,
            condition,
            anywhere: false,
        })
    }

    pub fn test_anywhere(pattern: TermId, condition: Option<Condition>) -> StrategyRef {
        Arc::new(Strategy::Test {
            pattern,
            condition,
            anywhere: true,
        })
    }

    /// `first ; second`.
    pub fn seq(first: StrategyRef, second: StrategyRef) -> StrategyRef {
        Arc::new(Strategy::Seq(first, second))
    }

    /// Left-nested sequence of several strategies; `idle` when empty.
    pub fn seq_all(parts: impl IntoIterator<Item = StrategyRef>) -> StrategyRef {
        parts
            .into_iter()
            .reduce(Strategy::seq)
            .unwrap_or_else(Strategy::idle)
    }

    pub fn union(alternatives: Vec<StrategyRef>) -> StrategyRef {
        Arc::new(Strategy::Union(alternatives))
    }

    pub fn iterate(s: StrategyRef) -> StrategyRef {
        Arc::new(Strategy::Iterate(s))
    }

    pub fn plus(s: StrategyRef) -> StrategyRef {
        Arc::new(Strategy::Plus(s))
    }

    pub fn normalize(s: StrategyRef) -> StrategyRef {
        Arc::new(Strategy::Normalize(s))
    }

    pub fn branch(cond: StrategyRef, then: StrategyRef, otherwise: StrategyRef) -> StrategyRef {
        Arc::new(Strategy::Branch {
            cond,
            then,
            otherwise,
        })
    }

    pub fn one(s: StrategyRef) -> StrategyRef {
        Arc::new(Strategy::One(s))
    }

    pub fn try_(s: StrategyRef) -> StrategyRef {
        Arc::new(Strategy::Try(s))
    }

    pub fn not(s: StrategyRef) -> StrategyRef {
        Arc::new(Strategy::Not(s))
    }

    pub fn call(name: &str) -> StrategyRef {
        Arc::new(Strategy::Call(name.to_string()))
    }

    fn children(&self) -> Vec<&StrategyRef> {
        match self {
            Strategy::Idle
            | Strategy::Fail
            | Strategy::Apply(_)
            | Strategy::Test { .. }
            | Strategy::Call(_) => Vec::new(),
            Strategy::Seq(a, b) => vec![a, b],
            Strategy::Union(alts) => alts.iter().collect(),
            Strategy::Iterate(s)
            | Strategy::Plus(s)
            | Strategy::Normalize(s)
            | Strategy::One(s)
            | Strategy::Try(s)
            | Strategy::Not(s) => vec![s],
            Strategy::Branch {
                cond,
                then,
                otherwise,
            } => vec![cond, then, otherwise],
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Idle => write!(f, "idle"),
            Strategy::Fail => write!(f, "fail"),
            Strategy::Apply(Some(label)) => write!(f, "{}", label),
            Strategy::Apply(None) => write!(f, "all"),
            Strategy::Test { anywhere: false, .. } => write!(f, "match"),
            Strategy::Test { anywhere: true, .. } => write!(f, "amatch"),
            Strategy::Seq(a, b) => write!(f, "({} ; {})", a, b),
            Strategy::Union(alts) => {
                write!(f, "(")?;
                for (i, a) in alts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Strategy::Iterate(s) => write!(f, "{} *", s),
            Strategy::Plus(s) => write!(f, "{} +", s),
            Strategy::Normalize(s) => write!(f, "{} !", s),
            Strategy::Branch {
                cond,
                then,
                otherwise,
            } => write!(f, "({} ? {} : {})", cond, then, otherwise),
            Strategy::One(s) => write!(f, "one({})", s),
            Strategy::Try(s) => write!(f, "try({})", s),
            Strategy::Not(s) => write!(f, "not({})", s),
            Strategy::Call(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    /// A call to a strategy the module does not define.
    UnknownStrategy(String),
}

impl fmt::Display for StrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyError::UnknownStrategy(name) => write!(f, "unknown strategy {}", name),
        }
    }
}

impl std::error::Error for StrategyError {}

/// Check that every strategy reachable from `strategy`, through calls
/// included, is defined.
pub fn check_calls(module: &Module, strategy: &StrategyRef) -> Result<(), StrategyError> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<StrategyRef> = vec![strategy.clone()];
    while let Some(s) = stack.pop() {
        if let Strategy::Call(name) = s.as_ref() {
            if visited.insert(name.clone()) {
                let body = module
                    .strategy(name)
                    .ok_or_else(|| StrategyError::UnknownStrategy(name.clone()))?;
                stack.push(body.clone());
            }
            continue;
        }
        stack.extend(s.children().into_iter().cloned());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_reads_like_the_strategy_language() {
        let s = Strategy::seq(
            Strategy::iterate(Strategy::apply("step")),
            Strategy::branch(Strategy::apply("done"), Strategy::idle(), Strategy::fail()),
        );
        assert_eq!(s.to_string(), "(step * ; (done ? idle : fail))");
    }

    #[test]
    fn seq_all_of_nothing_is_idle() {
        assert_eq!(*Strategy::seq_all(Vec::new()), Strategy::Idle);
    }

    #[test]
    fn union_displays_alternatives_in_order() {
        let s = Strategy::union(vec![Strategy::apply("a"), Strategy::all(), Strategy::call("f")]);
        assert_eq!(s.to_string(), "(a | all | f)");
    }
}
