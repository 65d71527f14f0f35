//! Where a match happened: a position in the subject plus, for matches
//! against part of an assoc or AC application, the arguments left over.

use crate::signature::OpId;
use crate::term::{Args, Position, TermId, TermStore};
use smallvec::SmallVec;

/// Arguments of an assoc/AC application not covered by a match with
/// extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// AC: the unmatched arguments (as a multiset).
    Ac { op: OpId, rest: Args },
    /// Assoc: the unmatched arguments before and after the matched segment.
    Assoc { op: OpId, left: Args, right: Args },
}

impl Extension {
    pub fn op(&self) -> OpId {
        match self {
            Extension::Ac { op, .. } | Extension::Assoc { op, .. } => *op,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Extension::Ac { rest, .. } => rest.is_empty(),
            Extension::Assoc { left, right, .. } => left.is_empty() && right.is_empty(),
        }
    }

    /// Put `replacement` in place of the matched arguments.
    pub fn plug(&self, terms: &TermStore, replacement: TermId) -> TermId {
        let mut args: Args = SmallVec::new();
        match self {
            Extension::Ac { op, rest } => {
                if rest.is_empty() {
                    return replacement;
                }
                args.push(replacement);
                args.extend(rest.iter().copied());
                terms.app(*op, args)
            }
            Extension::Assoc { op, left, right } => {
                if left.is_empty() && right.is_empty() {
                    return replacement;
                }
                args.extend(left.iter().copied());
                args.push(replacement);
                args.extend(right.iter().copied());
                terms.app(*op, args)
            }
        }
    }

    /// The matched part of `whole`, an application of the extension's operator.
    pub fn matched_part(&self, terms: &TermStore, whole: TermId) -> TermId {
        let op = self.op();
        let mut elems = terms.list_of(op, whole);
        match self {
            Extension::Ac { rest, .. } => {
                for r in rest.iter() {
                    if let Some(i) = elems.iter().position(|e| e == r) {
                        elems.remove(i);
                    }
                }
            }
            Extension::Assoc { left, right, .. } => {
                let end = elems.len().saturating_sub(right.len());
                let start = left.len().min(end);
                elems = elems[start..end].iter().copied().collect();
            }
        }
        terms.app(op, elems)
    }
}

/// The enclosing term of a match with a hole at `position`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Context {
    pub position: Position,
    pub extension: Option<Extension>,
}

impl Context {
    /// The identity context.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn at(position: Position, extension: Option<Extension>) -> Self {
        Self {
            position,
            extension: extension.filter(|e| !e.is_empty()),
        }
    }

    pub fn is_root(&self) -> bool {
        self.position.is_empty() && self.extension.is_none()
    }

    pub fn depth(&self) -> usize {
        self.position.len()
    }

    /// Rebuild `root` with `replacement` in the hole.
    pub fn plug(&self, terms: &TermStore, root: TermId, replacement: TermId) -> TermId {
        let inner = match &self.extension {
            Some(ext) => ext.plug(terms, replacement),
            None => replacement,
        };
        terms.replace_at(root, &self.position, inner)
    }

    /// The subterm of `root` the pattern was matched against.
    pub fn matched_portion(&self, terms: &TermStore, root: TermId) -> Option<TermId> {
        let sub = terms.subterm(root, &self.position)?;
        Some(match &self.extension {
            Some(ext) => ext.matched_part(terms, sub),
            None => sub,
        })
    }
}
