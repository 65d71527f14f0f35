//! Prefix term syntax.
//!
//! Syntax:
//! - `c` - constant
//! - `f(t1, ..., tn)` - application; associative operators take any
//!   number of arguments from two up
//! - `X:Sort` - variable of a sort
//! - `X:[Sort]` - variable of the kind containing `Sort`
//!
//! Operator names are any run of characters other than whitespace, `(`,
//! `)`, `,` and `:`, so mixfix names such as `_+_` or `<_>` are written in
//! prefix form: `_+_(X:Nat, 0)`. Overloaded names are resolved by arity and
//! argument kinds, trying declarations in order.

use crate::module::Module;
use crate::signature::OpId;
use crate::sort::{KindId, SortId};
use crate::term::{Args, TermId};

/// Parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error at position {}: {}", self.position, self.message)
    }
}

impl std::error::Error for ParseError {}

fn error(message: impl Into<String>, position: usize) -> ParseError {
    ParseError {
        message: message.into(),
        position,
    }
}

/// Term as written, before operator resolution.
#[derive(Debug)]
enum Raw {
    Var {
        name: String,
        sort: SortId,
        position: usize,
    },
    App {
        name: String,
        args: Vec<Raw>,
        position: usize,
    },
}

/// Parse `text` as a term of `module`. With `expected_kind`, the term must
/// belong to that kind.
pub fn parse_term(
    module: &Module,
    text: &str,
    expected_kind: Option<KindId>,
) -> Result<TermId, ParseError> {
    let input: Vec<char> = text.chars().collect();
    let mut pos = 0;
    let raw = parse_raw(module, &input, &mut pos)?;
    skip_whitespace(&input, &mut pos);
    if pos < input.len() {
        return Err(error("unexpected characters after term", pos));
    }
    resolve(module, &raw, expected_kind)
}

fn skip_whitespace(input: &[char], pos: &mut usize) {
    while *pos < input.len() && input[*pos].is_whitespace() {
        *pos += 1;
    }
}

fn is_name_char(ch: char) -> bool {
    !ch.is_whitespace() && !matches!(ch, '(' | ')' | ',' | ':')
}

fn parse_name(input: &[char], pos: &mut usize) -> Result<String, ParseError> {
    let start = *pos;
    while *pos < input.len() && is_name_char(input[*pos]) {
        *pos += 1;
    }
    if *pos == start {
        return Err(error("expected a name", start));
    }
    Ok(input[start..*pos].iter().collect())
}

/// `Sort` or `[Sort,...]`; the bracketed form names the kind's error sort.
fn parse_sort(module: &Module, input: &[char], pos: &mut usize) -> Result<SortId, ParseError> {
    let sig = module.signature();
    let start = *pos;
    if input.get(*pos) == Some(&'[') {
        let close = input[*pos..]
            .iter()
            .position(|&c| c == ']')
            .ok_or_else(|| error("unclosed kind", start))?;
        let inside: String = input[*pos + 1..*pos + close].iter().collect();
        *pos += close + 1;
        let first = inside.split(',').next().unwrap_or("").trim();
        let sort = sig
            .find_sort(first)
            .ok_or_else(|| error(format!("unknown sort {}", first), start))?;
        let sorts = sig.sorts();
        return Ok(sorts.error_sort(sorts.kind(sort)));
    }
    let name = parse_name(input, pos)?;
    sig.find_sort(&name)
        .ok_or_else(|| error(format!("unknown sort {}", name), start))
}

fn parse_raw(module: &Module, input: &[char], pos: &mut usize) -> Result<Raw, ParseError> {
    skip_whitespace(input, pos);
    let start = *pos;
    let name = parse_name(input, pos)?;
    match input.get(*pos) {
        Some(':') => {
            *pos += 1;
            let sort = parse_sort(module, input, pos)?;
            Ok(Raw::Var {
                name,
                sort,
                position: start,
            })
        }
        Some('(') => {
            *pos += 1;
            let mut args = Vec::new();
            loop {
                args.push(parse_raw(module, input, pos)?);
                skip_whitespace(input, pos);
                match input.get(*pos) {
                    Some(',') => *pos += 1,
                    Some(')') => {
                        *pos += 1;
                        break;
                    }
                    _ => return Err(error("expected ',' or ')'", *pos)),
                }
            }
            Ok(Raw::App {
                name,
                args,
                position: start,
            })
        }
        _ => Ok(Raw::App {
            name,
            args: Vec::new(),
            position: start,
        }),
    }
}

fn candidates(module: &Module, name: &str, arity: usize) -> Vec<OpId> {
    let sig = module.signature();
    let mut ops = sig.find_ops(name, arity).to_vec();
    if arity > 2 {
        ops.extend(
            sig.find_ops(name, 2)
                .iter()
                .copied()
                .filter(|&op| sig.theory(op).is_assoc()),
        );
    }
    ops
}

fn resolve(module: &Module, raw: &Raw, expected: Option<KindId>) -> Result<TermId, ParseError> {
    let terms = module.terms();
    let sig = module.signature();
    match raw {
        Raw::Var {
            name,
            sort,
            position,
        } => {
            let v = terms.var(name, *sort);
            if expected.is_some_and(|k| k != sig.sorts().kind(*sort)) {
                return Err(error(
                    format!("variable {} has the wrong kind", name),
                    *position,
                ));
            }
            Ok(v)
        }
        Raw::App {
            name,
            args,
            position,
        } => {
            let ops = candidates(module, name, args.len());
            if ops.is_empty() {
                return Err(error(
                    format!("no operator {} with {} arguments", name, args.len()),
                    *position,
                ));
            }
            let mut last_error = None;
            for op in ops {
                if expected.is_some_and(|k| k != sig.range_kind(op)) {
                    continue;
                }
                let domain = sig.domain_kinds(op);
                let mut resolved: Args = Args::new();
                let mut failed = None;
                for (i, arg) in args.iter().enumerate() {
                    let kind = domain.get(i.min(domain.len().saturating_sub(1))).copied();
                    match resolve(module, arg, kind) {
                        Ok(t) => resolved.push(t),
                        Err(e) => {
                            failed = Some(e);
                            break;
                        }
                    }
                }
                if let Some(e) = failed {
                    last_error = Some(e);
                    continue;
                }
                let term = if resolved.len() > 2 {
                    resolved
                        .iter()
                        .copied()
                        .reduce(|acc, next| terms.app2(op, acc, next))
                        .unwrap_or_else(|| terms.app(op, Args::new()))
                } else {
                    terms.app(op, resolved)
                };
                return Ok(term);
            }
            Err(last_error.unwrap_or_else(|| {
                error(format!("{} does not fit the expected kind", name), *position)
            }))
        }
    }
}

#[cfg(test)]
#[path = "tests/parse.rs"]
mod tests;
