//! AC and ACU unification of two argument multisets.
//!
//! After cancelling common arguments, `s1 + .. + sm = t1 + .. + tn` becomes
//! the linear Diophantine equation `Σ a_i x_i = Σ b_j y_j` over the
//! multiplicities. Each minimal solution (basis vector) is a column that
//! gets its own atom: a fresh variable, or the non-variable argument it
//! contains. A unifier picks a set of columns in which every non-variable
//! argument occurs exactly once and, without an identity, every variable at
//! least once. Column sets are enumerated lazily, most general first.

use crate::module::Module;
use crate::signature::OpId;
use crate::subst::FreshVars;
use crate::term::{Args, TermId};
use smallvec::SmallVec;

type Vector = SmallVec<[u32; 8]>;

/// One distinct argument of either side with its multiplicity.
#[derive(Debug, Clone)]
struct Unknown {
    term: TermId,
    coefficient: u32,
    is_var: bool,
}

/// Minimal nonzero solutions of `Σ a_i x_i = Σ b_j y_j` with
/// `x_i <= x_max[i]` and `y_j <= y_max[j]`.
pub(crate) fn diophantine_basis(
    a: &[u32],
    x_max: &[u32],
    b: &[u32],
    y_max: &[u32],
) -> Vec<(Vector, Vector)> {
    let mut candidates: Vec<(Vector, Vector)> = Vec::new();
    let mut x: Vector = SmallVec::from_elem(0, a.len());
    loop {
        let sum: u32 = a.iter().zip(x.iter()).map(|(c, v)| c * v).sum();
        if sum > 0 {
            let mut y: Vector = SmallVec::from_elem(0, b.len());
            fill_right(b, y_max, 0, sum, &mut y, &x, &mut candidates);
        }
        if !odometer(&mut x, x_max) {
            break;
        }
    }
    let minimal: Vec<(Vector, Vector)> = candidates
        .iter()
        .filter(|(x, y)| {
            !candidates
                .iter()
                .any(|(x2, y2)| (x2 != x || y2 != y) && below(x2, x) && below(y2, y))
        })
        .cloned()
        .collect();
    minimal
}

fn fill_right(
    b: &[u32],
    y_max: &[u32],
    j: usize,
    remaining: u32,
    y: &mut Vector,
    x: &Vector,
    out: &mut Vec<(Vector, Vector)>,
) {
    if j == b.len() {
        if remaining == 0 {
            out.push((x.clone(), y.clone()));
        }
        return;
    }
    let mut v = 0;
    while v <= y_max[j] && v * b[j] <= remaining {
        y[j] = v;
        fill_right(b, y_max, j + 1, remaining - v * b[j], y, x, out);
        v += 1;
    }
    y[j] = 0;
}

fn odometer(c: &mut [u32], max: &[u32]) -> bool {
    for j in 0..c.len() {
        if c[j] < max[j] {
            c[j] += 1;
            for k in c.iter_mut().take(j) {
                *k = 0;
            }
            return true;
        }
    }
    false
}

fn below(a: &[u32], b: &[u32]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x <= y)
}

/// Lazily enumerated solutions of one AC(U) equation. Each solution is a
/// list of new equations `variable = op(atoms)` and `argument = atom`.
#[derive(Debug)]
pub(crate) struct AcProblem {
    op: OpId,
    identity: Option<TermId>,
    unknowns: Vec<Unknown>,
    /// Column values per unknown (left unknowns first).
    columns: Vec<Vector>,
    path: Vec<bool>,
    nonvar_use: Vec<u32>,
    started: bool,
    done: bool,
}

pub(crate) enum AcStart {
    /// Nothing left after cancellation.
    Solved,
    /// No solution.
    Fail,
    /// Only one side is non-empty: every remaining argument must be the identity.
    Identity(Vec<(TermId, TermId)>),
    Search(AcProblem),
}

impl AcProblem {
    pub(crate) fn start(module: &Module, op: OpId, lhs: Args, rhs: Args) -> AcStart {
        let terms = module.terms();
        let identity = terms.identity_of(op);

        let mut left: Vec<TermId> = lhs.into_vec();
        let mut right: Vec<TermId> = Vec::new();
        for t in rhs {
            match left.iter().position(|&l| l == t) {
                Some(i) => {
                    left.remove(i);
                }
                None => right.push(t),
            }
        }
        if left.is_empty() && right.is_empty() {
            return AcStart::Solved;
        }
        if left.is_empty() || right.is_empty() {
            let Some(id) = identity else {
                return AcStart::Fail;
            };
            let rest = if left.is_empty() { right } else { left };
            if rest.iter().any(|&t| terms.is_var(t).is_none()) {
                return AcStart::Fail;
            }
            return AcStart::Identity(rest.into_iter().map(|t| (t, id)).collect());
        }

        let group = |side: &[TermId]| -> Vec<Unknown> {
            let mut out: Vec<Unknown> = Vec::new();
            for &t in side {
                match out.iter_mut().find(|u| u.term == t) {
                    Some(u) => u.coefficient += 1,
                    None => out.push(Unknown {
                        term: t,
                        coefficient: 1,
                        is_var: terms.is_var(t).is_some(),
                    }),
                }
            }
            out
        };
        let l = group(&left);
        let r = group(&right);
        let a: Vector = l.iter().map(|u| u.coefficient).collect();
        let b: Vector = r.iter().map(|u| u.coefficient).collect();
        let a_top = a.iter().copied().max().unwrap_or(1);
        let b_top = b.iter().copied().max().unwrap_or(1);
        let x_max: Vector = l.iter().map(|u| if u.is_var { b_top } else { 1 }).collect();
        let y_max: Vector = r.iter().map(|u| if u.is_var { a_top } else { 1 }).collect();

        let basis = diophantine_basis(&a, &x_max, &b, &y_max);
        if basis.is_empty() {
            return AcStart::Fail;
        }
        let columns: Vec<Vector> = basis
            .into_iter()
            .map(|(x, y)| x.into_iter().chain(y).collect())
            .collect();
        let mut unknowns = l;
        unknowns.extend(r);

        let nonvar_use = vec![0; unknowns.len()];
        AcStart::Search(AcProblem {
            op,
            identity,
            unknowns,
            columns,
            path: Vec::new(),
            nonvar_use,
            started: false,
            done: false,
        })
    }

    fn feasible_with(&self, column: usize) -> bool {
        self.columns[column]
            .iter()
            .zip(self.unknowns.iter())
            .enumerate()
            .all(|(i, (&v, u))| u.is_var || v == 0 || self.nonvar_use[i] + v <= 1)
    }

    fn set_use(&mut self, column: usize, add: bool) {
        for i in 0..self.unknowns.len() {
            if !self.unknowns[i].is_var {
                let v = self.columns[column][i];
                if add {
                    self.nonvar_use[i] += v;
                } else {
                    self.nonvar_use[i] -= v;
                }
            }
        }
    }

    fn descend(&mut self) {
        while self.path.len() < self.columns.len() {
            let c = self.path.len();
            if self.feasible_with(c) {
                self.set_use(c, true);
                self.path.push(true);
            } else {
                self.path.push(false);
            }
        }
    }

    /// Move to the next leaf of the include/exclude tree.
    fn backtrack(&mut self) -> bool {
        while let Some(last) = self.path.pop() {
            if last {
                let c = self.path.len();
                self.set_use(c, false);
                self.path.push(false);
                self.descend();
                return true;
            }
        }
        false
    }

    /// Columns included on the current path. Under an identity a column of
    /// variables only may be left out: its variables then collapse to the
    /// identity, which is not an instance of keeping it when the sorts of
    /// those variables exclude the identity.
    fn chosen(&self) -> Vec<usize> {
        self.path
            .iter()
            .enumerate()
            .filter(|(_, inc)| **inc)
            .map(|(c, _)| c)
            .collect()
    }

    fn valid(&self, chosen: &[usize]) -> bool {
        for (i, u) in self.unknowns.iter().enumerate() {
            let total: u32 = chosen.iter().map(|&c| self.columns[c][i]).sum();
            if !u.is_var && total != 1 {
                return false;
            }
            if u.is_var && total == 0 && self.identity.is_none() {
                return false;
            }
        }
        true
    }

    /// Equations describing the next column choice, or `None` when exhausted.
    pub(crate) fn next_solution(
        &mut self,
        module: &Module,
        fresh: &mut FreshVars,
    ) -> Option<Vec<(TermId, TermId)>> {
        loop {
            if self.done {
                return None;
            }
            if !self.started {
                self.started = true;
                self.descend();
            } else if !self.backtrack() {
                self.done = true;
                return None;
            }
            let chosen = self.chosen();
            if !self.valid(&chosen) {
                continue;
            }
            if let Some(eqs) = self.assign(module, &chosen, fresh) {
                return Some(eqs);
            }
        }
    }

    fn assign(
        &self,
        module: &Module,
        chosen: &[usize],
        fresh: &mut FreshVars,
    ) -> Option<Vec<(TermId, TermId)>> {
        let terms = module.terms();
        let sorts = module.signature().sorts();
        let kind = module.signature().range_kind(self.op);

        let mut atoms: SmallVec<[TermId; 8]> = SmallVec::new();
        let mut eqs: Vec<(TermId, TermId)> = Vec::new();
        for &c in chosen {
            let column = &self.columns[c];
            let nonvar = column
                .iter()
                .zip(self.unknowns.iter())
                .find(|&(&v, u)| v > 0 && !u.is_var)
                .map(|(_, u)| u.term);
            let atom = match nonvar {
                Some(t) => t,
                None => {
                    let mut sort = None;
                    for (&v, u) in column.iter().zip(self.unknowns.iter()) {
                        if v == 0 {
                            continue;
                        }
                        let vs = terms.sort_of(u.term);
                        sort = match sort {
                            None => Some(vs),
                            Some(s) => sorts.glb(s, vs).or(Some(sorts.error_sort(kind))),
                        };
                    }
                    let sort = sort.unwrap_or_else(|| sorts.error_sort(kind));
                    fresh.fresh(terms, sort)
                }
            };
            atoms.push(atom);
        }

        for (i, u) in self.unknowns.iter().enumerate() {
            let mut elems: Args = SmallVec::new();
            for (k, &c) in chosen.iter().enumerate() {
                for _ in 0..self.columns[c][i] {
                    elems.push(atoms[k]);
                }
            }
            let value = match elems.len() {
                0 => self.identity?,
                1 => elems[0],
                _ => terms.app(self.op, elems),
            };
            if value != u.term {
                eqs.push((u.term, value));
            }
        }
        Some(eqs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_of_x_equals_y() {
        let basis = diophantine_basis(&[1], &[1], &[1], &[1]);
        assert_eq!(basis.len(), 1);
        assert_eq!(basis[0].0.as_slice(), &[1]);
        assert_eq!(basis[0].1.as_slice(), &[1]);
    }

    #[test]
    fn basis_of_two_x_equals_y_plus_z() {
        // 2x = y + z
        let basis = diophantine_basis(&[2], &[1], &[1, 1], &[2, 2]);
        let mut rows: Vec<(Vec<u32>, Vec<u32>)> = basis
            .into_iter()
            .map(|(x, y)| (x.to_vec(), y.to_vec()))
            .collect();
        rows.sort();
        assert_eq!(
            rows,
            vec![
                (vec![1], vec![0, 2]),
                (vec![1], vec![1, 1]),
                (vec![1], vec![2, 0]),
            ]
        );
    }

    #[test]
    fn basis_respects_bounds() {
        // x = y with x bounded to 0 has no nonzero solution.
        assert!(diophantine_basis(&[1], &[0], &[1], &[1]).is_empty());
    }

    #[test]
    fn odometer_enumerates_every_vector() {
        let mut c = [0u32, 0];
        let mut count = 1;
        while odometer(&mut c, &[1, 2]) {
            count += 1;
        }
        assert_eq!(count, 6);
    }
}
