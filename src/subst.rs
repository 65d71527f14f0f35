use crate::sort::SortId;
use crate::term::{Term, TermId, TermStore, VarId};
use hashbrown::HashMap;
use smallvec::SmallVec;

/// A substitution maps variables to terms.
/// Uses Vec<Option<TermId>> indexed by VarId; None means the variable is
/// unbound (maps to itself). Trailing unbound slots are trimmed so equal
/// mappings compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Subst {
    bindings: Vec<Option<TermId>>,
}

impl Subst {
    /// Create an empty substitution.
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Bind a variable to a term.
    /// Extends the substitution if needed.
    pub fn bind(&mut self, var: VarId, term: TermId) {
        let idx = var.index();
        if idx >= self.bindings.len() {
            self.bindings.resize(idx + 1, None);
        }
        self.bindings[idx] = Some(term);
    }

    pub fn unbind(&mut self, var: VarId) {
        if let Some(slot) = self.bindings.get_mut(var.index()) {
            *slot = None;
        }
        while matches!(self.bindings.last(), Some(None)) {
            self.bindings.pop();
        }
    }

    /// Get the binding for a variable, if any.
    pub fn get(&self, var: VarId) -> Option<TermId> {
        self.bindings.get(var.index()).copied().flatten()
    }

    /// Check if a variable is bound.
    pub fn is_bound(&self, var: VarId) -> bool {
        self.get(var).is_some()
    }

    /// Check if the substitution is empty (no bindings).
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.bindings.iter().filter(|b| b.is_some()).count()
    }

    /// Iterator over (var, term) pairs for bound variables, in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, TermId)> + '_ {
        self.bindings
            .iter()
            .enumerate()
            .filter_map(|(i, opt)| opt.map(|tid| (VarId::from_index(i), tid)))
    }

    pub fn domain(&self) -> impl Iterator<Item = VarId> + '_ {
        self.iter().map(|(v, _)| v)
    }

    /// Keep only the bindings of `vars`.
    pub fn restrict(&self, vars: &[VarId]) -> Subst {
        let mut out = Subst::new();
        for &v in vars {
            if let Some(t) = self.get(v) {
                out.bind(v, t);
            }
        }
        out
    }

    /// The composition `theta ∘ self`: apply `self` first, then `theta`.
    pub fn compose(&self, theta: &Subst, terms: &TermStore) -> Subst {
        let mut out = Subst::new();
        for (v, t) in self.iter() {
            let image = apply_subst(t, theta, terms);
            if terms.is_var(image) != Some(v) {
                out.bind(v, image);
            }
        }
        for (v, t) in theta.iter() {
            if !self.is_bound(v) {
                out.bind(v, t);
            }
        }
        out
    }

    /// Turn a triangular solved form (bindings may mention other bound
    /// variables, without cycles) into an idempotent substitution.
    pub fn resolved(&self, terms: &TermStore) -> Subst {
        let mut memo: HashMap<VarId, TermId> = HashMap::new();
        let mut out = Subst::new();
        for (v, _) in self.iter() {
            let t = resolve_var(v, self, terms, &mut memo);
            if terms.is_var(t) != Some(v) {
                out.bind(v, t);
            }
        }
        out
    }

    /// Is every binding a distinct variable of the same sort?
    pub fn is_renaming(&self, terms: &TermStore) -> bool {
        let mut seen: SmallVec<[VarId; 8]> = SmallVec::new();
        for (v, t) in self.iter() {
            match terms.is_var(t) {
                Some(w) if terms.var_sort(w) == terms.var_sort(v) && !seen.contains(&w) => {
                    seen.push(w)
                }
                _ => return false,
            }
        }
        true
    }

    /// Variables occurring in the range of the substitution.
    pub fn range_vars(&self, terms: &TermStore) -> Vec<VarId> {
        let mut out = Vec::new();
        for (_, t) in self.iter() {
            terms.collect_vars(t, &mut out);
        }
        out
    }
}

fn resolve_var(
    v: VarId,
    subst: &Subst,
    terms: &TermStore,
    memo: &mut HashMap<VarId, TermId>,
) -> TermId {
    if let Some(&t) = memo.get(&v) {
        return t;
    }
    let Some(bound) = subst.get(v) else {
        return terms.var_term(v);
    };
    let mut map = Subst::new();
    for w in terms.vars_of(bound) {
        if w != v && subst.is_bound(w) {
            let image = resolve_var(w, subst, terms, memo);
            map.bind(w, image);
        }
    }
    let t = apply_subst(bound, &map, terms);
    memo.insert(v, t);
    t
}

/// Apply a substitution to a term, returning a new canonical term.
/// Replacement is simultaneous: bound terms are not substituted again.
///
/// Uses explicit stack to avoid recursion.
pub fn apply_subst(term: TermId, subst: &Subst, terms: &TermStore) -> TermId {
    if subst.is_empty() || terms.is_ground(term) {
        return term;
    }

    // Stack contains (original term, children_processed)
    let mut work_stack: Vec<(TermId, bool)> = vec![(term, false)];
    let mut result_stack: Vec<TermId> = Vec::new();

    while let Some((tid, children_done)) = work_stack.pop() {
        if children_done {
            if let Term::App(func, children) = terms.term(tid) {
                let n = children.len();
                let new_children: SmallVec<[TermId; 4]> =
                    result_stack.drain(result_stack.len() - n..).collect();
                if new_children == children {
                    result_stack.push(tid);
                } else {
                    result_stack.push(terms.app(func, new_children));
                }
            }
            continue;
        }
        if terms.is_ground(tid) {
            result_stack.push(tid);
            continue;
        }
        match terms.term(tid) {
            Term::Var(v) => result_stack.push(subst.get(v).unwrap_or(tid)),
            Term::App(_, children) => {
                work_stack.push((tid, true));
                // Push children (in reverse order so leftmost processed first)
                for child in children.iter().rev() {
                    work_stack.push((*child, false));
                }
            }
        }
    }

    result_stack.pop().unwrap_or(term)
}

/// Generator of variables named `#n`, numbered above every `#n` already
/// present in the terms it was created for.
#[derive(Debug, Clone)]
pub struct FreshVars {
    next: u32,
}

impl FreshVars {
    pub fn starting_at(next: u32) -> Self {
        Self { next }
    }

    pub fn above(terms: &TermStore, existing: &[TermId]) -> Self {
        let next = terms.max_fresh_index(existing).map_or(0, |n| n + 1);
        Self { next }
    }

    pub fn next_index(&self) -> u32 {
        self.next
    }

    /// Skip past every `#n` occurring in `t`.
    pub fn avoid(&mut self, terms: &TermStore, t: TermId) {
        if let Some(n) = terms.max_fresh_index(&[t]) {
            self.next = self.next.max(n + 1);
        }
    }

    pub fn fresh(&mut self, terms: &TermStore, sort: SortId) -> TermId {
        let name = format!("#{}", self.next);
        self.next += 1;
        terms.var(&name, sort)
    }

    /// Substitution renaming every variable of `ts` to a fresh one of the
    /// same sort, in first-occurrence order.
    pub fn renaming(&mut self, terms: &TermStore, ts: &[TermId]) -> Subst {
        let mut vars = Vec::new();
        for &t in ts {
            terms.collect_vars(t, &mut vars);
        }
        let mut out = Subst::new();
        for v in vars {
            let fresh = self.fresh(terms, terms.var_sort(v));
            out.bind(v, fresh);
        }
        out
    }

    /// Rename the variables of `ts` apart, returning the renamed terms and
    /// the renaming used.
    pub fn rename_apart(&mut self, terms: &TermStore, ts: &[TermId]) -> (Vec<TermId>, Subst) {
        let renaming = self.renaming(terms, ts);
        let renamed = ts
            .iter()
            .map(|&t| apply_subst(t, &renaming, terms))
            .collect();
        (renamed, renaming)
    }
}

#[cfg(test)]
#[path = "tests/subst.rs"]
mod tests;
