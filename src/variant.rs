//! Folding variant narrowing with the variant equations of a module.
//!
//! A variant of a term list `ts` is a pair `((ts θ)↓, θ↓)` where `↓` is
//! normalization with the variant equations modulo axioms. Variants are
//! generated breadth first: each node is narrowed with every variant
//! equation at every non-variable position, and a new node that is an
//! instance of one already generated is folded away.

use crate::module::{EqSet, Module};
use crate::subst::{apply_subst, FreshVars, Subst};
use crate::term::{TermId, TermStore, VarId};
use crate::unify::{check_theories, drop_instances, images, unify_from, UnifyError};
use crate::matching::{subsumes, Matcher};
use smallvec::SmallVec;
use std::collections::VecDeque;

use crate::trace::{debug_span, trace};

#[derive(Debug, Clone, Default)]
pub struct VariantOptions {
    /// Return only variants that are not instances of another variant.
    /// Requires computing the whole (finite) variant set first.
    pub irredundant: bool,
    /// Terms that must stay irreducible under every variant substitution.
    pub constraints: Vec<TermId>,
}

/// One variant: the normalized instance of the input terms and the
/// normalized substitution producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub terms: Vec<TermId>,
    pub subst: Subst,
}

impl Variant {
    /// The instance of the first input term.
    pub fn term(&self) -> Option<TermId> {
        self.terms.first().copied()
    }
}

#[derive(Debug, Clone)]
struct Node {
    variant: Variant,
    /// `variant.terms` followed by the images of the input variables.
    key: Vec<TermId>,
    fresh: FreshVars,
}

/// Lazy breadth-first variant stream.
pub struct VariantSearch<'m> {
    module: &'m Module,
    vars: Vec<VarId>,
    constraints: Vec<TermId>,
    nodes: Vec<Node>,
    queue: VecDeque<usize>,
    ready: VecDeque<usize>,
    buffered: Option<std::vec::IntoIter<Variant>>,
    irredundant: bool,
}

/// Variants of `terms` with respect to the module's variant equations.
pub fn variants<'m>(
    module: &'m Module,
    terms: &[TermId],
    options: VariantOptions,
) -> Result<VariantSearch<'m>, UnifyError> {
    build(module, terms, options, &[])
}

/// Variant search whose fresh variables also avoid those of `avoid`.
fn build<'m>(
    module: &'m Module,
    terms: &[TermId],
    options: VariantOptions,
    avoid: &[TermId],
) -> Result<VariantSearch<'m>, UnifyError> {
    let _span = debug_span!("variants", terms = terms.len()).entered();
    let store = module.terms();
    let mut to_check = terms.to_vec();
    to_check.extend(variant_lhs(module));
    check_theories(module, &to_check)?;

    let mut vars = Vec::new();
    for &t in terms {
        store.collect_vars(t, &mut vars);
    }
    let mut seeds = terms.to_vec();
    seeds.extend(options.constraints.iter().copied());
    seeds.extend(avoid.iter().copied());
    let fresh = FreshVars::above(store, &seeds);
    let normalized: Vec<TermId> = terms
        .iter()
        .map(|&t| module.reduce_with(t, EqSet::Variant))
        .collect();

    let mut search = VariantSearch {
        module,
        vars,
        constraints: options.constraints,
        nodes: Vec::new(),
        queue: VecDeque::new(),
        ready: VecDeque::new(),
        buffered: None,
        irredundant: options.irredundant,
    };
    let root = Variant {
        terms: normalized,
        subst: Subst::new(),
    };
    if search.satisfies_constraints(&root.subst) {
        search.push(root, fresh);
    }
    Ok(search)
}

fn variant_lhs(module: &Module) -> Vec<TermId> {
    module
        .equations()
        .iter()
        .filter(|e| e.variant)
        .map(|e| e.lhs)
        .collect()
}

impl<'m> VariantSearch<'m> {
    /// Variables of the input terms.
    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    /// Number of variants generated so far, folded ones excluded.
    pub fn generated(&self) -> usize {
        self.nodes.len()
    }

    fn key(&self, variant: &Variant) -> Vec<TermId> {
        let terms = self.module.terms();
        let mut key = variant.terms.clone();
        key.extend(images(terms, &self.vars, &variant.subst));
        key
    }

    fn satisfies_constraints(&self, subst: &Subst) -> bool {
        let terms = self.module.terms();
        self.constraints.iter().all(|&c| {
            let instance = apply_subst(c, subst, terms);
            !self.module.is_reducible(instance, EqSet::Variant)
        })
    }

    fn push(&mut self, variant: Variant, fresh: FreshVars) {
        let key = self.key(&variant);
        if self.nodes.iter().any(|n| subsumes(self.module, &n.key, &key)) {
            trace!(nodes = self.nodes.len(), "variant folded");
            return;
        }
        let mut fresh = fresh;
        for &t in key.iter() {
            fresh.avoid(self.module.terms(), t);
        }
        let index = self.nodes.len();
        self.nodes.push(Node {
            variant,
            key,
            fresh,
        });
        self.queue.push_back(index);
        self.ready.push_back(index);
    }

    /// Narrow one node with every variant equation at every position.
    fn expand(&mut self, index: usize) {
        let module = self.module;
        let terms = module.terms();
        let node = self.nodes[index].clone();
        let mut successors: Vec<(Variant, FreshVars)> = Vec::new();
        for &t in node.variant.terms.iter() {
            for (_, sub) in terms.positions(t) {
                if terms.is_var(sub).is_some() {
                    continue;
                }
                for eq in module.equations().iter().filter(|e| e.variant) {
                    if terms.top_op(eq.lhs) != terms.top_op(sub) {
                        continue;
                    }
                    let mut fresh = node.fresh.clone();
                    let (renamed, _) = fresh.rename_apart(terms, &[eq.lhs]);
                    for lhs in lhs_forms(module, renamed[0], &mut fresh) {
                        let problem = [(sub, lhs)];
                        for sigma in unify_from(module, &problem, false, fresh.clone()) {
                            let mut after = fresh.clone();
                            for (_, image) in sigma.iter() {
                                after.avoid(terms, image);
                            }
                            let variant = self.instantiate(&node.variant, &sigma);
                            if !self.satisfies_constraints(&variant.subst) {
                                continue;
                            }
                            trace!(node = index, "variant narrowing step");
                            successors.push((variant, after));
                        }
                    }
                }
            }
        }
        for (variant, fresh) in successors {
            self.push(variant, fresh);
        }
    }

    fn instantiate(&self, variant: &Variant, sigma: &Subst) -> Variant {
        let module = self.module;
        let terms = module.terms();
        let composed = variant.subst.compose(sigma, terms).restrict(&self.vars);
        Variant {
            terms: variant
                .terms
                .iter()
                .map(|&t| module.reduce_with(apply_subst(t, sigma, terms), EqSet::Variant))
                .collect(),
            subst: normalize_subst(module, &composed),
        }
    }

    fn next_raw(&mut self) -> Option<Variant> {
        loop {
            if let Some(i) = self.ready.pop_front() {
                self.module.counters().record_variant();
                return Some(self.nodes[i].variant.clone());
            }
            let i = self.queue.pop_front()?;
            self.expand(i);
        }
    }

    /// A fresh-variable generator above every variable produced so far.
    pub(crate) fn fresh_above(&self) -> FreshVars {
        self.nodes
            .iter()
            .map(|n| n.fresh.clone())
            .max_by_key(|f| f.next_index())
            .unwrap_or_else(|| FreshVars::starting_at(0))
    }
}

/// Left-hand sides an equation narrows with. An AC left-hand side also
/// gets an extension variable so it applies inside a larger sum, unless one
/// of its arguments is a linear variable of the top sort, which already
/// takes any remainder. Under an identity the extended form covers the plain one.
fn lhs_forms(module: &Module, lhs: TermId, fresh: &mut FreshVars) -> SmallVec<[TermId; 2]> {
    let terms = module.terms();
    let sig = module.signature();
    let sorts = sig.sorts();
    let mut out: SmallVec<[TermId; 2]> = SmallVec::new();
    let Some(op) = terms.top_op(lhs) else {
        out.push(lhs);
        return out;
    };
    let theory = sig.theory(op);
    let args = terms.args(lhs);
    let absorbs = args.iter().any(|&a| {
        terms.is_var(a).is_some_and(|v| {
            let s = terms.var_sort(v);
            sorts.sorts_of(sorts.kind(s)).iter().all(|&t| sorts.leq(t, s))
                && args.iter().filter(|&&b| terms.occurs(v, b)).count() == 1
        })
    });
    if !theory.is_ac() || absorbs {
        out.push(lhs);
        return out;
    }
    if !theory.has_identity() {
        out.push(lhs);
    }
    let rest = fresh.fresh(terms, sorts.error_sort(sig.range_kind(op)));
    out.push(terms.app2(op, lhs, rest));
    out
}

/// Normalize every binding with the variant equations.
pub(crate) fn normalize_subst(module: &Module, subst: &Subst) -> Subst {
    let mut out = Subst::new();
    for (v, t) in subst.iter() {
        out.bind(v, module.reduce_with(t, EqSet::Variant));
    }
    out
}

impl Iterator for VariantSearch<'_> {
    type Item = Variant;

    fn next(&mut self) -> Option<Variant> {
        if !self.irredundant {
            return self.next_raw();
        }
        if self.buffered.is_none() {
            let mut entries = Vec::new();
            while let Some(v) = self.next_raw() {
                entries.push((self.key(&v), v));
            }
            self.buffered = Some(drop_instances(self.module, entries).into_iter());
        }
        self.buffered.as_mut().and_then(|it| it.next())
    }
}

/// Unifiers of `equations` modulo the variant equations and the axioms.
pub struct VariantUnifierSearch<'m> {
    module: &'m Module,
    vars: Vec<VarId>,
    variants: VariantSearch<'m>,
    current: Option<(Subst, crate::unify::UnifierSearch<'m>)>,
    seen: hashbrown::HashSet<Subst>,
    buffered: Option<std::vec::IntoIter<Subst>>,
    filter: bool,
}

/// Unify modulo variant equations: every variant of the equation list is
/// unified modulo axioms and the unifier composed with the variant's
/// substitution. `filter` drops unifiers that are instances of others.
pub fn variant_unify<'m>(
    module: &'m Module,
    equations: &[(TermId, TermId)],
    filter: bool,
) -> Result<VariantUnifierSearch<'m>, UnifyError> {
    variant_unify_avoiding(module, equations, filter, &[])
}

/// [`variant_unify`] with fresh variables also clear of those in `avoid`.
pub(crate) fn variant_unify_avoiding<'m>(
    module: &'m Module,
    equations: &[(TermId, TermId)],
    filter: bool,
    avoid: &[TermId],
) -> Result<VariantUnifierSearch<'m>, UnifyError> {
    let flat: Vec<TermId> = equations.iter().flat_map(|&(l, r)| [l, r]).collect();
    let variants = build(module, &flat, VariantOptions::default(), avoid)?;
    Ok(VariantUnifierSearch {
        module,
        vars: variants.vars().to_vec(),
        variants,
        current: None,
        seen: hashbrown::HashSet::new(),
        buffered: None,
        filter,
    })
}

impl VariantUnifierSearch<'_> {
    fn next_raw(&mut self) -> Option<Subst> {
        let module = self.module;
        let terms = module.terms();
        loop {
            if let Some((theta, unifiers)) = &mut self.current {
                if let Some(sigma) = unifiers.next() {
                    let composed = theta.compose(&sigma, terms).restrict(&self.vars);
                    let solution = normalize_subst(module, &composed);
                    if self.seen.insert(solution.clone()) {
                        return Some(solution);
                    }
                    continue;
                }
                self.current = None;
            }
            let variant = self.variants.next()?;
            let pairs: Vec<(TermId, TermId)> = variant
                .terms
                .chunks(2)
                .filter_map(|c| match c {
                    [l, r] => Some((*l, *r)),
                    _ => None,
                })
                .collect();
            let mut fresh = self.variants.fresh_above();
            avoid_all(terms, &mut fresh, &variant);
            let unifiers = unify_from(module, &pairs, false, fresh);
            self.current = Some((variant.subst, unifiers));
        }
    }
}

fn avoid_all(terms: &TermStore, fresh: &mut FreshVars, variant: &Variant) {
    for &t in variant.terms.iter() {
        fresh.avoid(terms, t);
    }
    for (_, t) in variant.subst.iter() {
        fresh.avoid(terms, t);
    }
}

impl Iterator for VariantUnifierSearch<'_> {
    type Item = Subst;

    fn next(&mut self) -> Option<Subst> {
        if !self.filter {
            return self.next_raw();
        }
        if self.buffered.is_none() {
            let mut entries = Vec::new();
            while let Some(s) = self.next_raw() {
                entries.push((images(self.module.terms(), &self.vars, &s), s));
            }
            self.buffered = Some(drop_instances(self.module, entries).into_iter());
        }
        self.buffered.as_mut().and_then(|it| it.next())
    }
}

/// Matches of `pattern_i` against `subject_i` modulo the variant equations.
/// Subject variables are treated as constants.
pub struct VariantMatchSearch<'m> {
    module: &'m Module,
    vars: Vec<VarId>,
    subjects: Vec<TermId>,
    variants: VariantSearch<'m>,
    current: Option<(Subst, Matcher<'m>)>,
    seen: hashbrown::HashSet<Subst>,
}

pub fn variant_match<'m>(
    module: &'m Module,
    pairs: &[(TermId, TermId)],
) -> Result<VariantMatchSearch<'m>, UnifyError> {
    let patterns: Vec<TermId> = pairs.iter().map(|&(p, _)| p).collect();
    let subjects: Vec<TermId> = pairs
        .iter()
        .map(|&(_, s)| module.reduce_with(s, EqSet::Variant))
        .collect();
    let variants = build(module, &patterns, VariantOptions::default(), &subjects)?;
    Ok(VariantMatchSearch {
        module,
        vars: variants.vars().to_vec(),
        subjects,
        variants,
        current: None,
        seen: hashbrown::HashSet::new(),
    })
}

impl Iterator for VariantMatchSearch<'_> {
    type Item = Subst;

    fn next(&mut self) -> Option<Subst> {
        let module = self.module;
        let terms = module.terms();
        loop {
            if let Some((theta, matches)) = &mut self.current {
                if let Some((rho, _)) = matches.next() {
                    let composed = theta.compose(&rho, terms).restrict(&self.vars);
                    let solution = normalize_subst(module, &composed);
                    if self.seen.insert(solution.clone()) {
                        return Some(solution);
                    }
                    continue;
                }
                self.current = None;
            }
            let variant = self.variants.next()?;
            let pairs: Vec<(TermId, TermId)> = variant
                .terms
                .iter()
                .copied()
                .zip(self.subjects.iter().copied())
                .collect();
            let matcher = Matcher::pairs(module, &pairs, Subst::new());
            self.current = Some((variant.subst, matcher));
        }
    }
}

#[cfg(test)]
#[path = "tests/variant.rs"]
mod tests;
