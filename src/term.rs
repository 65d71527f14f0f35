use crate::signature::{OpId, Signature, Theory};
use crate::sort::{KindId, SortId};
use crate::symbol::NameId;
use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxHasher;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Unique identifier for a term in the term store.
/// Equal canonical terms have equal ids, so equality modulo the operators'
/// attributes is id equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(u32);

impl TermId {
    /// Get the raw u32 value (for debugging/display).
    pub fn raw(self) -> u32 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u32) -> Self {
        TermId(raw)
    }
}

/// An interned `(name, sort)` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(i: usize) -> Self {
        VarId(i as u32)
    }
}

pub type Args = SmallVec<[TermId; 4]>;

/// A term is either a variable or an operator application. Applications of
/// assoc operators are stored flattened, comm arguments sorted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Var(VarId),
    App(OpId, Args),
}

/// Path of argument indices from a root to a subterm.
pub type Position = SmallVec<[u32; 8]>;

#[derive(Debug, Clone)]
struct Node {
    term: Term,
    sort: SortId,
    ground: bool,
}

#[derive(Debug, Clone, Copy)]
struct VarInfo {
    name: NameId,
    sort: SortId,
}

/// Number of shards for hashcons maps (power of 2 for fast modulo).
const NUM_SHARDS: usize = 16;

/// Thread-safe term store with hashconsing and canonical forms modulo
/// assoc/comm/identity/idem.
///
/// Guarantees:
/// - Terms equal modulo the attributes get the same TermId
/// - Every node carries its least declared sort
/// - TermId can be resolved back to the term
pub struct TermStore {
    sig: Arc<Signature>,
    nodes: RwLock<Vec<Node>>,
    shards: [RwLock<HashMap<Term, TermId>>; NUM_SHARDS],
    vars: RwLock<Vec<VarInfo>>,
    var_index: RwLock<HashMap<(NameId, SortId), VarId>>,
}

impl TermStore {
    pub fn new(sig: Arc<Signature>) -> Self {
        let shards = std::array::from_fn(|_| RwLock::new(HashMap::new()));
        Self {
            sig,
            nodes: RwLock::new(Vec::new()),
            shards,
            vars: RwLock::new(Vec::new()),
            var_index: RwLock::new(HashMap::new()),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.sig
    }

    pub fn signature_ref(&self) -> &Arc<Signature> {
        &self.sig
    }

    /// Intern an already canonical term.
    fn intern(&self, term: Term) -> TermId {
        let shard = &self.shards[Self::shard_index(&term)];

        {
            let map = shard.read();
            if let Some(&id) = map.get(&term) {
                return id;
            }
        }

        let mut map = shard.write();
        if let Some(&id) = map.get(&term) {
            return id;
        }

        let (sort, ground) = self.node_sort(&term);
        let id = {
            let mut nodes = self.nodes.write();
            let id = TermId(nodes.len() as u32);
            nodes.push(Node {
                term: term.clone(),
                sort,
                ground,
            });
            id
        };
        map.insert(term, id);
        id
    }

    fn node_sort(&self, term: &Term) -> (SortId, bool) {
        match term {
            Term::Var(v) => (self.vars.read()[v.index()].sort, false),
            Term::App(op, args) => {
                let nodes = self.nodes.read();
                let sorts: SmallVec<[SortId; 4]> =
                    args.iter().map(|a| nodes[a.0 as usize].sort).collect();
                let ground = args.iter().all(|a| nodes[a.0 as usize].ground);
                drop(nodes);
                (self.sig.least_sort(*op, &sorts), ground)
            }
        }
    }

    fn shard_index(term: &Term) -> usize {
        let mut hasher = FxHasher::default();
        term.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    // ========== VARIABLES ==========

    /// Intern the variable `name:sort`.
    pub fn var_id(&self, name: &str, sort: SortId) -> VarId {
        let name = self.sig.names().intern(name);
        if let Some(&v) = self.var_index.read().get(&(name, sort)) {
            return v;
        }
        let mut index = self.var_index.write();
        if let Some(&v) = index.get(&(name, sort)) {
            return v;
        }
        let mut vars = self.vars.write();
        let v = VarId(vars.len() as u32);
        vars.push(VarInfo { name, sort });
        index.insert((name, sort), v);
        v
    }

    /// The variable term `name:sort`.
    pub fn var(&self, name: &str, sort: SortId) -> TermId {
        let v = self.var_id(name, sort);
        self.var_term(v)
    }

    pub fn var_term(&self, v: VarId) -> TermId {
        self.intern(Term::Var(v))
    }

    pub fn var_sort(&self, v: VarId) -> SortId {
        self.vars.read()[v.index()].sort
    }

    pub fn var_name(&self, v: VarId) -> String {
        let name = self.vars.read()[v.index()].name;
        self.sig.names().name(name).to_string()
    }

    /// Index `n` of a generated variable named `#n`, if this is one.
    pub fn fresh_index(&self, v: VarId) -> Option<u32> {
        let name = self.var_name(v);
        name.strip_prefix('#').and_then(|n| n.parse().ok())
    }

    // ========== APPLICATIONS ==========

    /// Build `op(args)` in canonical form.
    pub fn app(&self, op: OpId, args: Args) -> TermId {
        match self.sig.theory(op) {
            Theory::Free => self.intern(Term::App(op, args)),
            Theory::Comm => {
                let mut args = args;
                if args.len() == 2 && self.compare(args[0], args[1]) == Ordering::Greater {
                    args.swap(0, 1);
                }
                self.intern(Term::App(op, args))
            }
            theory => self.assoc_app(op, theory, args),
        }
    }

    fn assoc_app(&self, op: OpId, theory: Theory, args: Args) -> TermId {
        let identity = self.sig.identity(op).map(|id| self.constant(id));
        let mut flat: Args = SmallVec::new();
        for arg in args {
            match self.term(arg) {
                Term::App(inner, kids) if inner == op => flat.extend(kids),
                _ => {
                    if Some(arg) != identity {
                        flat.push(arg);
                    }
                }
            }
        }
        if let Some(id) = identity {
            flat.retain(|a| *a != id);
        }
        if theory.is_ac() {
            flat.sort_by(|a, b| self.compare(*a, *b));
        }
        if theory.is_idem() {
            flat.dedup();
        }
        match flat.len() {
            0 => match identity {
                Some(id) => id,
                None => self.intern(Term::App(op, flat)),
            },
            1 => flat[0],
            _ => self.intern(Term::App(op, flat)),
        }
    }

    /// Create a constant.
    pub fn constant(&self, op: OpId) -> TermId {
        self.intern(Term::App(op, SmallVec::new()))
    }

    pub fn app1(&self, op: OpId, child: TermId) -> TermId {
        self.app(op, smallvec::smallvec![child])
    }

    pub fn app2(&self, op: OpId, left: TermId, right: TermId) -> TermId {
        self.app(op, smallvec::smallvec![left, right])
    }

    /// Identity element of `op` as a term.
    pub fn identity_of(&self, op: OpId) -> Option<TermId> {
        self.sig.identity(op).map(|id| self.constant(id))
    }

    // ========== QUERIES ==========

    /// Resolve a TermId to its term. Returns None if the TermId is invalid.
    pub fn resolve(&self, id: TermId) -> Option<Term> {
        self.nodes.read().get(id.0 as usize).map(|n| n.term.clone())
    }

    /// Resolve an id issued by this store.
    pub fn term(&self, id: TermId) -> Term {
        self.nodes.read()[id.0 as usize].term.clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_var(&self, id: TermId) -> Option<VarId> {
        match self.term(id) {
            Term::Var(v) => Some(v),
            Term::App(..) => None,
        }
    }

    pub fn is_app(&self, id: TermId) -> Option<(OpId, Args)> {
        match self.term(id) {
            Term::Var(_) => None,
            Term::App(f, args) => Some((f, args)),
        }
    }

    pub fn top_op(&self, id: TermId) -> Option<OpId> {
        match &self.nodes.read()[id.0 as usize].term {
            Term::App(op, _) => Some(*op),
            Term::Var(_) => None,
        }
    }

    pub fn args(&self, id: TermId) -> Args {
        match self.term(id) {
            Term::App(_, args) => args,
            Term::Var(_) => SmallVec::new(),
        }
    }

    /// Least declared sort (memberships are applied by the module).
    pub fn sort_of(&self, id: TermId) -> SortId {
        self.nodes.read()[id.0 as usize].sort
    }

    pub fn kind_of(&self, id: TermId) -> KindId {
        self.sig.sorts().kind(self.sort_of(id))
    }

    pub fn is_ground(&self, id: TermId) -> bool {
        self.nodes.read()[id.0 as usize].ground
    }

    /// Arguments of `id` seen as an `op`-list: its arguments when headed by
    /// `op`, nothing for the identity, otherwise the term itself.
    pub fn list_of(&self, op: OpId, id: TermId) -> Args {
        match self.term(id) {
            Term::App(f, args) if f == op => args,
            _ => {
                if self.identity_of(op) == Some(id) {
                    SmallVec::new()
                } else {
                    smallvec::smallvec![id]
                }
            }
        }
    }

    /// Variables in first-occurrence order (pre-order, left to right).
    pub fn vars_of(&self, id: TermId) -> Vec<VarId> {
        let mut out = Vec::new();
        self.collect_vars(id, &mut out);
        out
    }

    pub fn collect_vars(&self, id: TermId, out: &mut Vec<VarId>) {
        let mut stack: SmallVec<[TermId; 16]> = smallvec::smallvec![id];
        while let Some(t) = stack.pop() {
            if self.is_ground(t) {
                continue;
            }
            match self.term(t) {
                Term::Var(v) => {
                    if !out.contains(&v) {
                        out.push(v);
                    }
                }
                Term::App(_, args) => stack.extend(args.iter().rev().copied()),
            }
        }
    }

    pub fn occurs(&self, v: VarId, id: TermId) -> bool {
        !self.is_ground(id) && self.vars_of(id).contains(&v)
    }

    /// Largest `n` among `#n` variables of the terms.
    pub fn max_fresh_index(&self, terms: &[TermId]) -> Option<u32> {
        let mut vars = Vec::new();
        for &t in terms {
            self.collect_vars(t, &mut vars);
        }
        vars.iter().filter_map(|&v| self.fresh_index(v)).max()
    }

    // ========== POSITIONS ==========

    pub fn subterm(&self, id: TermId, pos: &[u32]) -> Option<TermId> {
        let mut current = id;
        for &i in pos {
            current = *self.args(current).get(i as usize)?;
        }
        Some(current)
    }

    /// Replace the subterm at `pos`, re-canonicalizing every ancestor.
    pub fn replace_at(&self, id: TermId, pos: &[u32], replacement: TermId) -> TermId {
        match pos.split_first() {
            None => replacement,
            Some((&i, rest)) => match self.term(id) {
                Term::App(op, mut args) if (i as usize) < args.len() => {
                    args[i as usize] = self.replace_at(args[i as usize], rest, replacement);
                    self.app(op, args)
                }
                _ => id,
            },
        }
    }

    /// Every position of the term in pre-order, left to right, with depth.
    pub fn positions(&self, id: TermId) -> Vec<(Position, TermId)> {
        let mut out = Vec::new();
        let mut stack: Vec<(Position, TermId)> = vec![(SmallVec::new(), id)];
        while let Some((pos, t)) = stack.pop() {
            if let Term::App(_, args) = self.term(t) {
                for (i, &a) in args.iter().enumerate().rev() {
                    let mut child = pos.clone();
                    child.push(i as u32);
                    stack.push((child, a));
                }
            }
            out.push((pos, t));
        }
        out
    }

    // ========== ORDER ==========

    /// Structural total order used for comm argument sorting. Independent of
    /// creation order so canonical forms are reproducible across runs.
    pub fn compare(&self, a: TermId, b: TermId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        match (self.term(a), self.term(b)) {
            (Term::Var(x), Term::Var(y)) => self
                .var_name(x)
                .cmp(&self.var_name(y))
                .then_with(|| self.var_sort(x).cmp(&self.var_sort(y))),
            (Term::Var(_), Term::App(..)) => Ordering::Less,
            (Term::App(..), Term::Var(_)) => Ordering::Greater,
            (Term::App(f, xs), Term::App(g, ys)) => f
                .cmp(&g)
                .then_with(|| xs.len().cmp(&ys.len()))
                .then_with(|| {
                    for (x, y) in xs.iter().zip(ys.iter()) {
                        let o = self.compare(*x, *y);
                        if o != Ordering::Equal {
                            return o;
                        }
                    }
                    Ordering::Equal
                }),
        }
    }
}

/// Prefix rendering for diagnostics: `f(a, X:Nat)`.
pub fn format_term(term: TermId, terms: &TermStore) -> String {
    fn render(term: TermId, terms: &TermStore, out: &mut String) {
        match terms.term(term) {
            Term::Var(v) => {
                out.push_str(&terms.var_name(v));
                out.push(':');
                out.push_str(terms.signature().sort_name(terms.var_sort(v)));
            }
            Term::App(op, args) => {
                out.push_str(terms.signature().op_name(op));
                if !args.is_empty() {
                    out.push('(');
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        render(*a, terms, out);
                    }
                    out.push(')');
                }
            }
        }
    }

    let mut out = String::new();
    render(term, terms, &mut out);
    out
}

impl std::fmt::Debug for TermStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermStore").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
#[path = "tests/term.rs"]
mod tests;
