//! Sorts, the subsort order and kinds.
//!
//! Kinds are the connected components of the subsort graph. Every kind gets one
//! extra *error sort* above all of its sorts; ill-sorted terms live there. The
//! reflexive-transitive closure of the subsort relation is computed once, at
//! construction, and stored as one bit row per sort so `leq` is a single bit test.

use crate::signature::SignatureError;
use crate::symbol::{NameId, NameStore};
use hashbrown::HashMap;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SortId(pub(crate) u32);

impl SortId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KindId(pub(crate) u32);

impl KindId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct SortInfo {
    name: NameId,
    kind: KindId,
    is_error: bool,
}

#[derive(Debug, Clone)]
struct KindInfo {
    /// User sorts of the kind, in declaration order.
    sorts: SmallVec<[SortId; 8]>,
    error: SortId,
}

/// The finished sort lattice of a signature.
#[derive(Debug, Clone)]
pub struct SortTable {
    sorts: Vec<SortInfo>,
    kinds: Vec<KindInfo>,
    /// `supers[s]` has bit `t` set iff `s <= t`.
    supers: Vec<Vec<u64>>,
    by_name: HashMap<NameId, SortId>,
}

fn bit(row: &[u64], i: usize) -> bool {
    row[i / 64] & (1u64 << (i % 64)) != 0
}

fn set_bit(row: &mut [u64], i: usize) {
    row[i / 64] |= 1u64 << (i % 64);
}

impl SortTable {
    /// Close the declared subsort pairs `(sub, super)` and split the sorts into kinds.
    pub(crate) fn build(
        names: &NameStore,
        declared: &[NameId],
        subsorts: &[(SortId, SortId)],
    ) -> Result<Self, SignatureError> {
        let n = declared.len();

        let mut direct: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); n];
        for &(sub, sup) in subsorts {
            if !direct[sub.index()].contains(&sup.index()) {
                direct[sub.index()].push(sup.index());
            }
        }

        // Closure: DFS over supersort edges from every sort.
        let words = (n + 1).div_ceil(64).max(1);
        let mut supers = vec![vec![0u64; words]; n];
        for start in 0..n {
            let mut stack: SmallVec<[usize; 16]> = SmallVec::new();
            stack.push(start);
            set_bit(&mut supers[start], start);
            while let Some(s) = stack.pop() {
                for &t in direct[s].iter() {
                    if t == start {
                        return Err(SignatureError::SubsortCycle(
                            names.name(declared[start]).to_string(),
                        ));
                    }
                    if !bit(&supers[start], t) {
                        set_bit(&mut supers[start], t);
                        stack.push(t);
                    }
                }
            }
        }

        // Connected components with a small union-find.
        let mut parent: Vec<usize> = (0..n).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        for &(sub, sup) in subsorts {
            let a = find(&mut parent, sub.index());
            let b = find(&mut parent, sup.index());
            if a != b {
                parent[a.max(b)] = a.min(b);
            }
        }

        let mut root_to_kind: HashMap<usize, KindId> = HashMap::new();
        let mut sorts = Vec::with_capacity(n);
        let mut kinds: Vec<KindInfo> = Vec::new();
        for (i, &name) in declared.iter().enumerate() {
            let root = find(&mut parent, i);
            let kind = *root_to_kind.entry(root).or_insert_with(|| {
                kinds.push(KindInfo {
                    sorts: SmallVec::new(),
                    error: SortId(0),
                });
                KindId((kinds.len() - 1) as u32)
            });
            kinds[kind.index()].sorts.push(SortId(i as u32));
            sorts.push(SortInfo {
                name,
                kind,
                is_error: false,
            });
        }

        // One error sort per kind, appended after the user sorts.
        let total = n + kinds.len();
        let words = total.div_ceil(64).max(1);
        for row in supers.iter_mut() {
            row.resize(words, 0);
        }
        let mut by_name = HashMap::new();
        for (i, info) in sorts.iter().enumerate() {
            by_name.insert(info.name, SortId(i as u32));
        }
        for k in 0..kinds.len() {
            let error = SortId(sorts.len() as u32);
            let kind_sorts = kinds[k].sorts.clone();
            let maximal: Vec<&str> = kind_sorts
                .iter()
                .filter(|s| {
                    !kind_sorts
                        .iter()
                        .any(|t| t != *s && bit(&supers[s.index()], t.index()))
                })
                .map(|s| names.name(sorts[s.index()].name))
                .collect();
            let error_name = names.intern(&format!("[{}]", maximal.join(",")));
            sorts.push(SortInfo {
                name: error_name,
                kind: KindId(k as u32),
                is_error: true,
            });
            let mut row = vec![0u64; words];
            set_bit(&mut row, error.index());
            supers.push(row);
            for s in kind_sorts.iter() {
                set_bit(&mut supers[s.index()], error.index());
                // `[S]` names the kind of S as well.
                let alias = names.intern(&format!("[{}]", names.name(sorts[s.index()].name)));
                by_name.insert(alias, error);
            }
            by_name.insert(error_name, error);
            kinds[k].error = error;
        }

        Ok(Self {
            sorts,
            kinds,
            supers,
            by_name,
        })
    }

    pub fn len(&self) -> usize {
        self.sorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorts.is_empty()
    }

    pub fn kind_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn find(&self, name: NameId) -> Option<SortId> {
        self.by_name.get(&name).copied()
    }

    pub fn name(&self, sort: SortId) -> NameId {
        self.sorts[sort.index()].name
    }

    pub fn kind(&self, sort: SortId) -> KindId {
        self.sorts[sort.index()].kind
    }

    pub fn error_sort(&self, kind: KindId) -> SortId {
        self.kinds[kind.index()].error
    }

    pub fn is_error(&self, sort: SortId) -> bool {
        self.sorts[sort.index()].is_error
    }

    /// User sorts of a kind, in declaration order.
    pub fn sorts_of(&self, kind: KindId) -> &[SortId] {
        &self.kinds[kind.index()].sorts
    }

    /// Subsort test (reflexive).
    pub fn leq(&self, a: SortId, b: SortId) -> bool {
        bit(&self.supers[a.index()], b.index())
    }

    pub fn lt(&self, a: SortId, b: SortId) -> bool {
        a != b && self.leq(a, b)
    }

    /// Least common supersort. Falls back to the kind's error sort when the
    /// sorts are connected but have no unique least upper bound.
    pub fn lub(&self, a: SortId, b: SortId) -> Option<SortId> {
        if self.kind(a) != self.kind(b) {
            return None;
        }
        if self.leq(a, b) {
            return Some(b);
        }
        if self.leq(b, a) {
            return Some(a);
        }
        let kind = self.kind(a);
        let common: SmallVec<[SortId; 8]> = self
            .sorts_of(kind)
            .iter()
            .copied()
            .filter(|&s| self.leq(a, s) && self.leq(b, s))
            .collect();
        let least = common
            .iter()
            .copied()
            .find(|&c| common.iter().all(|&d| self.leq(c, d)));
        Some(least.unwrap_or_else(|| self.error_sort(kind)))
    }

    /// Greatest common subsort. When several maximal common subsorts exist the
    /// first one in declaration order is returned.
    pub fn glb(&self, a: SortId, b: SortId) -> Option<SortId> {
        if self.kind(a) != self.kind(b) {
            return None;
        }
        if self.leq(a, b) {
            return Some(a);
        }
        if self.leq(b, a) {
            return Some(b);
        }
        let common: SmallVec<[SortId; 8]> = self
            .sorts_of(self.kind(a))
            .iter()
            .copied()
            .filter(|&s| self.leq(s, a) && self.leq(s, b))
            .collect();
        common
            .iter()
            .copied()
            .find(|&c| !common.iter().any(|&d| self.lt(c, d)))
    }
}
