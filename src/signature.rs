//! Operators, their equational attributes and declarations.
//!
//! An operator is identified by name, arity and domain kinds. Declaring the
//! same name again with sorts of the same kinds adds a declaration to the
//! existing operator (subsort overloading); other kinds give a new operator.

use crate::sort::{KindId, SortId, SortTable};
use crate::symbol::{NameId, NameStore};
use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub(crate) u32);

impl OpId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Name and data of a hook-backed (special) operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Special {
    pub name: String,
    pub data: Vec<String>,
}

/// Equational attributes of an operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpAttrs {
    pub assoc: bool,
    pub comm: bool,
    pub idem: bool,
    pub identity: Option<OpId>,
    pub ctor: bool,
    pub special: Option<Special>,
}

impl OpAttrs {
    pub fn free() -> Self {
        Self::default()
    }

    pub fn ctor() -> Self {
        Self {
            ctor: true,
            ..Self::default()
        }
    }

    pub fn comm() -> Self {
        Self {
            comm: true,
            ..Self::default()
        }
    }

    pub fn assoc() -> Self {
        Self {
            assoc: true,
            ..Self::default()
        }
    }

    pub fn ac() -> Self {
        Self {
            assoc: true,
            comm: true,
            ..Self::default()
        }
    }

    pub fn acu(identity: OpId) -> Self {
        Self {
            assoc: true,
            comm: true,
            identity: Some(identity),
            ..Self::default()
        }
    }

    pub fn with_identity(mut self, identity: OpId) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn idempotent(mut self) -> Self {
        self.idem = true;
        self
    }

    pub fn special(mut self, name: &str, data: &[&str]) -> Self {
        self.special = Some(Special {
            name: name.to_string(),
            data: data.iter().map(|d| d.to_string()).collect(),
        });
        self
    }
}

/// The equational theory an operator's attributes put it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theory {
    Free,
    Comm,
    Assoc,
    AssocId,
    AC,
    ACU,
    ACI,
    ACUI,
}

impl Theory {
    pub fn is_assoc(self) -> bool {
        !matches!(self, Theory::Free | Theory::Comm)
    }

    pub fn is_ac(self) -> bool {
        matches!(self, Theory::AC | Theory::ACU | Theory::ACI | Theory::ACUI)
    }

    pub fn has_identity(self) -> bool {
        matches!(self, Theory::AssocId | Theory::ACU | Theory::ACUI)
    }

    pub fn is_idem(self) -> bool {
        matches!(self, Theory::ACI | Theory::ACUI)
    }
}

/// One declaration `op : domain -> range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpDecl {
    pub domain: SmallVec<[SortId; 4]>,
    pub range: SortId,
}

#[derive(Debug, Clone)]
struct OpInfo {
    name: NameId,
    domain_kinds: SmallVec<[KindId; 4]>,
    range_kind: KindId,
    attrs: OpAttrs,
    theory: Theory,
    decls: Vec<OpDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    SubsortCycle(String),
    UnknownSort(String),
    SubsortAfterOps(String),
    BadAttributes { op: String, reason: &'static str },
    AttributeMismatch(String),
    KindMismatch(String),
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::SubsortCycle(s) => write!(f, "subsort cycle through sort {}", s),
            SignatureError::UnknownSort(s) => write!(f, "unknown sort {}", s),
            SignatureError::SubsortAfterOps(s) => {
                write!(f, "subsort declaration for {} after the first operator", s)
            }
            SignatureError::BadAttributes { op, reason } => {
                write!(f, "unsupported attributes for operator {}: {}", op, reason)
            }
            SignatureError::AttributeMismatch(op) => {
                write!(f, "overloaded declarations of {} disagree on attributes", op)
            }
            SignatureError::KindMismatch(op) => {
                write!(f, "operator {} mixes kinds inconsistently", op)
            }
        }
    }
}

impl std::error::Error for SignatureError {}

/// Incremental construction of a [`Signature`].
///
/// Sorts and subsorts come first; the first operator declaration closes the
/// sort lattice.
pub struct SignatureBuilder {
    names: NameStore,
    sort_names: Vec<NameId>,
    sort_index: HashMap<NameId, SortId>,
    subsorts: Vec<(SortId, SortId)>,
    table: Option<SortTable>,
    ops: Vec<OpInfo>,
    by_name: HashMap<(NameId, usize), SmallVec<[OpId; 2]>>,
}

impl SignatureBuilder {
    pub fn new() -> Self {
        Self {
            names: NameStore::new(),
            sort_names: Vec::new(),
            sort_index: HashMap::new(),
            subsorts: Vec::new(),
            table: None,
            ops: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Declare a sort (idempotent).
    pub fn sort(&mut self, name: &str) -> SortId {
        let id = self.names.intern(name);
        if let Some(&s) = self.sort_index.get(&id) {
            return s;
        }
        let s = SortId(self.sort_names.len() as u32);
        self.sort_names.push(id);
        self.sort_index.insert(id, s);
        s
    }

    pub fn subsort(&mut self, sub: SortId, sup: SortId) -> Result<(), SignatureError> {
        if self.table.is_some() {
            return Err(SignatureError::SubsortAfterOps(
                self.names.name(self.sort_names[sub.index()]).to_string(),
            ));
        }
        self.subsorts.push((sub, sup));
        Ok(())
    }

    fn close_sorts(&mut self) -> Result<(), SignatureError> {
        if self.table.is_none() {
            self.table = Some(SortTable::build(
                &self.names,
                &self.sort_names,
                &self.subsorts,
            )?);
        }
        Ok(())
    }

    /// Error sort of the kind containing `sort` (closes the sort lattice).
    pub fn kind_sort(&mut self, sort: SortId) -> Result<SortId, SignatureError> {
        self.close_sorts()?;
        let table = self.table.as_ref().ok_or(SignatureError::UnknownSort(String::new()))?;
        Ok(table.error_sort(table.kind(sort)))
    }

    /// Declare `name : domain -> range` with the given attributes.
    pub fn op(
        &mut self,
        name: &str,
        domain: &[SortId],
        range: SortId,
        attrs: OpAttrs,
    ) -> Result<OpId, SignatureError> {
        self.close_sorts()?;
        let table = match self.table.as_ref() {
            Some(t) => t,
            None => return Err(SignatureError::UnknownSort(name.to_string())),
        };
        let name_id = self.names.intern(name);
        let domain_kinds: SmallVec<[KindId; 4]> = domain.iter().map(|&s| table.kind(s)).collect();
        let range_kind = table.kind(range);
        let theory = Self::classify(name, domain.len(), &attrs)?;

        if attrs.assoc
            && (domain_kinds[0] != range_kind || domain_kinds[1] != range_kind)
        {
            return Err(SignatureError::KindMismatch(name.to_string()));
        }
        if let Some(id) = attrs.identity {
            let id_info = &self.ops[id.index()];
            if !id_info.domain_kinds.is_empty() || id_info.range_kind != range_kind {
                return Err(SignatureError::BadAttributes {
                    op: name.to_string(),
                    reason: "identity must be a constant of the operator's kind",
                });
            }
        }

        let decl = OpDecl {
            domain: domain.iter().copied().collect(),
            range,
        };

        let key = (name_id, domain.len());
        if let Some(existing) = self.by_name.get(&key) {
            for &op in existing.iter() {
                let info = &mut self.ops[op.index()];
                if info.domain_kinds == domain_kinds {
                    if info.range_kind != range_kind {
                        return Err(SignatureError::KindMismatch(name.to_string()));
                    }
                    if info.attrs != attrs {
                        return Err(SignatureError::AttributeMismatch(name.to_string()));
                    }
                    if !info.decls.contains(&decl) {
                        info.decls.push(decl);
                    }
                    return Ok(op);
                }
            }
        }

        let op = OpId(self.ops.len() as u32);
        self.ops.push(OpInfo {
            name: name_id,
            domain_kinds,
            range_kind,
            attrs,
            theory,
            decls: vec![decl],
        });
        self.by_name.entry(key).or_default().push(op);
        Ok(op)
    }

    fn classify(name: &str, arity: usize, attrs: &OpAttrs) -> Result<Theory, SignatureError> {
        let bad = |reason| {
            Err(SignatureError::BadAttributes {
                op: name.to_string(),
                reason,
            })
        };
        if (attrs.assoc || attrs.comm) && arity != 2 {
            return bad("assoc and comm need a binary operator");
        }
        if attrs.identity.is_some() && !attrs.assoc {
            return bad("identity is only supported together with assoc");
        }
        if attrs.idem && !(attrs.assoc && attrs.comm) {
            return bad("idem is only supported together with assoc and comm");
        }
        let theory = match (attrs.assoc, attrs.comm, attrs.identity.is_some(), attrs.idem) {
            (false, false, _, _) => Theory::Free,
            (false, true, _, _) => Theory::Comm,
            (true, false, false, _) => Theory::Assoc,
            (true, false, true, _) => Theory::AssocId,
            (true, true, false, false) => Theory::AC,
            (true, true, true, false) => Theory::ACU,
            (true, true, false, true) => Theory::ACI,
            (true, true, true, true) => Theory::ACUI,
        };
        Ok(theory)
    }

    pub fn build(mut self) -> Result<Signature, SignatureError> {
        self.close_sorts()?;
        let sorts = match self.table.take() {
            Some(t) => t,
            None => return Err(SignatureError::UnknownSort(String::new())),
        };
        Ok(Signature {
            names: self.names,
            sorts,
            ops: self.ops,
            by_name: self.by_name,
            sort_memo: RwLock::new(HashMap::new()),
        })
    }
}

impl Default for SignatureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorts, kinds and operators of a module. Immutable once built apart from
/// the sort memo table.
pub struct Signature {
    names: NameStore,
    sorts: SortTable,
    ops: Vec<OpInfo>,
    by_name: HashMap<(NameId, usize), SmallVec<[OpId; 2]>>,
    sort_memo: RwLock<HashMap<(OpId, SmallVec<[SortId; 4]>), SortId>>,
}

impl Signature {
    pub fn names(&self) -> &NameStore {
        &self.names
    }

    pub fn sorts(&self) -> &SortTable {
        &self.sorts
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> impl Iterator<Item = OpId> {
        (0..self.ops.len() as u32).map(OpId)
    }

    pub fn op_name(&self, op: OpId) -> &str {
        self.names.name(self.ops[op.index()].name)
    }

    pub fn arity(&self, op: OpId) -> usize {
        self.ops[op.index()].domain_kinds.len()
    }

    pub fn attrs(&self, op: OpId) -> &OpAttrs {
        &self.ops[op.index()].attrs
    }

    pub fn theory(&self, op: OpId) -> Theory {
        self.ops[op.index()].theory
    }

    pub fn identity(&self, op: OpId) -> Option<OpId> {
        self.ops[op.index()].attrs.identity
    }

    pub fn range_kind(&self, op: OpId) -> KindId {
        self.ops[op.index()].range_kind
    }

    pub fn domain_kinds(&self, op: OpId) -> &[KindId] {
        &self.ops[op.index()].domain_kinds
    }

    pub fn decls(&self, op: OpId) -> &[OpDecl] {
        &self.ops[op.index()].decls
    }

    pub fn special(&self, op: OpId) -> Option<&Special> {
        self.ops[op.index()].attrs.special.as_ref()
    }

    pub fn find_sort(&self, name: &str) -> Option<SortId> {
        self.names.get(name).and_then(|id| self.sorts.find(id))
    }

    pub fn sort_name(&self, sort: SortId) -> &str {
        self.names.name(self.sorts.name(sort))
    }

    /// All operators with this name and arity.
    pub fn find_ops(&self, name: &str, arity: usize) -> &[OpId] {
        self.names
            .get(name)
            .and_then(|id| self.by_name.get(&(id, arity)))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Operators with this name usable at any arity >= 2 (assoc operators are
    /// written with any number of arguments).
    pub fn find_variadic(&self, name: &str) -> Option<OpId> {
        self.find_ops(name, 2)
            .iter()
            .copied()
            .find(|&op| self.theory(op).is_assoc())
    }

    pub fn find_op(&self, name: &str, arity: usize) -> Option<OpId> {
        self.find_ops(name, arity).first().copied()
    }

    /// Least sort of `op` applied to arguments of the given sorts.
    pub fn least_sort(&self, op: OpId, args: &[SortId]) -> SortId {
        let info = &self.ops[op.index()];
        if info.theory.is_assoc() && args.len() > 2 {
            let mut acc = args[0];
            for &next in &args[1..] {
                acc = self.least_sort(op, &[acc, next]);
            }
            return acc;
        }
        let key: (OpId, SmallVec<[SortId; 4]>) = (op, args.iter().copied().collect());
        if let Some(&s) = self.sort_memo.read().get(&key) {
            return s;
        }
        let sort = self.compute_least_sort(info, args);
        self.sort_memo.write().insert(key, sort);
        sort
    }

    fn compute_least_sort(&self, info: &OpInfo, args: &[SortId]) -> SortId {
        let applicable: SmallVec<[SortId; 4]> = info
            .decls
            .iter()
            .filter(|d| {
                d.domain.len() == args.len()
                    && d.domain
                        .iter()
                        .zip(args.iter())
                        .all(|(&dom, &arg)| self.sorts.leq(arg, dom))
            })
            .map(|d| d.range)
            .collect();
        applicable
            .iter()
            .copied()
            .find(|&r| applicable.iter().all(|&o| self.sorts.leq(r, o)))
            .or_else(|| {
                applicable
                    .iter()
                    .copied()
                    .find(|&r| !applicable.iter().any(|&o| self.sorts.lt(o, r)))
            })
            .unwrap_or_else(|| self.sorts.error_sort(info.range_kind))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("sorts", &self.sorts.len())
            .field("ops", &self.ops.len())
            .finish()
    }
}

/// Shared handle used by the term store and modules.
pub type SignatureRef = Arc<Signature>;
