use lasso::{Spur, ThreadedRodeo};

/// An interned name: operator, sort, variable, rule label or strategy name.
pub type NameId = Spur;

/// Thread-safe interner shared by a signature and everything built on it.
///
/// Guarantees:
/// - Same string always produces same NameId
/// - Different strings always produce different NameIds
/// - NameId can be resolved back to the original string
pub struct NameStore {
    rodeo: ThreadedRodeo,
}

impl NameStore {
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Intern a name, returning the existing id when already present.
    pub fn intern(&self, name: &str) -> NameId {
        self.rodeo.get_or_intern(name)
    }

    /// Resolve an id back to its string. None if the id came from another store.
    pub fn resolve(&self, id: NameId) -> Option<&str> {
        self.rodeo.try_resolve(&id)
    }

    /// Resolve, falling back to a placeholder for foreign ids.
    pub fn name(&self, id: NameId) -> &str {
        self.resolve(id).unwrap_or("<?>")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rodeo.contains(name)
    }

    /// Look a name up without interning it.
    pub fn get(&self, name: &str) -> Option<NameId> {
        self.rodeo.get(name)
    }
}

impl Default for NameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NameStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameStore")
            .field("len", &self.rodeo.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let names = NameStore::new();
        let a = names.intern("buy-a");
        let b = names.intern("buy-a");
        assert_eq!(a, b);
        assert_eq!(names.resolve(a), Some("buy-a"));
    }

    #[test]
    fn distinct_names_get_distinct_ids() {
        let names = NameStore::new();
        assert_ne!(names.intern("Nat"), names.intern("NzNat"));
        assert!(names.contains("Nat"));
        assert!(names.get("Int").is_none());
    }
}
