//! Predicate registry
//!
//! Lock expressions call predicates by name. The host application fills the
//! registry at startup; registering a name twice replaces the earlier entry,
//! which is how built-ins get overridden.

use crate::error::LockResult;
use crate::permission::PermissionResolver;
use crate::predicates;
use crate::subject::Entity;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Everything a predicate gets to look at
pub struct PredicateContext<'a> {
    /// The entity asking for access
    pub accessor: &'a dyn Entity,
    /// The entity being accessed
    pub accessed: &'a dyn Entity,
    /// Access type being checked (`cmd`, `get`, ...)
    pub access_type: &'a str,
    pub args: &'a [String],
    pub kwargs: &'a BTreeMap<String, String>,
    pub permissions: &'a PermissionResolver,
}

impl PredicateContext<'_> {
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn kwarg(&self, key: &str) -> Option<&str> {
        self.kwargs.get(key).map(String::as_str)
    }
}

/// A named lock predicate
pub type PredicateFn = Arc<dyn Fn(&PredicateContext<'_>) -> LockResult<bool> + Send + Sync>;

/// Name -> predicate table
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    predicates: HashMap<String, PredicateFn>,
}

impl PredicateRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in predicates
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        predicates::register_builtins(&mut registry);
        registry
    }

    /// Register `predicate` under `name`, returning whatever it replaced
    pub fn register<F>(&mut self, name: &str, predicate: F) -> Option<PredicateFn>
    where
        F: Fn(&PredicateContext<'_>) -> LockResult<bool> + Send + Sync + 'static,
    {
        self.predicates
            .insert(name.trim().to_lowercase(), Arc::new(predicate))
    }

    pub fn get(&self, name: &str) -> Option<&PredicateFn> {
        self.predicates.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateRegistry")
            .field("predicates", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_override() {
        let mut registry = PredicateRegistry::new();
        assert!(registry.register("Weekday", |_| Ok(true)).is_none());
        assert!(registry.contains("weekday"));
        assert!(registry.register("weekday", |_| Ok(false)).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_builtins_present() {
        let registry = PredicateRegistry::with_builtins();
        for name in [
            "all", "true", "none", "false", "perm", "perm_above", "pperm", "id", "pid", "attr_gt",
            "holds", "inside", "tag",
        ] {
            assert!(registry.contains(name), "missing builtin {}", name);
        }
    }
}
