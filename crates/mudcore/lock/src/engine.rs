//! Lock evaluation engine
//!
//! The engine owns the predicate registry and the permission resolver. Both
//! are process-wide and read-mostly; hot reload replaces the registry
//! reference wholesale so an evaluation in flight keeps the snapshot it
//! started with.

use crate::error::{LockError, LockResult};
use crate::lockstring::{ClauseBody, LockExpr, LockString, PredicateCall};
use crate::permission::{PermissionHierarchy, PermissionResolver};
use crate::registry::{PredicateContext, PredicateFn, PredicateRegistry};
use crate::subject::{Entity, Lockable};
use dashmap::DashMap;
use mudcore_types::CoreConfig;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Access type used for ad hoc lock strings without a header
pub const ADHOC_ACCESS_TYPE: &str = "adhoc";

/// Distinct lock strings kept parsed before the cache is reset
pub const DEFAULT_CACHE_LIMIT: usize = 4096;

/// Options for a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOptions {
    /// Result when the lock has no clause for the access type
    pub default: bool,
    /// Evaluate the lock even for the superuser
    pub no_superuser_bypass: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            default: true,
            no_superuser_bypass: false,
        }
    }
}

impl CheckOptions {
    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    pub fn without_superuser_bypass(mut self) -> Self {
        self.no_superuser_bypass = true;
        self
    }
}

/// Outcome of a lock check, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockDecision {
    /// The clause passed, or no clause exists and the default permits
    Granted,
    /// The clause failed, or no clause exists and the default denies
    Denied,
    /// The clause could not be evaluated; treated as a denial
    Malformed(LockError),
    /// The accessor is the superuser and nothing was evaluated
    Bypassed,
}

impl LockDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Granted | Self::Bypassed)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Parses and evaluates lock strings
pub struct LockEngine {
    registry: RwLock<Arc<PredicateRegistry>>,
    permissions: PermissionResolver,
    cache: DashMap<String, Arc<LockString>>,
    cache_limit: usize,
}

impl LockEngine {
    pub fn new(registry: PredicateRegistry, permissions: PermissionResolver) -> Self {
        Self {
            registry: RwLock::new(Arc::new(registry)),
            permissions,
            cache: DashMap::new(),
            cache_limit: DEFAULT_CACHE_LIMIT,
        }
    }

    /// Cap the parse cache at `limit` distinct lock strings
    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = limit.max(1);
        self
    }

    /// Built-in predicates plus the configured hierarchy and superuser
    pub fn from_config(config: &CoreConfig) -> Self {
        let permissions = PermissionResolver::new(PermissionHierarchy::new(&config.hierarchy))
            .with_superuser(config.superuser_id);
        Self::new(PredicateRegistry::with_builtins(), permissions)
    }

    /// Snapshot of the current registry
    pub fn registry(&self) -> Arc<PredicateRegistry> {
        Arc::clone(&self.registry.read())
    }

    /// Atomically replace the registry, returning the previous one
    pub fn swap_registry(&self, registry: PredicateRegistry) -> Arc<PredicateRegistry> {
        let previous = std::mem::replace(&mut *self.registry.write(), Arc::new(registry));
        debug!(predicates = previous.len(), "Predicate registry swapped");
        previous
    }

    /// Register a predicate (last registration wins)
    ///
    /// Copies the current registry, adds the predicate and swaps the copy in.
    pub fn register_predicate<F>(&self, name: &str, predicate: F) -> Option<PredicateFn>
    where
        F: Fn(&PredicateContext<'_>) -> LockResult<bool> + Send + Sync + 'static,
    {
        let mut guard = self.registry.write();
        let mut next = PredicateRegistry::clone(&guard);
        let replaced = next.register(name, predicate);
        *guard = Arc::new(next);
        replaced
    }

    pub fn permissions(&self) -> &PermissionResolver {
        &self.permissions
    }

    /// Whether `accessor` skips lock evaluation
    pub fn is_bypassed(&self, accessor: &dyn Entity) -> bool {
        self.permissions.is_superuser(accessor)
    }

    /// Parse `raw`, reusing an earlier parse of the same text
    pub fn parse(&self, raw: &str) -> Arc<LockString> {
        if let Some(hit) = self.cache.get(raw) {
            return Arc::clone(hit.value());
        }
        let parsed = Arc::new(LockString::parse(raw));
        if self.cache.len() >= self.cache_limit {
            debug!(limit = self.cache_limit, "Lock parse cache full, resetting");
            self.cache.clear();
        }
        self.cache.insert(raw.to_string(), Arc::clone(&parsed));
        parsed
    }

    /// Number of lock strings held in the parse cache
    pub fn cached_locks(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Evaluate `lock` for `access_type`; missing access types permit
    pub fn evaluate(
        &self,
        lock: &str,
        access_type: &str,
        accessor: &dyn Entity,
        accessed: &dyn Entity,
    ) -> bool {
        self.evaluate_detailed(lock, access_type, accessor, accessed, CheckOptions::default())
            .is_allowed()
    }

    /// Evaluate with a caller-chosen result for missing access types
    pub fn evaluate_with_default(
        &self,
        lock: &str,
        access_type: &str,
        accessor: &dyn Entity,
        accessed: &dyn Entity,
        default: bool,
    ) -> bool {
        let options = CheckOptions::default().with_default(default);
        self.evaluate_detailed(lock, access_type, accessor, accessed, options)
            .is_allowed()
    }

    /// Evaluate and report why the check passed or failed
    pub fn evaluate_detailed(
        &self,
        lock: &str,
        access_type: &str,
        accessor: &dyn Entity,
        accessed: &dyn Entity,
        options: CheckOptions,
    ) -> LockDecision {
        if !options.no_superuser_bypass && self.is_bypassed(accessor) {
            trace!(access_type, accessor = accessor.key(), "Superuser bypass");
            return LockDecision::Bypassed;
        }

        let parsed = self.parse(lock);
        self.decide(&parsed, lock, access_type, accessor, accessed, options)
    }

    fn decide(
        &self,
        parsed: &LockString,
        lock: &str,
        access_type: &str,
        accessor: &dyn Entity,
        accessed: &dyn Entity,
        options: CheckOptions,
    ) -> LockDecision {
        let Some(clause) = parsed.clause(access_type) else {
            return if options.default {
                LockDecision::Granted
            } else {
                LockDecision::Denied
            };
        };

        let expr = match &clause.body {
            ClauseBody::Expr(expr) => expr,
            ClauseBody::Malformed(err) => {
                warn!(lock, access_type, error = %err, "Malformed lock clause denied");
                return LockDecision::Malformed(err.clone());
            }
        };

        let registry = self.registry();
        match self.run(&registry, expr, access_type, accessor, accessed) {
            Ok(true) => LockDecision::Granted,
            Ok(false) => LockDecision::Denied,
            Err(err) => {
                warn!(lock, access_type, error = %err, "Lock evaluation failed, denying");
                LockDecision::Malformed(err)
            }
        }
    }

    fn run(
        &self,
        registry: &PredicateRegistry,
        expr: &LockExpr,
        access_type: &str,
        accessor: &dyn Entity,
        accessed: &dyn Entity,
    ) -> LockResult<bool> {
        // resolve every name first so short-circuiting cannot hide a typo
        if let Some(unknown) = expr.calls().into_iter().find(|c| !registry.contains(&c.name)) {
            return Err(LockError::UnknownPredicate(unknown.name.clone()));
        }

        expr.evaluate(&mut |call: &PredicateCall| {
            let predicate = registry
                .get(&call.name)
                .ok_or_else(|| LockError::UnknownPredicate(call.name.clone()))?;
            let ctx = PredicateContext {
                accessor,
                accessed,
                access_type,
                args: &call.args,
                kwargs: &call.kwargs,
                permissions: &self.permissions,
            };
            let passed = predicate(&ctx)?;
            trace!(predicate = %call.name, passed, "Predicate evaluated");
            Ok(passed)
        })
    }

    /// Check the lock attached to `accessed`
    pub fn check<T>(&self, accessor: &dyn Entity, accessed: &T, access_type: &str) -> bool
    where
        T: Lockable,
    {
        self.evaluate(accessed.lock_string(), access_type, accessor, accessed)
    }

    /// Evaluate a one-off lock string against `accessor` alone
    ///
    /// A string without an `access_type:` header is treated as a single
    /// expression. With a header, the first clause is the one evaluated.
    /// One-off strings are parsed fresh and never enter the parse cache.
    pub fn check_lockstring(&self, accessor: &dyn Entity, raw: &str) -> bool {
        if self.is_bypassed(accessor) {
            trace!(accessor = accessor.key(), "Superuser bypass");
            return true;
        }
        let lock = if has_header(raw) {
            raw.to_string()
        } else {
            format!("{}: {}", ADHOC_ACCESS_TYPE, raw)
        };
        let parsed = LockString::parse(&lock);
        let Some(access_type) = parsed.clauses().first().map(|c| c.access_type.clone()) else {
            warn!(lock = raw, "Ad hoc lock has no usable clause, denying");
            return false;
        };
        let options = CheckOptions::default().with_default(false);
        self.decide(&parsed, &lock, &access_type, accessor, accessor, options)
            .is_allowed()
    }
}

impl std::fmt::Debug for LockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockEngine")
            .field("registry", &self.registry.read())
            .field("permissions", &self.permissions)
            .field("cached_locks", &self.cache.len())
            .finish()
    }
}

fn has_header(raw: &str) -> bool {
    // a ':' before the first '(' marks an access-type header
    match (raw.find(':'), raw.find('(')) {
        (Some(colon), Some(paren)) => colon < paren,
        (Some(_), None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::Permissible;
    use mudcore_types::{EntityId, Permissions};

    #[derive(Default)]
    struct Obj {
        id: u64,
        perms: Permissions,
        superuser: bool,
        lock: String,
    }

    impl Permissible for Obj {
        fn permissions(&self) -> &Permissions {
            &self.perms
        }
        fn is_superuser(&self) -> bool {
            self.superuser
        }
    }

    impl Entity for Obj {
        fn entity_id(&self) -> Option<EntityId> {
            Some(EntityId::new(self.id))
        }
        fn key(&self) -> &str {
            "obj"
        }
    }

    impl Lockable for Obj {
        fn lock_string(&self) -> &str {
            &self.lock
        }
    }

    fn engine() -> LockEngine {
        LockEngine::from_config(&CoreConfig::default())
    }

    fn player() -> Obj {
        Obj {
            id: 7,
            perms: ["Player"].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_access_type_permits() {
        let e = engine();
        let p = player();
        assert!(e.evaluate("get: false()", "drop", &p, &p));
        assert!(e.evaluate("", "anything", &p, &p));
        assert!(!e.evaluate_with_default("get: false()", "drop", &p, &p, false));
    }

    #[test]
    fn test_boolean_precedence() {
        let e = engine();
        let p = player();
        // and binds tighter than or
        assert!(e.evaluate("x: true() or false() and false()", "x", &p, &p));
        assert!(!e.evaluate("x: not true() or false()", "x", &p, &p));
        assert!(e.evaluate("x: NOT false() AND perm(Player)", "x", &p, &p));
        assert!(!e.evaluate("x: perm(Builder) and true()", "x", &p, &p));
    }

    #[test]
    fn test_malformed_and_unknown_deny() {
        let e = engine();
        let p = player();
        let decision = e.evaluate_detailed(
            "cmd: perm(Player",
            "cmd",
            &p,
            &p,
            CheckOptions::default(),
        );
        assert!(decision.is_malformed());

        // unknown name hidden behind a short-circuit still denies
        let decision = e.evaluate_detailed(
            "cmd: true() or no_such_thing()",
            "cmd",
            &p,
            &p,
            CheckOptions::default(),
        );
        assert_eq!(
            decision,
            LockDecision::Malformed(LockError::UnknownPredicate("no_such_thing".into()))
        );

        // other clauses of the same string are unaffected
        let mixed = "cmd: perm(Player)); get: true()";
        assert!(!e.evaluate(mixed, "cmd", &p, &p));
        assert!(e.evaluate(mixed, "get", &p, &p));
    }

    #[test]
    fn test_superuser_bypass() {
        let e = engine();
        let su = Obj {
            superuser: true,
            ..Default::default()
        };
        assert!(e.evaluate("cmd: false()", "cmd", &su, &su));
        assert!(e.evaluate("cmd: )(garbage", "cmd", &su, &su));
        let decision = e.evaluate_detailed(
            "cmd: false()",
            "cmd",
            &su,
            &su,
            CheckOptions::default().without_superuser_bypass(),
        );
        assert_eq!(decision, LockDecision::Denied);
    }

    #[test]
    fn test_register_predicate_overrides_builtin() {
        let e = engine();
        let p = player();
        assert!(e.evaluate("x: true()", "x", &p, &p));
        assert!(e.register_predicate("true", |_| Ok(false)).is_some());
        assert!(!e.evaluate("x: true()", "x", &p, &p));

        e.register_predicate("weekday", |ctx| Ok(ctx.arg(0) == Some("monday")));
        assert!(e.evaluate("x: weekday(monday)", "x", &p, &p));
    }

    #[test]
    fn test_swap_registry_keeps_cache() {
        let e = engine();
        let p = player();
        assert!(e.evaluate("x: true()", "x", &p, &p));
        assert_eq!(e.cached_locks(), 1);

        let previous = e.swap_registry(PredicateRegistry::new());
        assert!(previous.contains("true"));
        assert_eq!(e.cached_locks(), 1);
        // cached syntax, but the name no longer resolves
        assert!(!e.evaluate("x: true()", "x", &p, &p));
    }

    #[test]
    fn test_check_uses_attached_lock() {
        let e = engine();
        let p = player();
        let chest = Obj {
            id: 20,
            lock: "open: perm(Builder); get: false()".into(),
            ..Default::default()
        };
        assert!(!e.check(&p, &chest, "open"));
        assert!(!e.check(&p, &chest, "get"));
        assert!(e.check(&p, &chest, "look"));
    }

    #[test]
    fn test_check_lockstring() {
        let e = engine();
        let p = player();
        assert!(e.check_lockstring(&p, "perm(Player)"));
        assert!(!e.check_lockstring(&p, "perm(Admin)"));
        assert!(e.check_lockstring(&p, "view: id(#7)"));
        assert!(!e.check_lockstring(&p, "id(#8) or perm(Admin)"));
        assert!(!e.check_lockstring(&p, ""));
        assert_eq!(e.cached_locks(), 0);
    }

    #[test]
    fn test_parse_cache_is_bounded() {
        let e = engine().with_cache_limit(3);
        let p = player();
        for id in 0..10 {
            e.evaluate(&format!("x: id(#{id})"), "x", &p, &p);
            assert!(e.cached_locks() <= 3);
        }
        assert!(e.evaluate("x: id(#7)", "x", &p, &p));
        assert!(e.cached_locks() >= 1);
    }
}
