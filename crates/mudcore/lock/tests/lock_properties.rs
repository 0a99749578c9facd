//! Property tests: superuser bypass and permission hierarchy monotonicity.

use mudcore_lock::*;
use mudcore_types::{EntityId, Permissions};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

const LEVELS: [&str; 6] = ["Guest", "Player", "Helper", "Builder", "Admin", "Developer"];

#[derive(Default)]
struct Subject {
    id: u64,
    perms: Permissions,
    account: Option<Permissions>,
    superuser: bool,
}

impl Permissible for Subject {
    fn permissions(&self) -> &Permissions {
        &self.perms
    }
    fn account_permissions(&self) -> Option<&Permissions> {
        self.account.as_ref()
    }
    fn is_superuser(&self) -> bool {
        self.superuser
    }
}

impl Entity for Subject {
    fn entity_id(&self) -> Option<EntityId> {
        Some(EntityId::new(self.id))
    }
    fn key(&self) -> &str {
        "subject"
    }
}

fn engine() -> LockEngine {
    let permissions = PermissionResolver::new(PermissionHierarchy::new(LEVELS));
    LockEngine::new(PredicateRegistry::with_builtins(), permissions)
}

/// Lock strings built from real syntax fragments, often broken
fn arb_lock_string() -> impl Strategy<Value = String> {
    let fragment = prop_oneof![
        Just("cmd:".to_string()),
        Just("get, drop:".to_string()),
        Just("false()".to_string()),
        Just("none()".to_string()),
        Just("perm(Developer)".to_string()),
        Just("not".to_string()),
        Just("and".to_string()),
        Just("or".to_string()),
        Just("missing_predicate(1)".to_string()),
        Just("(".to_string()),
        Just(")".to_string()),
        Just(";".to_string()),
        Just("'".to_string()),
        "[a-z_]{1,8}\\([a-z0-9#, ]{0,8}\\)",
    ];
    prop::collection::vec(fragment, 0..10).prop_map(|parts| parts.join(" "))
}

/// Arbitrary text, not necessarily anything like a lock
fn arb_noise() -> impl Strategy<Value = String> {
    "\\PC{0,40}"
}

fn arb_access_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("cmd".to_string()),
        Just("get".to_string()),
        Just("call".to_string()),
        "[a-z]{1,10}",
    ]
}

/// Two distinct hierarchy positions, higher first
fn arb_level_pair() -> impl Strategy<Value = (usize, usize)> {
    (1..LEVELS.len()).prop_flat_map(|high| (Just(high), 0..high))
}

fn arb_flags() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z_]{3,10}", 0..4)
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// The superuser passes every lock, however broken.
    #[test]
    fn superuser_passes_generated_locks(
        lock in arb_lock_string(),
        access_type in arb_access_type(),
    ) {
        let engine = engine();
        let su = Subject { superuser: true, ..Default::default() };
        let target = Subject { id: 99, ..Default::default() };
        prop_assert!(engine.evaluate(&lock, &access_type, &su, &target));
        prop_assert_eq!(
            engine.evaluate_detailed(&lock, &access_type, &su, &target, CheckOptions::default()),
            LockDecision::Bypassed
        );
    }

    /// The superuser passes arbitrary noise too, including with a deny default.
    #[test]
    fn superuser_passes_noise(lock in arb_noise(), access_type in arb_access_type()) {
        let engine = engine();
        let su = Subject { superuser: true, ..Default::default() };
        prop_assert!(engine.evaluate_with_default(&lock, &access_type, &su, &su, false));
    }

    /// The configured superuser id bypasses exactly like the flag.
    #[test]
    fn superuser_id_passes(lock in arb_lock_string(), access_type in arb_access_type()) {
        let permissions = PermissionResolver::new(PermissionHierarchy::new(LEVELS))
            .with_superuser(Some(EntityId::new(1)));
        let engine = LockEngine::new(PredicateRegistry::with_builtins(), permissions);
        let su = Subject { id: 1, ..Default::default() };
        prop_assert!(engine.evaluate(&lock, &access_type, &su, &su));
    }

    /// Holding a level passes checks for every level below it.
    #[test]
    fn higher_level_implies_lower(
        (high, low) in arb_level_pair(),
        flags in arb_flags(),
    ) {
        let resolver = PermissionResolver::new(PermissionHierarchy::new(LEVELS));
        let mut perms: Permissions = flags.iter().collect();
        perms.grant(LEVELS[high]);
        let subject = Subject { perms, ..Default::default() };

        prop_assert!(resolver.has_permission_at_or_above(&subject, LEVELS[low]));
        prop_assert!(resolver.has_permission_above(&subject, LEVELS[low]));
        prop_assert!(resolver.has_permission_at_or_above(&subject, LEVELS[high]));
    }

    /// Same for a puppet whose account holds the level.
    #[test]
    fn account_level_implies_lower(
        (high, low) in arb_level_pair(),
        object_level in 0..LEVELS.len(),
    ) {
        let resolver = PermissionResolver::new(PermissionHierarchy::new(LEVELS));
        let subject = Subject {
            perms: [LEVELS[object_level]].into_iter().collect(),
            account: Some([LEVELS[high]].into_iter().collect()),
            ..Default::default()
        };
        prop_assert!(resolver.has_permission_at_or_above(&subject, LEVELS[low]));
        prop_assert!(resolver.account_has_permission(&subject, LEVELS[low]));
    }

    /// A lower level never passes a check for a higher one.
    #[test]
    fn lower_level_never_implies_higher((high, low) in arb_level_pair()) {
        let engine = engine();
        let subject = Subject {
            perms: [LEVELS[low]].into_iter().collect(),
            ..Default::default()
        };
        let lock = format!("cmd: perm({})", LEVELS[high]);
        prop_assert!(!engine.evaluate(&lock, "cmd", &subject, &subject));
    }
}
