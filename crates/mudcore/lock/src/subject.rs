//! Capability interfaces for anything a lock can be checked against
//!
//! Accounts, characters, rooms, exits, things, channels and commands all
//! implement these; nothing in the lock engine knows which concrete type it
//! is looking at.

use mudcore_types::{EntityId, Permissions};
use serde_json::Value;

static NO_PERMISSIONS: Permissions = Permissions::new();

/// Something that holds permissions
pub trait Permissible {
    /// Permissions held by this entity itself
    fn permissions(&self) -> &Permissions {
        &NO_PERMISSIONS
    }

    /// Permissions of the account controlling this entity
    ///
    /// Accounts report their own permissions here, puppeted objects report
    /// the puppeteer's, and everything else returns `None`.
    fn account_permissions(&self) -> Option<&Permissions> {
        None
    }

    fn is_superuser(&self) -> bool {
        false
    }

    /// Whether the controlling account opted into its reduced privileges
    fn is_quelled(&self) -> bool {
        false
    }
}

/// Read-only view of an entity as lock predicates see it
pub trait Entity: Permissible + Send + Sync {
    /// Database id; `None` for things that are not world entities (commands)
    fn entity_id(&self) -> Option<EntityId>;

    fn key(&self) -> &str;

    /// Id of the controlling account (an account's own id for accounts)
    fn account_id(&self) -> Option<EntityId> {
        None
    }

    fn attribute(&self, _name: &str) -> Option<&Value> {
        None
    }

    fn has_tag(&self, _tag: &str, _category: Option<&str>) -> bool {
        false
    }

    fn location(&self) -> Option<EntityId> {
        None
    }

    /// Whether this entity carries something matching `query` (a key or `#id`)
    fn holds(&self, _query: &str) -> bool {
        false
    }
}

/// An entity carrying a lock string
pub trait Lockable: Entity {
    fn lock_string(&self) -> &str;
}
