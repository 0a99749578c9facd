//! Permission hierarchy and resolution
//!
//! The hierarchy is an ordered list of permission names, lowest first. Holding
//! a level implies every level below it. Strings that are not in the hierarchy
//! are plain flags checked by exact (case-insensitive) match.
//!
//! When an object is puppeted by an account, hierarchical checks use the
//! account's permissions, not the object's: giving a character `Developer`
//! does not make the player behind it a developer. A quelled account uses the
//! lower of the two levels instead.

use crate::subject::Entity;
use mudcore_types::{EntityId, Permissions};
use tracing::trace;

/// Ordered permission levels, lowest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionHierarchy {
    levels: Vec<String>,
}

impl PermissionHierarchy {
    pub fn new<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            levels: levels
                .into_iter()
                .map(|l| l.as_ref().trim().to_lowercase())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    /// Position of `permission` in the hierarchy
    ///
    /// Legacy plural spellings (`Builders`) resolve to the singular entry.
    pub fn level_of(&self, permission: &str) -> Option<usize> {
        let wanted = permission.trim().to_lowercase();
        self.position(&wanted).or_else(|| {
            wanted
                .strip_suffix('s')
                .and_then(|singular| self.position(singular))
        })
    }

    fn position(&self, normalized: &str) -> Option<usize> {
        self.levels.iter().position(|l| l == normalized)
    }

    /// Highest level present in `permissions`
    pub fn highest_level(&self, permissions: &Permissions) -> Option<usize> {
        permissions.iter().filter_map(|p| self.level_of(p)).max()
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Resolves permission questions for a subject
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    hierarchy: PermissionHierarchy,
    superuser_id: Option<EntityId>,
}

impl PermissionResolver {
    pub fn new(hierarchy: PermissionHierarchy) -> Self {
        Self {
            hierarchy,
            superuser_id: None,
        }
    }

    /// Designate the superuser identity (matched against entity or account id)
    pub fn with_superuser(mut self, superuser_id: Option<EntityId>) -> Self {
        self.superuser_id = superuser_id;
        self
    }

    pub fn hierarchy(&self) -> &PermissionHierarchy {
        &self.hierarchy
    }

    pub fn superuser_id(&self) -> Option<EntityId> {
        self.superuser_id
    }

    /// Whether `subject` is the superuser and has not quelled
    pub fn is_superuser(&self, subject: &dyn Entity) -> bool {
        if subject.is_quelled() {
            return false;
        }
        subject.is_superuser()
            || self.superuser_id.is_some_and(|su| {
                subject.entity_id() == Some(su) || subject.account_id() == Some(su)
            })
    }

    /// Hierarchy level used for `subject`'s hierarchical checks
    pub fn effective_level(&self, subject: &dyn Entity) -> Option<usize> {
        let own = self.hierarchy.highest_level(subject.permissions());
        match subject.account_permissions() {
            Some(account_perms) => {
                let account = self.hierarchy.highest_level(account_perms);
                if subject.is_quelled() {
                    // no level on either side means no level at all
                    match (own, account) {
                        (Some(o), Some(a)) => Some(o.min(a)),
                        _ => None,
                    }
                } else {
                    account
                }
            }
            None => own,
        }
    }

    /// `perm()` semantics: hierarchical for hierarchy names, exact otherwise
    pub fn has_permission(&self, subject: &dyn Entity, permission: &str) -> bool {
        self.has_permission_at_or_above(subject, permission)
    }

    pub fn has_permission_at_or_above(&self, subject: &dyn Entity, permission: &str) -> bool {
        if self.is_superuser(subject) {
            return true;
        }
        match self.hierarchy.level_of(permission) {
            Some(required) => {
                let level = self.effective_level(subject);
                trace!(permission, required, ?level, "Hierarchical permission check");
                level.is_some_and(|l| l >= required)
            }
            None => self.has_exact_permission(subject, permission),
        }
    }

    /// Strictly above `permission` in the hierarchy
    ///
    /// Names outside the hierarchy have nothing above them and never pass.
    pub fn has_permission_above(&self, subject: &dyn Entity, permission: &str) -> bool {
        if self.is_superuser(subject) {
            return true;
        }
        match self.hierarchy.level_of(permission) {
            Some(required) => self.effective_level(subject).is_some_and(|l| l > required),
            None => false,
        }
    }

    /// Exact string match, account first, then the object itself
    pub fn has_exact_permission(&self, subject: &dyn Entity, permission: &str) -> bool {
        if self.is_superuser(subject) {
            return true;
        }
        subject
            .account_permissions()
            .is_some_and(|perms| perms.contains(permission))
            || subject.permissions().contains(permission)
    }

    /// Like [`has_permission`](Self::has_permission) but only ever consults
    /// the controlling account
    pub fn account_has_permission(&self, subject: &dyn Entity, permission: &str) -> bool {
        if self.is_superuser(subject) {
            return true;
        }
        let Some(account_perms) = subject.account_permissions() else {
            return false;
        };
        match self.hierarchy.level_of(permission) {
            Some(required) => self
                .hierarchy
                .highest_level(account_perms)
                .is_some_and(|l| l >= required),
            None => account_perms.contains(permission),
        }
    }

    pub fn account_has_permission_above(&self, subject: &dyn Entity, permission: &str) -> bool {
        if self.is_superuser(subject) {
            return true;
        }
        let (Some(account_perms), Some(required)) =
            (subject.account_permissions(), self.hierarchy.level_of(permission))
        else {
            return false;
        };
        self.hierarchy
            .highest_level(account_perms)
            .is_some_and(|l| l > required)
    }
}
