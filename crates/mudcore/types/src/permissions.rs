//! Permission sets
//!
//! Permission strings are free-form and compared case-insensitively. Whether
//! a given string also names a level in the configured hierarchy is the
//! permission resolver's business, not this type's.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Case-insensitive set of permission strings held by one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Permissions(BTreeSet<String>);

impl Permissions {
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Grant a permission. Returns false if it was already held.
    pub fn grant(&mut self, permission: impl AsRef<str>) -> bool {
        let normalized = normalize(permission.as_ref());
        if normalized.is_empty() {
            return false;
        }
        self.0.insert(normalized)
    }

    /// Revoke a permission. Returns false if it was not held.
    pub fn revoke(&mut self, permission: impl AsRef<str>) -> bool {
        self.0.remove(&normalize(permission.as_ref()))
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(&normalize(permission))
    }

    /// Iterate the (lowercased) permission strings in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut perms = Self::new();
        for p in iter {
            perms.grant(p);
        }
        perms
    }
}

impl From<Vec<String>> for Permissions {
    fn from(permissions: Vec<String>) -> Self {
        permissions.into_iter().collect()
    }
}

impl From<Permissions> for Vec<String> {
    fn from(permissions: Permissions) -> Self {
        permissions.0.into_iter().collect()
    }
}

fn normalize(permission: &str) -> String {
    permission.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_is_case_insensitive() {
        let mut perms = Permissions::new();
        assert!(perms.grant("Builder"));
        assert!(!perms.grant("BUILDER"));
        assert!(perms.contains("builder"));
        assert_eq!(perms.len(), 1);
    }

    #[test]
    fn revoke_removes() {
        let mut perms: Permissions = ["Admin", "can_fly"].into_iter().collect();
        assert!(perms.revoke("ADMIN"));
        assert!(!perms.contains("admin"));
        assert!(perms.contains("Can_Fly"));
        assert!(!perms.revoke("admin"));
    }

    #[test]
    fn deserialized_permissions_are_normalized() {
        let perms: Permissions = serde_json::from_str(r#"["Builder", " Admin ", ""]"#).unwrap();
        assert!(perms.contains("builder"));
        assert!(perms.contains("ADMIN"));
        assert_eq!(perms.len(), 2);
        assert_eq!(
            serde_json::to_string(&perms).unwrap(),
            r#"["admin","builder"]"#
        );
    }

    #[test]
    fn blank_permission_is_ignored() {
        let mut perms = Permissions::new();
        assert!(!perms.grant("   "));
        assert!(perms.is_empty());
    }
}
