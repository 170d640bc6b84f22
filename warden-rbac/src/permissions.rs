//! # Permissions
//!
//! Permission records and the deduplicating permission set carried in
//! access tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Identifier of a stored permission.
pub type PermissionId = Uuid;

/// A named capability, e.g. `users:manage`.
///
/// The name is the unit of authorization: guards compare names, never ids.
/// By convention names read `resource:action`, and the resource prefix doubles
/// as the category when none is set explicitly.
///
/// # Example
///
/// ```
/// use warden_rbac::Permission;
///
/// let perm = Permission::new("users:manage");
/// assert_eq!(perm.category(), Some("users"));
///
/// let perm = Permission::new("audit").with_category("compliance");
/// assert_eq!(perm.category(), Some("compliance"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    /// Unique identifier.
    pub id: PermissionId,
    /// Unique capability name.
    pub name: String,
    /// Optional grouping used by admin tooling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Human readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Permission {
    /// Create a new permission with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            category: None,
            description: None,
            created_at: Utc::now(),
        }
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Explicit category, or the `resource` part of a `resource:action` name.
    pub fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .or_else(|| self.name.split_once(':').map(|(resource, _)| resource))
    }
}

/// A set of permission names.
///
/// Adding a name twice is a no-op, so merging the grants of several roles is a
/// set union rather than a list concatenation. Iteration order is sorted,
/// which keeps token payloads stable across issuances.
///
/// # Example
///
/// ```
/// use warden_rbac::PermissionSet;
///
/// let mut set = PermissionSet::new();
/// set.add("users:read");
/// set.add("users:read");
/// set.add("users:manage");
///
/// assert_eq!(set.len(), 2);
/// assert!(set.has("users:read"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PermissionSet {
    permissions: BTreeSet<String>,
}

impl PermissionSet {
    /// Create a new empty permission set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a permission name.
    ///
    /// # Returns
    ///
    /// `true` if the name was not already present
    pub fn add(&mut self, name: impl Into<String>) -> bool {
        self.permissions.insert(name.into())
    }

    /// Add multiple permission names.
    pub fn add_all<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.add(name);
        }
    }

    /// Remove a permission name.
    ///
    /// # Returns
    ///
    /// `true` if the name was present
    pub fn remove(&mut self, name: &str) -> bool {
        self.permissions.remove(name)
    }

    /// Check if the set contains a permission name.
    pub fn has(&self, name: &str) -> bool {
        self.permissions.contains(name)
    }

    /// Merge another permission set into this one.
    pub fn merge(&mut self, other: &PermissionSet) {
        self.permissions.extend(other.permissions.iter().cloned());
    }

    /// Check if this set contains every name of another set.
    pub fn contains_all(&self, other: &PermissionSet) -> bool {
        other.permissions.is_subset(&self.permissions)
    }

    /// Check if this set shares at least one name with another set.
    pub fn contains_any(&self, other: &PermissionSet) -> bool {
        !self.permissions.is_disjoint(&other.permissions)
    }

    /// Iterate over the names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.permissions.iter().map(String::as_str)
    }

    /// Get the count of permissions.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Consume the set into a sorted list of names.
    pub fn into_vec(self) -> Vec<String> {
        self.permissions.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut set = PermissionSet::new();
        set.add_all(iter);
        set
    }
}

impl<S: Into<String>> Extend<S> for PermissionSet {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        self.add_all(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_category_from_name() {
        let perm = Permission::new("reports:export");
        assert_eq!(perm.category(), Some("reports"));

        let bare = Permission::new("superuser");
        assert_eq!(bare.category(), None);
    }

    #[test]
    fn test_permission_set_deduplicates() {
        let mut set = PermissionSet::new();
        assert!(set.add("users:read"));
        assert!(!set.add("users:read"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_permission_set_merge() {
        let mut set1: PermissionSet = ["users:read", "users:manage"].into_iter().collect();
        let set2: PermissionSet = ["users:read", "roles:manage"].into_iter().collect();

        set1.merge(&set2);
        assert_eq!(set1.len(), 3);
        assert_eq!(
            set1.into_vec(),
            vec!["roles:manage", "users:manage", "users:read"]
        );
    }

    #[test]
    fn test_permission_set_remove() {
        let mut set: PermissionSet = ["users:read"].into_iter().collect();
        assert!(set.remove("users:read"));
        assert!(!set.remove("users:read"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_permission_set_contains_all_and_any() {
        let big: PermissionSet = ["a:read", "a:write", "b:read"].into_iter().collect();
        let small: PermissionSet = ["a:read", "a:write"].into_iter().collect();
        let other: PermissionSet = ["c:read"].into_iter().collect();

        assert!(big.contains_all(&small));
        assert!(!small.contains_all(&big));
        assert!(big.contains_any(&small));
        assert!(!big.contains_any(&other));
    }

    #[test]
    fn test_permission_set_iterates_sorted() {
        let set: PermissionSet = ["b:read", "a:read"].into_iter().collect();
        let names: Vec<&str> = set.iter().collect();
        assert_eq!(names, vec!["a:read", "b:read"]);
    }
}
