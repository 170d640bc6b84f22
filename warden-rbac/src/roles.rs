//! Role records
//!
//! A role is a named bundle of permission references. Principals hold role
//! ids; roles are provisioned out of band and never deleted by the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permissions::PermissionId;

/// Identifier of a stored role.
pub type RoleId = Uuid;

/// Name of the role every new principal receives.
pub const DEFAULT_ROLE: &str = "user";

/// Name of the administrative role.
pub const ADMIN_ROLE: &str = "admin";

/// A named set of permission references.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use warden_rbac::Role;
///
/// let read = Uuid::now_v7();
/// let role = Role::new("viewer", "Read-only access").with_permissions(vec![read, read]);
/// assert!(role.grants(&read));
/// assert_eq!(role.permissions.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    /// Unique identifier.
    pub id: RoleId,
    /// Unique role name.
    pub name: String,
    /// Human readable description.
    pub description: String,
    /// Granted permission references.
    #[serde(default)]
    pub permissions: Vec<PermissionId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Role {
    /// Create a new role with no permissions.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            description: description.into(),
            permissions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Replace the permission references, dropping duplicates.
    pub fn with_permissions(mut self, permissions: Vec<PermissionId>) -> Self {
        self.permissions.clear();
        for id in permissions {
            self.grant(id);
        }
        self
    }

    /// Add a permission reference.
    ///
    /// # Returns
    ///
    /// `true` if the permission was not already granted
    pub fn grant(&mut self, permission: PermissionId) -> bool {
        if self.grants(&permission) {
            return false;
        }
        self.permissions.push(permission);
        true
    }

    /// Check whether this role references a permission.
    pub fn grants(&self, permission: &PermissionId) -> bool {
        self.permissions.contains(permission)
    }
}

/// Anything that carries a set of role references.
///
/// Implemented by the principal model so the resolver does not depend on it.
pub trait RoleHolder {
    /// Role ids held, in no particular order.
    fn role_ids(&self) -> &[RoleId];
}

impl RoleHolder for [RoleId] {
    fn role_ids(&self) -> &[RoleId] {
        self
    }
}

impl RoleHolder for Vec<RoleId> {
    fn role_ids(&self) -> &[RoleId] {
        self
    }
}
