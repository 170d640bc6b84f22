//! Store contracts for roles and permissions
//!
//! Persistence lives outside the core. These traits are the whole surface the
//! core needs, and [`StoreError`] is the error kind every store contract in
//! the workspace reports (the principal store in `warden-auth` included).

use async_trait::async_trait;
use thiserror::Error;

use crate::permissions::{Permission, PermissionId};
use crate::roles::{Role, RoleId};

/// Store failure kinds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A unique field already holds this value. Carries the field name.
    #[error("Duplicate key on field: {0}")]
    DuplicateKey(String),

    /// The addressed record does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The backend could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("Store error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Check if this is a uniqueness violation.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey(_))
    }

    /// The field that collided, for uniqueness violations.
    pub fn duplicate_field(&self) -> Option<&str> {
        match self {
            StoreError::DuplicateKey(field) => Some(field),
            _ => None,
        }
    }
}

/// Role persistence.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Find a role by its unique name.
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Role>>;

    /// Fetch the roles with the given ids. Unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[RoleId]) -> StoreResult<Vec<Role>>;

    /// Insert a role. Fails with `DuplicateKey("name")` on a taken name.
    async fn create(&self, role: Role) -> StoreResult<Role>;

    /// Replace a stored role. Fails with `NotFound` if it does not exist.
    async fn update(&self, role: Role) -> StoreResult<Role>;
}

/// Permission persistence.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Find a permission by its unique name.
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Permission>>;

    /// Fetch the permissions with the given ids. Unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[PermissionId]) -> StoreResult<Vec<Permission>>;

    /// Insert a permission. Fails with `DuplicateKey("name")` on a taken name.
    async fn create(&self, permission: Permission) -> StoreResult<Permission>;
}
