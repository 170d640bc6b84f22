//! Error types for role and permission operations

use thiserror::Error;

use crate::store::StoreError;

/// RBAC error types.
#[derive(Debug, Error)]
pub enum RbacError {
    /// The underlying store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A role or permission with this name already exists
    #[error("{kind} already exists: {name}")]
    Conflict {
        /// Record kind ("role" or "permission")
        kind: &'static str,
        /// The colliding name
        name: String,
    },

    /// A role or permission addressed by name does not exist
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Record kind ("role" or "permission")
        kind: &'static str,
        /// The missing name
        name: String,
    },
}

/// Result type for RBAC operations.
pub type RbacResult<T> = Result<T, RbacError>;

impl RbacError {
    pub(crate) fn conflict(kind: &'static str, name: impl Into<String>) -> Self {
        RbacError::Conflict {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        RbacError::NotFound {
            kind,
            name: name.into(),
        }
    }
}
