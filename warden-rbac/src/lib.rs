//! # Warden RBAC (Role-Based Access Control)
//!
//! Role and permission resolution for the Warden authentication core.
//!
//! ## Overview
//!
//! The warden-rbac crate handles:
//! - **Permissions**: Named capabilities such as `users:manage`
//! - **Roles**: Named bundles of permission references
//! - **Resolution**: Flattening a principal's roles into one deduplicated
//!   permission set
//! - **Catalog**: Administrative creation of roles and permissions
//!
//! ## Architecture
//!
//! ```text
//! Principal ──role ids──▶ RoleStore ──permission ids──▶ PermissionStore
//!                                    │
//!                                    ▼
//!                          ResolvedAccess { roles, PermissionSet }
//! ```
//!
//! Permissions are never granted to principals directly; a principal holds
//! role references only. A permission granted by two roles appears once in the
//! resolved set.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_rbac::{MemoryPermissionStore, MemoryRoleStore, RbacResolver, RoleCatalog};
//!
//! # async fn example() -> Result<(), warden_rbac::RbacError> {
//! let roles = Arc::new(MemoryRoleStore::new());
//! let permissions = Arc::new(MemoryPermissionStore::new());
//!
//! let catalog = RoleCatalog::new(roles.clone(), permissions.clone());
//! catalog.create_permission("users:manage", Some("users"), None).await?;
//! let admin = catalog.create_role("admin", "Administrators", &["users:manage"]).await?;
//!
//! let resolver = RbacResolver::new(roles, permissions);
//! let access = resolver.resolve_permissions(&vec![admin.id]).await?;
//! assert!(access.permissions.has("users:manage"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Store contracts
//!
//! Persistence is a collaborator. The core talks to it through [`RoleStore`]
//! and [`PermissionStore`], whose failures are reported as [`StoreError`]. A
//! uniqueness violation is the typed [`StoreError::DuplicateKey`] variant so
//! callers match on the kind instead of inspecting backend error codes.

pub mod catalog;
pub mod error;
pub mod memory;
pub mod permissions;
pub mod resolver;
pub mod roles;
pub mod store;

// Re-export main types for convenience
pub use catalog::RoleCatalog;
pub use error::{RbacError, RbacResult};
pub use memory::{MemoryPermissionStore, MemoryRoleStore};
pub use permissions::{Permission, PermissionId, PermissionSet};
pub use resolver::{RbacResolver, ResolvedAccess};
pub use roles::{Role, RoleHolder, RoleId, ADMIN_ROLE, DEFAULT_ROLE};
pub use store::{PermissionStore, RoleStore, StoreError, StoreResult};
