//! Permission resolution
//!
//! Turns a principal's role references into the role list and deduplicated
//! permission names embedded in an access token.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::RbacResult;
use crate::permissions::{PermissionId, PermissionSet};
use crate::roles::{RoleHolder, RoleId};
use crate::store::{PermissionStore, RoleStore};

/// Roles and permissions resolved for one principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAccess {
    /// Ids of the roles that still exist in the store.
    pub role_ids: Vec<RoleId>,
    /// Names of those roles, in the same order.
    pub role_names: Vec<String>,
    /// Union of the permissions granted by those roles.
    pub permissions: PermissionSet,
}

impl ResolvedAccess {
    /// Role ids rendered as strings, the form carried in token claims.
    pub fn role_id_strings(&self) -> Vec<String> {
        self.role_ids.iter().map(ToString::to_string).collect()
    }

    /// Permission names, sorted.
    pub fn permission_names(&self) -> Vec<String> {
        self.permissions.clone().into_vec()
    }
}

/// Loads roles and flattens their permissions.
#[derive(Clone)]
pub struct RbacResolver {
    roles: Arc<dyn RoleStore>,
    permissions: Arc<dyn PermissionStore>,
}

impl std::fmt::Debug for RbacResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RbacResolver").finish_non_exhaustive()
    }
}

impl RbacResolver {
    /// Create a resolver over the given stores.
    pub fn new(roles: Arc<dyn RoleStore>, permissions: Arc<dyn PermissionStore>) -> Self {
        Self { roles, permissions }
    }

    /// Resolve a principal's roles and permissions.
    ///
    /// A principal with no roles resolves to empty lists. Role ids that no
    /// longer exist are skipped. Permission references are deduplicated
    /// before they are fetched, so a permission granted by several roles is
    /// reported once.
    ///
    /// # Errors
    ///
    /// Store failures are returned as [`crate::RbacError::Store`] and are not
    /// retried.
    #[instrument(skip_all, fields(role_count = holder.role_ids().len()))]
    pub async fn resolve_permissions<H>(&self, holder: &H) -> RbacResult<ResolvedAccess>
    where
        H: RoleHolder + ?Sized,
    {
        let role_ids = holder.role_ids();
        if role_ids.is_empty() {
            return Ok(ResolvedAccess::default());
        }

        let roles = self.roles.find_by_ids(role_ids).await?;
        if roles.len() < role_ids.len() {
            debug!(
                requested = role_ids.len(),
                found = roles.len(),
                "Principal references missing roles"
            );
        }

        let mut seen: HashSet<PermissionId> = HashSet::new();
        let permission_ids: Vec<PermissionId> = roles
            .iter()
            .flat_map(|role| role.permissions.iter().copied())
            .filter(|id| seen.insert(*id))
            .collect();

        let permissions: PermissionSet = if permission_ids.is_empty() {
            PermissionSet::new()
        } else {
            self.permissions
                .find_by_ids(&permission_ids)
                .await?
                .into_iter()
                .map(|permission| permission.name)
                .collect()
        };

        Ok(ResolvedAccess {
            role_ids: roles.iter().map(|role| role.id).collect(),
            role_names: roles.into_iter().map(|role| role.name).collect(),
            permissions,
        })
    }
}
