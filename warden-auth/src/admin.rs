//! Account administration
//!
//! Ban state and role assignment. These are the only paths that change a
//! principal's roles after registration.

use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use warden_rbac::{RoleId, RoleStore};

use crate::error::{AuthError, AuthResult};
use crate::principal::{Principal, PrincipalPatch};
use crate::store::PrincipalStore;

/// Administrative principal operations.
#[derive(Clone)]
pub struct AccountAdmin {
    store: Arc<dyn PrincipalStore>,
    roles: Arc<dyn RoleStore>,
}

impl AccountAdmin {
    /// Create the service.
    pub fn new(store: Arc<dyn PrincipalStore>, roles: Arc<dyn RoleStore>) -> Self {
        Self { store, roles }
    }

    /// Ban a principal and revoke its refresh token.
    ///
    /// Outstanding access tokens stop authenticating because the guard
    /// reloads the principal on every request.
    #[instrument(skip(self))]
    pub async fn ban(&self, principal_id: Uuid) -> AuthResult<Principal> {
        let principal = self
            .patch(
                principal_id,
                PrincipalPatch::new().banned(true).refresh_token(None),
            )
            .await?;
        info!(%principal_id, "Principal banned");
        Ok(principal)
    }

    /// Lift a ban.
    #[instrument(skip(self))]
    pub async fn unban(&self, principal_id: Uuid) -> AuthResult<Principal> {
        let principal = self
            .patch(principal_id, PrincipalPatch::new().banned(false))
            .await?;
        info!(%principal_id, "Principal unbanned");
        Ok(principal)
    }

    /// Add a role by name. Assigning a held role is a no-op.
    #[instrument(skip(self))]
    pub async fn assign_role(&self, principal_id: Uuid, role_name: &str) -> AuthResult<Principal> {
        let role_id = self.role_id(role_name).await?;
        let principal = self.find(principal_id).await?;
        if principal.roles.contains(&role_id) {
            return Ok(principal);
        }

        let mut roles = principal.roles;
        roles.push(role_id);
        let updated = self
            .patch(principal_id, PrincipalPatch::new().roles(roles))
            .await?;
        info!(%principal_id, role = %role_name, "Role assigned");
        Ok(updated)
    }

    /// Remove a role by name. Revoking an absent role is a no-op.
    #[instrument(skip(self))]
    pub async fn revoke_role(&self, principal_id: Uuid, role_name: &str) -> AuthResult<Principal> {
        let role_id = self.role_id(role_name).await?;
        let principal = self.find(principal_id).await?;
        if !principal.roles.contains(&role_id) {
            return Ok(principal);
        }

        let roles = principal.roles.into_iter().filter(|r| *r != role_id).collect();
        let updated = self
            .patch(principal_id, PrincipalPatch::new().roles(roles))
            .await?;
        info!(%principal_id, role = %role_name, "Role revoked");
        Ok(updated)
    }

    /// Load a principal.
    pub async fn find(&self, principal_id: Uuid) -> AuthResult<Principal> {
        self.store
            .find_by_id(principal_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("Principal {principal_id}")))
    }

    async fn role_id(&self, role_name: &str) -> AuthResult<RoleId> {
        self.roles
            .find_by_name(role_name)
            .await?
            .map(|role| role.id)
            .ok_or_else(|| AuthError::NotFound(format!("Role {role_name}")))
    }

    async fn patch(&self, principal_id: Uuid, patch: PrincipalPatch) -> AuthResult<Principal> {
        self.store
            .update_by_id(principal_id, patch)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("Principal {principal_id}")))
    }
}
