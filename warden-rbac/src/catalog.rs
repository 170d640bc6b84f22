//! Role and permission catalog
//!
//! Administrative operations over roles and permissions. Bootstrap seeding is
//! done by the host application through these same calls.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::{RbacError, RbacResult};
use crate::permissions::Permission;
use crate::roles::Role;
use crate::store::{PermissionStore, RoleStore, StoreError};

/// Creates roles and permissions and manages grants.
#[derive(Clone)]
pub struct RoleCatalog {
    roles: Arc<dyn RoleStore>,
    permissions: Arc<dyn PermissionStore>,
}

impl RoleCatalog {
    /// Create a catalog over the given stores.
    pub fn new(roles: Arc<dyn RoleStore>, permissions: Arc<dyn PermissionStore>) -> Self {
        Self { roles, permissions }
    }

    /// Create a permission.
    ///
    /// # Errors
    ///
    /// `Conflict` if the name is taken.
    #[instrument(skip(self, description))]
    pub async fn create_permission(
        &self,
        name: &str,
        category: Option<&str>,
        description: Option<&str>,
    ) -> RbacResult<Permission> {
        let mut permission = Permission::new(name);
        permission.category = category.map(str::to_string);
        permission.description = description.map(str::to_string);

        let created = self
            .permissions
            .create(permission)
            .await
            .map_err(|e| map_duplicate(e, "permission", name))?;
        info!(permission = %created.name, "Permission created");
        Ok(created)
    }

    /// Create a role granting the named permissions.
    ///
    /// # Errors
    ///
    /// `NotFound` if a permission name is unknown, `Conflict` if the role
    /// name is taken.
    #[instrument(skip(self, description))]
    pub async fn create_role(
        &self,
        name: &str,
        description: &str,
        permission_names: &[&str],
    ) -> RbacResult<Role> {
        let mut role = Role::new(name, description);
        for permission_name in permission_names {
            let permission = self.require_permission(permission_name).await?;
            role.grant(permission.id);
        }

        let created = self
            .roles
            .create(role)
            .await
            .map_err(|e| map_duplicate(e, "role", name))?;
        info!(role = %created.name, "Role created");
        Ok(created)
    }

    /// Grant a permission to an existing role. Granting twice is a no-op.
    #[instrument(skip(self))]
    pub async fn grant_permission(&self, role_name: &str, permission_name: &str) -> RbacResult<Role> {
        let mut role = self.find_role(role_name).await?;
        let permission = self.require_permission(permission_name).await?;

        if !role.grant(permission.id) {
            return Ok(role);
        }
        Ok(self.roles.update(role).await?)
    }

    /// Look up a role by name.
    ///
    /// # Errors
    ///
    /// `NotFound` if no role has this name.
    pub async fn find_role(&self, name: &str) -> RbacResult<Role> {
        self.roles
            .find_by_name(name)
            .await?
            .ok_or_else(|| RbacError::not_found("role", name))
    }

    async fn require_permission(&self, name: &str) -> RbacResult<Permission> {
        self.permissions
            .find_by_name(name)
            .await?
            .ok_or_else(|| RbacError::not_found("permission", name))
    }
}

fn map_duplicate(err: StoreError, kind: &'static str, name: &str) -> RbacError {
    match err {
        StoreError::DuplicateKey(_) => RbacError::conflict(kind, name),
        other => RbacError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryPermissionStore, MemoryRoleStore};

    fn catalog() -> RoleCatalog {
        RoleCatalog::new(
            Arc::new(MemoryRoleStore::new()),
            Arc::new(MemoryPermissionStore::new()),
        )
    }

    #[tokio::test]
    async fn test_duplicate_permission_is_conflict() {
        let catalog = catalog();
        catalog.create_permission("users:read", None, None).await.unwrap();

        let result = catalog.create_permission("users:read", None, None).await;
        assert!(matches!(
            result,
            Err(RbacError::Conflict { kind: "permission", .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_role_is_conflict() {
        let catalog = catalog();
        catalog.create_role("user", "Default", &[]).await.unwrap();

        let result = catalog.create_role("user", "Again", &[]).await;
        assert!(matches!(result, Err(RbacError::Conflict { kind: "role", .. })));
    }

    #[tokio::test]
    async fn test_role_with_unknown_permission() {
        let catalog = catalog();
        let result = catalog.create_role("user", "Default", &["nope:nope"]).await;
        assert!(matches!(
            result,
            Err(RbacError::NotFound { kind: "permission", .. })
        ));
    }

    #[tokio::test]
    async fn test_grant_permission() {
        let catalog = catalog();
        let perm = catalog
            .create_permission("profile:edit", Some("profile"), Some("Edit own profile"))
            .await
            .unwrap();
        catalog.create_role("user", "Default", &[]).await.unwrap();

        let role = catalog.grant_permission("user", "profile:edit").await.unwrap();
        assert!(role.grants(&perm.id));

        let again = catalog.grant_permission("user", "profile:edit").await.unwrap();
        assert_eq!(again.permissions.len(), 1);

        let stored = catalog.find_role("user").await.unwrap();
        assert_eq!(stored.permissions, vec![perm.id]);
    }

    #[tokio::test]
    async fn test_find_unknown_role() {
        let catalog = catalog();
        let result = catalog.find_role("ghost").await;
        assert!(matches!(result, Err(RbacError::NotFound { kind: "role", .. })));
    }
}
