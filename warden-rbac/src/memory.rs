//! In-memory role and permission stores
//!
//! Suitable for single-process deployments and testing. Name uniqueness is
//! enforced the way a unique index would, reporting `DuplicateKey("name")`.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::permissions::{Permission, PermissionId};
use crate::roles::{Role, RoleId};
use crate::store::{PermissionStore, RoleStore, StoreError, StoreResult};

/// In-memory [`RoleStore`].
#[derive(Debug, Default)]
pub struct MemoryRoleStore {
    roles: RwLock<HashMap<RoleId, Role>>,
}

impl MemoryRoleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored roles.
    pub async fn len(&self) -> usize {
        self.roles.read().await.len()
    }

    /// Check if empty.
    pub async fn is_empty(&self) -> bool {
        self.roles.read().await.is_empty()
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let roles = self.roles.read().await;
        Ok(roles.values().find(|role| role.name == name).cloned())
    }

    async fn find_by_ids(&self, ids: &[RoleId]) -> StoreResult<Vec<Role>> {
        let roles = self.roles.read().await;
        Ok(ids.iter().filter_map(|id| roles.get(id).cloned()).collect())
    }

    async fn create(&self, role: Role) -> StoreResult<Role> {
        let mut roles = self.roles.write().await;
        if roles.values().any(|existing| existing.name == role.name) {
            return Err(StoreError::DuplicateKey("name".to_string()));
        }
        if roles.contains_key(&role.id) {
            return Err(StoreError::DuplicateKey("id".to_string()));
        }
        roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update(&self, role: Role) -> StoreResult<Role> {
        let mut roles = self.roles.write().await;
        if roles
            .values()
            .any(|existing| existing.name == role.name && existing.id != role.id)
        {
            return Err(StoreError::DuplicateKey("name".to_string()));
        }
        match roles.get_mut(&role.id) {
            Some(slot) => {
                *slot = role.clone();
                Ok(role)
            }
            None => Err(StoreError::NotFound(format!("role {}", role.id))),
        }
    }
}

/// In-memory [`PermissionStore`].
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    permissions: RwLock<HashMap<PermissionId, Permission>>,
}

impl MemoryPermissionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Permission>> {
        let permissions = self.permissions.read().await;
        Ok(permissions.values().find(|p| p.name == name).cloned())
    }

    async fn find_by_ids(&self, ids: &[PermissionId]) -> StoreResult<Vec<Permission>> {
        let permissions = self.permissions.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| permissions.get(id).cloned())
            .collect())
    }

    async fn create(&self, permission: Permission) -> StoreResult<Permission> {
        let mut permissions = self.permissions.write().await;
        if permissions.values().any(|p| p.name == permission.name) {
            return Err(StoreError::DuplicateKey("name".to_string()));
        }
        permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_role_name_uniqueness() {
        let store = MemoryRoleStore::new();
        store.create(Role::new("admin", "Admins")).await.unwrap();

        let err = store.create(Role::new("admin", "Other")).await.unwrap_err();
        assert_eq!(err, StoreError::DuplicateKey("name".to_string()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_by_ids_preserves_request_order() {
        let store = MemoryRoleStore::new();
        let a = store.create(Role::new("a", "")).await.unwrap();
        let b = store.create(Role::new("b", "")).await.unwrap();

        let found = store
            .find_by_ids(&[b.id, Uuid::now_v7(), a.id])
            .await
            .unwrap();
        let names: Vec<_> = found.into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_update_missing_role() {
        let store = MemoryRoleStore::new();
        let err = store.update(Role::new("ghost", "")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_permission_name_uniqueness() {
        let store = MemoryPermissionStore::new();
        store.create(Permission::new("users:read")).await.unwrap();

        let err = store
            .create(Permission::new("users:read"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());
    }
}
