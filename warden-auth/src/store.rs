//! Principal store contract
//!
//! Persistence is a collaborator. Implementations must enforce uniqueness of
//! email, username, phone and each provider subject id, reporting a violation
//! as [`warden_rbac::StoreError::DuplicateKey`] carrying the field name.

use async_trait::async_trait;
use uuid::Uuid;
use warden_rbac::StoreResult;

use crate::principal::{Principal, PrincipalPatch};
use crate::providers::OAuthProvider;

/// Principal persistence.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Find by id.
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Principal>>;

    /// Find by email. Callers pass the normalized (lowercase) address.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Principal>>;

    /// Find by username.
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Principal>>;

    /// Find by phone.
    async fn find_by_phone(&self, phone: &str) -> StoreResult<Option<Principal>>;

    /// Find by a linked provider subject id.
    async fn find_by_provider_id(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> StoreResult<Option<Principal>>;

    /// Insert a principal.
    async fn create(&self, principal: Principal) -> StoreResult<Principal>;

    /// Apply a patch atomically. Returns `None` if no principal has this id.
    async fn update_by_id(&self, id: Uuid, patch: PrincipalPatch) -> StoreResult<Option<Principal>>;

    /// Delete a principal. Returns whether one was removed.
    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool>;
}
