//! In-memory principal store and recording mailer
//!
//! Suitable for single-process deployments and testing. The store enforces
//! the same uniqueness rules a database would with unique indexes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;
use warden_rbac::{StoreError, StoreResult};

use crate::mail::{MailError, Mailer};
use crate::principal::{Principal, PrincipalPatch};
use crate::providers::OAuthProvider;
use crate::store::PrincipalStore;

/// In-memory [`PrincipalStore`].
#[derive(Debug, Default)]
pub struct MemoryPrincipalStore {
    principals: RwLock<HashMap<Uuid, Principal>>,
}

impl MemoryPrincipalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored principals.
    pub async fn len(&self) -> usize {
        self.principals.read().await.len()
    }

    /// Check if empty.
    pub async fn is_empty(&self) -> bool {
        self.principals.read().await.is_empty()
    }
}

/// First unique field of `candidate` already held by another principal.
fn conflicting_field(existing: &HashMap<Uuid, Principal>, candidate: &Principal) -> Option<String> {
    for other in existing.values().filter(|p| p.id != candidate.id) {
        if other.email == candidate.email {
            return Some("email".to_string());
        }
        if candidate.username.is_some() && other.username == candidate.username {
            return Some("username".to_string());
        }
        if candidate.phone.is_some() && other.phone == candidate.phone {
            return Some("phone".to_string());
        }
        for (provider, id) in &candidate.provider_ids {
            if other.provider_ids.get(provider) == Some(id) {
                return Some(format!("provider_ids.{}", provider));
            }
        }
    }
    None
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Principal>> {
        Ok(self.principals.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Principal>> {
        let principals = self.principals.read().await;
        Ok(principals.values().find(|p| p.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Principal>> {
        let principals = self.principals.read().await;
        Ok(principals
            .values()
            .find(|p| p.username.as_deref() == Some(username))
            .cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> StoreResult<Option<Principal>> {
        let principals = self.principals.read().await;
        Ok(principals
            .values()
            .find(|p| p.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn find_by_provider_id(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> StoreResult<Option<Principal>> {
        let principals = self.principals.read().await;
        Ok(principals
            .values()
            .find(|p| p.provider_id(provider) == Some(provider_id))
            .cloned())
    }

    async fn create(&self, principal: Principal) -> StoreResult<Principal> {
        let mut principals = self.principals.write().await;
        if principals.contains_key(&principal.id) {
            return Err(StoreError::DuplicateKey("id".to_string()));
        }
        if let Some(field) = conflicting_field(&principals, &principal) {
            return Err(StoreError::DuplicateKey(field));
        }
        principals.insert(principal.id, principal.clone());
        Ok(principal)
    }

    async fn update_by_id(&self, id: Uuid, patch: PrincipalPatch) -> StoreResult<Option<Principal>> {
        let mut principals = self.principals.write().await;
        let Some(current) = principals.get(&id) else {
            return Ok(None);
        };

        let mut updated = current.clone();
        patch.apply(&mut updated);
        if let Some(field) = conflicting_field(&principals, &updated) {
            return Err(StoreError::DuplicateKey(field));
        }
        principals.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.principals.write().await.remove(&id).is_some())
    }
}

/// Kind of email sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    /// Email verification
    Verification,
    /// Password reset
    PasswordReset,
}

/// One recorded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    /// Message kind
    pub kind: MailKind,
    /// Recipient
    pub to: String,
    /// Token the message carried
    pub token: String,
}

/// [`Mailer`] that records messages instead of sending them.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<SentMail>>,
    failing: AtomicBool,
}

impl MemoryMailer {
    /// Create a mailer with an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All recorded messages, oldest first.
    pub async fn sent(&self) -> Vec<SentMail> {
        self.outbox.lock().await.clone()
    }

    /// Most recent message of a kind to a recipient.
    pub async fn last_to(&self, kind: MailKind, to: &str) -> Option<SentMail> {
        self.outbox
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.kind == kind && m.to == to)
            .cloned()
    }

    async fn record(&self, kind: MailKind, to: &str, token: &str) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Transport("outbox disabled".to_string()));
        }
        self.outbox.lock().await.push(SentMail {
            kind,
            to: to.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_verification_email(&self, email: &str, token: &str) -> Result<(), MailError> {
        self.record(MailKind::Verification, email, token).await
    }

    async fn send_password_reset_email(&self, email: &str, token: &str) -> Result<(), MailError> {
        self.record(MailKind::PasswordReset, email, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::PrincipalKind;

    fn principal(email: &str) -> Principal {
        Principal::new(PrincipalKind::User, email, "Test", "User")
    }

    #[tokio::test]
    async fn test_email_uniqueness() {
        let store = MemoryPrincipalStore::new();
        store.create(principal("a@example.com")).await.unwrap();

        let err = store.create(principal("a@example.com")).await.unwrap_err();
        assert_eq!(err, StoreError::DuplicateKey("email".to_string()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_username_and_phone_uniqueness() {
        let store = MemoryPrincipalStore::new();
        store
            .create(principal("a@example.com").with_username("ada").with_phone("+100"))
            .await
            .unwrap();

        let err = store
            .create(principal("b@example.com").with_username("ada"))
            .await
            .unwrap_err();
        assert_eq!(err.duplicate_field(), Some("username"));

        let err = store
            .create(principal("c@example.com").with_phone("+100"))
            .await
            .unwrap_err();
        assert_eq!(err.duplicate_field(), Some("phone"));

        // Absent optional fields never collide with each other.
        store.create(principal("d@example.com")).await.unwrap();
        store.create(principal("e@example.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_provider_id_uniqueness_on_update() {
        let store = MemoryPrincipalStore::new();
        store
            .create(principal("a@example.com").with_provider_id(OAuthProvider::GitHub, "7"))
            .await
            .unwrap();
        let b = store.create(principal("b@example.com")).await.unwrap();

        let err = store
            .update_by_id(b.id, PrincipalPatch::new().link_provider(OAuthProvider::GitHub, "7"))
            .await
            .unwrap_err();
        assert_eq!(err.duplicate_field(), Some("provider_ids.github"));

        let unchanged = store.find_by_id(b.id).await.unwrap().unwrap();
        assert!(unchanged.provider_ids.is_empty());

        let found = store
            .find_by_provider_id(OAuthProvider::GitHub, "7")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.email, "a@example.com");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let store = MemoryPrincipalStore::new();
        let missing = Uuid::now_v7();

        let updated = store
            .update_by_id(missing, PrincipalPatch::new().verified(true))
            .await
            .unwrap();
        assert!(updated.is_none());
        assert!(!store.delete_by_id(missing).await.unwrap());
    }

    #[tokio::test]
    async fn test_mailer_records_and_fails_on_demand() {
        let mailer = MemoryMailer::new();
        mailer
            .send_verification_email("a@example.com", "tok")
            .await
            .unwrap();

        mailer.set_failing(true);
        assert!(mailer
            .send_password_reset_email("a@example.com", "tok2")
            .await
            .is_err());

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(
            mailer
                .last_to(MailKind::Verification, "a@example.com")
                .await
                .map(|m| m.token),
            Some("tok".to_string())
        );
    }
}
