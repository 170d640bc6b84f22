//! Federated login: find-or-create, linking and the creation race.

mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use common::{Harness, PASSWORD};
use warden_auth::{
    AuthError, AuthResult, IdentityProvider, MemoryPrincipalStore, OAuthProvider, Principal,
    PrincipalKind, PrincipalPatch, PrincipalResolution, PrincipalStore, ProviderProfile,
    ProviderRegistry, Registration, TokenPurpose,
};
use warden_rbac::StoreResult;

/// Provider that accepts any credential and returns a fixed profile.
struct StaticProvider {
    profile: ProviderProfile,
}

impl StaticProvider {
    fn github(email: &str, id: &str, name: Option<&str>) -> Self {
        let mut profile = ProviderProfile::new(OAuthProvider::GitHub, email).with_provider_id(id);
        profile.name = name.map(str::to_string);
        Self { profile }
    }
}

#[async_trait]
impl IdentityProvider for StaticProvider {
    fn provider(&self) -> OAuthProvider {
        self.profile.provider
    }

    async fn verify_and_extract_profile(&self, credential: &str) -> AuthResult<ProviderProfile> {
        if credential == "bad" {
            return Err(AuthError::Unauthorized("GitHub rejected the credential".to_string()));
        }
        Ok(self.profile.clone())
    }
}

/// Store whose first lookup by email misses, simulating a concurrent
/// creation that commits between the lookup and the insert.
struct RacingStore {
    inner: Arc<MemoryPrincipalStore>,
    winner: Principal,
    raced: AtomicBool,
    vanish_after_conflict: bool,
}

#[async_trait]
impl PrincipalStore for RacingStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Principal>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Principal>> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            // The other request commits right after our miss.
            self.inner.create(self.winner.clone()).await?;
            return Ok(None);
        }
        if self.vanish_after_conflict {
            return Ok(None);
        }
        self.inner.find_by_email(email).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Principal>> {
        self.inner.find_by_username(username).await
    }

    async fn find_by_phone(&self, phone: &str) -> StoreResult<Option<Principal>> {
        self.inner.find_by_phone(phone).await
    }

    async fn find_by_provider_id(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> StoreResult<Option<Principal>> {
        self.inner.find_by_provider_id(provider, provider_id).await
    }

    async fn create(&self, principal: Principal) -> StoreResult<Principal> {
        self.inner.create(principal).await
    }

    async fn update_by_id(&self, id: Uuid, patch: PrincipalPatch) -> StoreResult<Option<Principal>> {
        self.inner.update_by_id(id, patch).await
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_by_id(id).await
    }
}

async fn racing_harness(vanish_after_conflict: bool) -> (Harness, Principal) {
    let inner = Arc::new(MemoryPrincipalStore::new());
    let winner = Principal::new(PrincipalKind::User, "race@example.com", "Winner", "User").verified();
    let store = Arc::new(RacingStore {
        inner: inner.clone(),
        winner: winner.clone(),
        raced: AtomicBool::new(false),
        vanish_after_conflict,
    });
    let h = Harness::with_principal_store(common::config(), store, inner).await;
    (h, winner)
}

#[tokio::test]
async fn test_first_login_creates_then_reuses() {
    let h = Harness::new().await;
    let provider = StaticProvider::github("New@Example.com", "1001", Some("Grace Hopper"));

    let first = h.services.oauth.authenticate(&provider, "cred").await.unwrap();
    assert_eq!(first.resolution, PrincipalResolution::Created);

    let created = h.principals.find_by_id(first.principal_id).await.unwrap().unwrap();
    assert_eq!(created.email, "new@example.com");
    assert!(created.verified);
    assert!(!created.has_password());
    assert_eq!(created.first_name, "Grace");
    assert_eq!(created.last_name, "Hopper");
    assert_eq!(created.username.as_deref(), Some("new"));
    assert_eq!(created.provider_id(OAuthProvider::GitHub), Some("1001"));
    assert_eq!(created.roles, vec![h.user_role.id]);

    let claims = h
        .services
        .tokens
        .verify(TokenPurpose::Access, &first.tokens.access_token)
        .unwrap();
    assert!(claims.has_permission("profile:read"));

    let second = h.services.oauth.authenticate(&provider, "cred").await.unwrap();
    assert_eq!(second.resolution, PrincipalResolution::Found);
    assert_eq!(second.principal_id, first.principal_id);
    assert_eq!(h.principals.len().await, 1);
}

#[tokio::test]
async fn test_missing_name_uses_placeholder() {
    let h = Harness::new().await;
    let provider = StaticProvider::github("anon@example.com", "7", None);

    let login = h.services.oauth.authenticate(&provider, "cred").await.unwrap();
    let principal = h.principals.find_by_id(login.principal_id).await.unwrap().unwrap();
    assert_eq!(principal.first_name, "Federated");
    assert_eq!(principal.last_name, "User");
}

#[tokio::test]
async fn test_username_collision_gets_suffix() {
    let h = Harness::new().await;
    h.services
        .credentials
        .register(Registration::new("taken@example.com", "T", PASSWORD).with_username("taken"))
        .await
        .unwrap();

    let provider = StaticProvider::github("taken@other.org", "55", None);
    let login = h.services.oauth.authenticate(&provider, "cred").await.unwrap();
    let principal = h.principals.find_by_id(login.principal_id).await.unwrap().unwrap();

    let username = principal.username.unwrap();
    assert!(username.starts_with("taken"));
    assert_ne!(username, "taken");
}

#[tokio::test]
async fn test_existing_password_user_gets_linked_and_verified() {
    let h = Harness::new().await;
    let outcome = h
        .services
        .credentials
        .register(Registration::new("both@example.com", "Both", PASSWORD))
        .await
        .unwrap();

    let provider = StaticProvider::github("both@example.com", "2002", Some("Both"));
    let login = h.services.oauth.authenticate(&provider, "cred").await.unwrap();
    assert_eq!(login.resolution, PrincipalResolution::Found);
    assert_eq!(login.principal_id, outcome.principal.id);

    let linked = h.principals.find_by_id(login.principal_id).await.unwrap().unwrap();
    assert!(linked.verified);
    assert!(linked.has_password());
    assert_eq!(linked.provider_id(OAuthProvider::GitHub), Some("2002"));

    // Password login still works after linking.
    h.services
        .credentials
        .login("both@example.com", PASSWORD)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_banned_principal_is_refused() {
    let h = Harness::new().await;
    let id = h.verified_user("shunned@example.com").await;
    h.services.admin.ban(id).await.unwrap();

    let provider = StaticProvider::github("shunned@example.com", "9", None);
    let err = h.services.oauth.authenticate(&provider, "cred").await.unwrap_err();
    assert!(matches!(err, AuthError::Forbidden(_)));
}

#[tokio::test]
async fn test_provider_rejection_passes_through() {
    let h = Harness::new().await;
    let provider = StaticProvider::github("x@example.com", "1", None);

    let err = h.services.oauth.authenticate(&provider, "bad").await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized(_)));
    assert!(h.principals.is_empty().await);
}

#[tokio::test]
async fn test_creation_race_uses_winner() {
    let (h, winner) = racing_harness(false).await;
    let provider = StaticProvider::github("race@example.com", "3003", Some("Loser"));

    let login = h.services.oauth.authenticate(&provider, "cred").await.unwrap();
    assert_eq!(login.resolution, PrincipalResolution::RaceRetried);
    assert_eq!(login.principal_id, winner.id);
    assert_eq!(h.principals.len().await, 1);

    let stored = h.principals.find_by_id(winner.id).await.unwrap().unwrap();
    assert_eq!(stored.provider_id(OAuthProvider::GitHub), Some("3003"));
}

#[tokio::test]
async fn test_creation_race_with_nothing_to_reread_is_internal() {
    let (h, _) = racing_harness(true).await;
    let provider = StaticProvider::github("race@example.com", "3003", None);

    let err = h.services.oauth.authenticate(&provider, "cred").await.unwrap_err();
    assert!(matches!(err, AuthError::Internal(_)));
}

#[tokio::test]
async fn test_concurrent_first_logins_share_one_principal() {
    let h = Harness::new().await;
    let provider = StaticProvider::github("twin@example.com", "4004", None);

    let (a, b) = tokio::join!(
        h.services.oauth.authenticate(&provider, "cred"),
        h.services.oauth.authenticate(&provider, "cred"),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.principal_id, b.principal_id);
    assert_eq!(h.principals.len().await, 1);
}

#[tokio::test]
async fn test_registry_dispatch() {
    let h = Harness::new().await;
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(StaticProvider::github("reg@example.com", "11", None)));

    let login = h
        .services
        .oauth
        .authenticate_with(&registry, "github", "cred")
        .await
        .unwrap();
    assert_eq!(login.resolution, PrincipalResolution::Created);

    let err = h
        .services
        .oauth
        .authenticate_with(&registry, "google", "cred")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::BadRequest(_)));
}

#[tokio::test]
async fn test_provider_subject_takes_precedence_over_email() {
    let h = Harness::new().await;
    let first = h
        .services
        .oauth
        .authenticate(&StaticProvider::github("first@example.com", "5005", None), "cred")
        .await
        .unwrap();
    h.verified_user("second@example.com").await;

    // The provider now reports a different address for the same subject.
    let login = h
        .services
        .oauth
        .authenticate(&StaticProvider::github("second@example.com", "5005", None), "cred")
        .await
        .unwrap();
    assert_eq!(login.principal_id, first.principal_id);
    assert_eq!(login.resolution, PrincipalResolution::Found);

    let second = h
        .principals
        .find_by_email("second@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(second.provider_ids.is_empty());
    assert_eq!(h.principals.len().await, 2);
}
