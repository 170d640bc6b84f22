//! Federated login
//!
//! Turns a verified provider profile into a principal and a token pair. The
//! principal is found by provider subject, then by email, or created; when
//! two first-time logins for the same email race, the store's unique index
//! rejects the loser, which then re-reads the winner's record instead of
//! failing.

use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use warden_rbac::{RoleStore, StoreError};

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::issuer::TokenIssuer;
use crate::principal::{split_display_name, Principal, PrincipalKind, PrincipalPatch};
use crate::providers::{IdentityProvider, ProviderProfile, ProviderRegistry};
use crate::store::PrincipalStore;
use crate::tokens::TokenPair;

const USERNAME_ATTEMPTS: usize = 5;

/// How the principal for a federated login was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalResolution {
    /// An existing principal matched the provider subject or the email
    Found,
    /// A new principal was created
    Created,
    /// Creation lost a race and the winner's record was used
    RaceRetried,
}

/// Result of a federated login.
#[derive(Debug, Clone, Serialize)]
pub struct FederatedLogin {
    /// The principal logged in
    pub principal_id: Uuid,
    /// How it was resolved
    pub resolution: PrincipalResolution,
    /// Issued tokens
    pub tokens: TokenPair,
}

/// Orchestrates federated logins.
#[derive(Clone)]
pub struct OAuthOrchestrator {
    store: Arc<dyn PrincipalStore>,
    roles: Arc<dyn RoleStore>,
    issuer: TokenIssuer,
    default_role: String,
}

impl OAuthOrchestrator {
    /// Create the orchestrator.
    pub fn new(
        config: &AuthConfig,
        store: Arc<dyn PrincipalStore>,
        roles: Arc<dyn RoleStore>,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            store,
            roles,
            issuer,
            default_role: config.default_role.clone(),
        }
    }

    /// Authenticate with a provider credential.
    ///
    /// A principal already linked to the provider subject is used first,
    /// whatever email the provider now reports. Otherwise a principal with
    /// the same email is reused, gaining the provider link and the verified
    /// flag if missing. A first login creates a verified principal with the
    /// default role and the provider link.
    ///
    /// # Errors
    ///
    /// * Whatever the adapter reports for a rejected or unusable credential
    /// * [`AuthError::Forbidden`] if the matched principal is banned
    /// * [`AuthError::Internal`] if creation hit a uniqueness conflict and
    ///   no principal holds the provider subject or the email afterwards
    #[instrument(skip_all, fields(provider = %provider.provider()))]
    pub async fn authenticate(
        &self,
        provider: &dyn IdentityProvider,
        credential: &str,
    ) -> AuthResult<FederatedLogin> {
        let profile = provider.verify_and_extract_profile(credential).await?;
        if profile.email.is_empty() {
            return Err(AuthError::BadRequest("Provider profile has no email".to_string()));
        }

        let (principal, resolution) = match self.find_existing(&profile).await? {
            Some(existing) => (existing, PrincipalResolution::Found),
            None => self.create(&profile).await?,
        };

        if principal.banned {
            return Err(AuthError::Forbidden("Account is banned".to_string()));
        }
        let principal = self.link(principal, &profile).await?;

        let tokens = self.issuer.issue_for(&principal).await?;
        info!(principal_id = %principal.id, ?resolution, "Federated login succeeded");
        Ok(FederatedLogin {
            principal_id: principal.id,
            resolution,
            tokens,
        })
    }

    /// Authenticate through a registry, selecting the adapter by name.
    pub async fn authenticate_with(
        &self,
        registry: &ProviderRegistry,
        provider_name: &str,
        credential: &str,
    ) -> AuthResult<FederatedLogin> {
        let provider = registry.get_by_name(provider_name)?;
        self.authenticate(provider.as_ref(), credential).await
    }

    async fn find_existing(&self, profile: &ProviderProfile) -> AuthResult<Option<Principal>> {
        if let Some(provider_id) = &profile.provider_id {
            if let Some(linked) = self
                .store
                .find_by_provider_id(profile.provider, provider_id)
                .await?
            {
                debug!(principal_id = %linked.id, "Matched principal by provider subject");
                return Ok(Some(linked));
            }
        }
        Ok(self.store.find_by_email(&profile.email).await?)
    }

    async fn create(&self, profile: &ProviderProfile) -> AuthResult<(Principal, PrincipalResolution)> {
        let default_role = self
            .roles
            .find_by_name(&self.default_role)
            .await?
            .ok_or_else(|| {
                AuthError::Config(format!("Default role '{}' has not been seeded", self.default_role))
            })?;

        let (first_name, last_name) = split_display_name(profile.name.as_deref());
        let mut principal = Principal::new(PrincipalKind::User, &profile.email, first_name, last_name)
            .with_role(default_role.id)
            .verified();
        principal.username = Some(self.available_username(&profile.email).await?);
        if let Some(id) = &profile.provider_id {
            principal = principal.with_provider_id(profile.provider, id.clone());
        }

        match self.store.create(principal).await {
            Ok(created) => {
                info!(principal_id = %created.id, "Principal created from provider profile");
                Ok((created, PrincipalResolution::Created))
            }
            Err(StoreError::DuplicateKey(field)) => {
                debug!(%field, "Concurrent creation detected; re-reading");
                match self.find_existing(profile).await? {
                    Some(winner) => Ok((winner, PrincipalResolution::RaceRetried)),
                    None => Err(AuthError::Internal(format!(
                        "Principal creation conflicted on {field} but no matching principal exists"
                    ))),
                }
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn link(&self, principal: Principal, profile: &ProviderProfile) -> AuthResult<Principal> {
        let mut patch = PrincipalPatch::new();

        if let Some(provider_id) = &profile.provider_id {
            match principal.provider_id(profile.provider) {
                None => patch = patch.link_provider(profile.provider, provider_id.clone()),
                Some(linked) if linked != provider_id => {
                    warn!(
                        principal_id = %principal.id,
                        provider = %profile.provider,
                        "Provider subject differs from the linked one; keeping the existing link"
                    );
                }
                Some(_) => {}
            }
        }
        if !principal.verified {
            patch = patch.verified(true);
        }

        if patch.is_empty() {
            return Ok(principal);
        }
        self.store
            .update_by_id(principal.id, patch)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("Principal no longer exists".to_string()))
    }

    async fn available_username(&self, email: &str) -> AuthResult<String> {
        let base = username_base(email);
        if self.store.find_by_username(&base).await?.is_none() {
            return Ok(base);
        }
        for _ in 0..USERNAME_ATTEMPTS {
            let candidate = format!("{}{}", base, rand::thread_rng().gen_range(1000..10000));
            if self.store.find_by_username(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Ok(format!("{}-{}", base, Uuid::now_v7().simple()))
    }
}

/// Username derived from an email local part, restricted to `[a-z0-9._-]`.
fn username_base(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let cleaned: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_base() {
        assert_eq!(username_base("Ada.Lovelace+news@example.com"), "ada.lovelacenews");
        assert_eq!(username_base("j_doe-1@example.com"), "j_doe-1");
        assert_eq!(username_base("+++@example.com"), "user");
    }
}
