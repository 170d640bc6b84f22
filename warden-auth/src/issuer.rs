//! Token pair issuance
//!
//! Shared by password login, refresh and federated login. Issuing a pair
//! resolves the principal's roles and permissions into the access token and
//! replaces the stored refresh fingerprint, which revokes any earlier refresh
//! token.

use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;
use warden_rbac::RbacResolver;

use crate::claims::{TokenPayload, TokenPurpose};
use crate::error::{AuthError, AuthResult};
use crate::principal::{Principal, PrincipalPatch};
use crate::store::PrincipalStore;
use crate::tokens::{refresh_fingerprint, TokenPair, TokenService};

/// Issues access and refresh token pairs.
#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn PrincipalStore>,
    resolver: RbacResolver,
    tokens: Arc<TokenService>,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an issuer.
    pub fn new(
        store: Arc<dyn PrincipalStore>,
        resolver: RbacResolver,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            store,
            resolver,
            tokens,
        }
    }

    /// The underlying token service.
    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Load a principal by id and issue a pair for it.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotFound`] if no principal has this id.
    #[instrument(skip(self))]
    pub async fn issue_tokens_for_user(&self, principal_id: Uuid) -> AuthResult<TokenPair> {
        let principal = self
            .store
            .find_by_id(principal_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("Principal {principal_id}")))?;
        self.issue_for(&principal).await
    }

    /// Issue a pair for an already loaded principal.
    #[instrument(skip_all, fields(principal_id = %principal.id))]
    pub async fn issue_for(&self, principal: &Principal) -> AuthResult<TokenPair> {
        let access = self.resolver.resolve_permissions(principal).await?;

        let access_token = self.tokens.sign(
            TokenPurpose::Access,
            &TokenPayload::with_access(principal.id, &access),
        )?;
        let refresh_token = self
            .tokens
            .sign(TokenPurpose::Refresh, &TokenPayload::subject(principal.id))?;

        let patch = PrincipalPatch::new().refresh_token(Some(refresh_fingerprint(&refresh_token)));
        self.store
            .update_by_id(principal.id, patch)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("Principal {}", principal.id)))?;

        debug!(
            roles = access.role_ids.len(),
            permissions = access.permissions.len(),
            "Token pair issued"
        );
        Ok(TokenPair::new(
            access_token,
            refresh_token,
            self.tokens.expires_in(TokenPurpose::Access).num_seconds(),
        ))
    }
}
