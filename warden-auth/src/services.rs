//! Service wiring
//!
//! Builds every service from one [`AuthConfig`] and a set of stores so that
//! they share a single token service, resolver and admin role cache.

use std::sync::Arc;
use warden_rbac::{
    MemoryPermissionStore, MemoryRoleStore, PermissionStore, RbacResolver, RoleCatalog, RoleStore,
};

use crate::admin::AccountAdmin;
use crate::config::AuthConfig;
use crate::credentials::CredentialService;
use crate::error::AuthResult;
use crate::federation::OAuthOrchestrator;
use crate::guard::{AuthenticationGuard, Guards};
use crate::issuer::TokenIssuer;
use crate::mail::Mailer;
use crate::memory::MemoryPrincipalStore;
use crate::store::PrincipalStore;
use crate::tokens::TokenService;

/// Persistence collaborators.
#[derive(Clone)]
pub struct Stores {
    /// Principal store
    pub principals: Arc<dyn PrincipalStore>,
    /// Role store
    pub roles: Arc<dyn RoleStore>,
    /// Permission store
    pub permissions: Arc<dyn PermissionStore>,
}

impl Stores {
    /// Empty in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            principals: Arc::new(MemoryPrincipalStore::new()),
            roles: Arc::new(MemoryRoleStore::new()),
            permissions: Arc::new(MemoryPermissionStore::new()),
        }
    }
}

/// All services, wired together.
#[derive(Clone)]
pub struct AuthServices {
    /// Token signing and verification
    pub tokens: Arc<TokenService>,
    /// Token pair issuance
    pub issuer: TokenIssuer,
    /// Password credential lifecycle
    pub credentials: CredentialService,
    /// Federated login
    pub oauth: OAuthOrchestrator,
    /// Ban and role administration
    pub admin: AccountAdmin,
    /// Guard factory
    pub guards: Guards,
    /// Role and permission catalog
    pub catalog: RoleCatalog,
    /// Role resolution
    pub resolver: RbacResolver,
}

impl AuthServices {
    /// Wire every service.
    ///
    /// # Errors
    ///
    /// Configuration errors from the token service (a missing secret or an
    /// out-of-range lifetime), the lockout policy (a non-positive lock
    /// duration) or the password hasher (invalid cost parameters).
    pub fn new(config: &AuthConfig, stores: Stores, mailer: Arc<dyn Mailer>) -> AuthResult<Self> {
        let tokens = Arc::new(TokenService::new(config)?);
        let resolver = RbacResolver::new(stores.roles.clone(), stores.permissions.clone());
        let issuer = TokenIssuer::new(stores.principals.clone(), resolver.clone(), tokens.clone());

        let credentials = CredentialService::new(
            config,
            stores.principals.clone(),
            stores.roles.clone(),
            issuer.clone(),
            mailer,
        )?;
        let oauth = OAuthOrchestrator::new(
            config,
            stores.principals.clone(),
            stores.roles.clone(),
            issuer.clone(),
        );
        let admin = AccountAdmin::new(stores.principals.clone(), stores.roles.clone());
        let guards = Guards::new(
            config,
            AuthenticationGuard::new(tokens.clone(), stores.principals.clone()),
            stores.roles.clone(),
            resolver.clone(),
        );
        let catalog = RoleCatalog::new(stores.roles, stores.permissions);

        Ok(Self {
            tokens,
            issuer,
            credentials,
            oauth,
            admin,
            guards,
            catalog,
            resolver,
        })
    }
}
