//! Request-time authorization guards
//!
//! [`AuthenticationGuard`] turns an `Authorization` header into an
//! [`AuthContext`]. It verifies the access token and then reloads the
//! principal, so bans, unverification, deletion and password changes take
//! effect on the next request instead of at token expiry.
//!
//! Role, permission and admin guards run against an authenticated context.
//! [`AccessPolicy`] chains them behind authentication:
//!
//! ```rust,no_run
//! # async fn example(guards: &warden_auth::Guards, header: Option<&str>) -> warden_auth::AuthResult<()> {
//! let policy = guards.policy().require_permission("reports:read").require_admin();
//! let ctx = policy.authorize(header).await?;
//! println!("request by {}", ctx.principal.email);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use warden_rbac::{RbacResolver, RoleId, RoleStore};

use crate::claims::{TokenClaims, TokenPurpose};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::principal::Principal;
use crate::store::PrincipalStore;
use crate::tokens::TokenService;

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(header: Option<&str>) -> AuthResult<&str> {
    let header = header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AuthError::Unauthorized("Missing authorization header".to_string()))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AuthError::Unauthorized("Malformed authorization header".to_string()))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Unauthorized(
            "Authorization scheme must be Bearer".to_string(),
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Unauthorized("Missing bearer token".to_string()));
    }
    Ok(token)
}

/// An authenticated request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Verified access token claims
    pub claims: TokenClaims,
    /// The principal, freshly loaded
    pub principal: Principal,
}

impl AuthContext {
    /// The authenticated principal's id.
    pub fn principal_id(&self) -> Uuid {
        self.principal.id
    }
}

/// Authenticates bearer access tokens.
#[derive(Clone)]
pub struct AuthenticationGuard {
    tokens: Arc<TokenService>,
    store: Arc<dyn PrincipalStore>,
}

impl AuthenticationGuard {
    /// Create the guard.
    pub fn new(tokens: Arc<TokenService>, store: Arc<dyn PrincipalStore>) -> Self {
        Self { tokens, store }
    }

    /// Authenticate an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// * Unauthorized class (401) for a missing or malformed header, an
    ///   invalid, expired or non-access token, a deleted principal, or a
    ///   token issued before the last password change
    /// * [`AuthError::Forbidden`] for an unverified or banned principal
    pub async fn authenticate(&self, authorization: Option<&str>) -> AuthResult<AuthContext> {
        let token = bearer_token(authorization).map_err(|e| {
            debug!(error = %e, "Rejected request");
            e
        })?;
        self.authenticate_token(token).await
    }

    /// Authenticate a bare access token.
    #[instrument(skip_all)]
    pub async fn authenticate_token(&self, token: &str) -> AuthResult<AuthContext> {
        let claims = self
            .tokens
            .verify(TokenPurpose::Access, token)
            .map_err(|e| {
                debug!(error = %e, "Access token rejected");
                e
            })?;
        let principal_id = claims
            .principal_id()
            .ok_or_else(|| AuthError::InvalidToken("Subject is not a principal id".to_string()))?;

        let principal = self
            .store
            .find_by_id(principal_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("Principal no longer exists".to_string()))?;

        if !principal.verified {
            debug!(%principal_id, "Unverified principal rejected");
            return Err(AuthError::Forbidden("Email address is not verified".to_string()));
        }
        if principal.banned {
            debug!(%principal_id, "Banned principal rejected");
            return Err(AuthError::Forbidden("Account is banned".to_string()));
        }
        if principal.is_token_stale(claims.issued_at_micros()) {
            debug!(%principal_id, "Token predates password change");
            return Err(AuthError::Unauthorized(
                "Password changed since this token was issued".to_string(),
            ));
        }

        Ok(AuthContext { claims, principal })
    }
}

/// A check run against an authenticated request.
#[async_trait]
pub trait Guard: Send + Sync {
    /// Allow or refuse the request.
    async fn check(&self, ctx: &AuthContext) -> AuthResult<()>;
}

/// Requires a role id in the token's `roles` claim.
#[derive(Debug, Clone)]
pub struct RoleGuard {
    role_id: String,
}

impl RoleGuard {
    /// Require a role.
    pub fn require(role_id: RoleId) -> Self {
        Self {
            role_id: role_id.to_string(),
        }
    }
}

#[async_trait]
impl Guard for RoleGuard {
    async fn check(&self, ctx: &AuthContext) -> AuthResult<()> {
        if ctx.claims.has_role(&self.role_id) {
            return Ok(());
        }
        debug!(principal_id = %ctx.principal.id, role = %self.role_id, "Missing role");
        Err(AuthError::Forbidden("Missing required role".to_string()))
    }
}

/// Where a permission guard reads permissions from.
#[derive(Debug, Clone)]
pub enum PermissionSource {
    /// The token's `permissions` claim, as of issuance
    Claims,
    /// Resolved from the principal's current roles on every check
    Live(RbacResolver),
}

/// Requires a named permission.
#[derive(Debug, Clone)]
pub struct PermissionGuard {
    permission: String,
    source: PermissionSource,
}

impl PermissionGuard {
    /// Require a permission carried in the token.
    pub fn require(permission: impl Into<String>) -> Self {
        Self {
            permission: permission.into(),
            source: PermissionSource::Claims,
        }
    }

    /// Require a permission resolved from current role grants.
    pub fn live(permission: impl Into<String>, resolver: RbacResolver) -> Self {
        Self {
            permission: permission.into(),
            source: PermissionSource::Live(resolver),
        }
    }
}

#[async_trait]
impl Guard for PermissionGuard {
    async fn check(&self, ctx: &AuthContext) -> AuthResult<()> {
        let granted = match &self.source {
            PermissionSource::Claims => ctx.claims.has_permission(&self.permission),
            PermissionSource::Live(resolver) => resolver
                .resolve_permissions(&ctx.principal)
                .await?
                .permissions
                .has(&self.permission),
        };
        if granted {
            return Ok(());
        }
        debug!(principal_id = %ctx.principal.id, permission = %self.permission, "Missing permission");
        Err(AuthError::Forbidden(format!(
            "Missing permission: {}",
            self.permission
        )))
    }
}

/// Process-wide cache of the admin role id.
///
/// Loaded on first use. Two concurrent first loads may both query the store;
/// they write the same id, so the last write wins harmlessly.
#[derive(Debug, Default)]
pub struct AdminRoleCache {
    slot: RwLock<Option<RoleId>>,
}

impl AdminRoleCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached id, if loaded.
    pub async fn cached(&self) -> Option<RoleId> {
        *self.slot.read().await
    }

    /// Forget the cached id, forcing a reload.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    async fn get_or_load(&self, roles: &dyn RoleStore, admin_role: &str) -> AuthResult<RoleId> {
        if let Some(id) = self.cached().await {
            return Ok(id);
        }

        let role = roles.find_by_name(admin_role).await?.ok_or_else(|| {
            AuthError::Config(format!("Admin role '{admin_role}' has not been seeded"))
        })?;
        *self.slot.write().await = Some(role.id);
        info!(role_id = %role.id, "Admin role id cached");
        Ok(role.id)
    }
}

/// Requires the admin role.
#[derive(Clone)]
pub struct AdminGuard {
    roles: Arc<dyn RoleStore>,
    admin_role: String,
    cache: Arc<AdminRoleCache>,
}

impl AdminGuard {
    /// Create the guard over a shared cache.
    pub fn new(roles: Arc<dyn RoleStore>, admin_role: impl Into<String>, cache: Arc<AdminRoleCache>) -> Self {
        Self {
            roles,
            admin_role: admin_role.into(),
            cache,
        }
    }
}

#[async_trait]
impl Guard for AdminGuard {
    async fn check(&self, ctx: &AuthContext) -> AuthResult<()> {
        let admin_id = self
            .cache
            .get_or_load(self.roles.as_ref(), &self.admin_role)
            .await?;
        if ctx.claims.has_role(&admin_id.to_string()) {
            return Ok(());
        }
        debug!(principal_id = %ctx.principal.id, "Admin role required");
        Err(AuthError::Forbidden("Administrator role required".to_string()))
    }
}

/// Authentication followed by a chain of guards, checked in order.
#[derive(Clone)]
pub struct AccessPolicy {
    authentication: AuthenticationGuard,
    factory: Guards,
    guards: Vec<Arc<dyn Guard>>,
}

impl AccessPolicy {
    /// Require a role id.
    pub fn require_role(self, role_id: RoleId) -> Self {
        self.require(RoleGuard::require(role_id))
    }

    /// Require a permission from the token's claims.
    pub fn require_permission(self, permission: impl Into<String>) -> Self {
        self.require(PermissionGuard::require(permission))
    }

    /// Require a permission resolved from current role grants.
    pub fn require_live_permission(self, permission: impl Into<String>) -> Self {
        let guard = self.factory.live_permission(permission);
        self.require(guard)
    }

    /// Require the admin role.
    pub fn require_admin(self) -> Self {
        let guard = self.factory.admin();
        self.require(guard)
    }

    /// Add any guard.
    pub fn require(mut self, guard: impl Guard + 'static) -> Self {
        self.guards.push(Arc::new(guard));
        self
    }

    /// Authenticate the header and run every guard.
    pub async fn authorize(&self, authorization: Option<&str>) -> AuthResult<AuthContext> {
        let ctx = self.authentication.authenticate(authorization).await?;
        for guard in &self.guards {
            guard.check(&ctx).await?;
        }
        Ok(ctx)
    }
}

/// Builds guards sharing one authentication guard and one admin role cache.
#[derive(Clone)]
pub struct Guards {
    authentication: AuthenticationGuard,
    roles: Arc<dyn RoleStore>,
    resolver: RbacResolver,
    admin_role: String,
    admin_cache: Arc<AdminRoleCache>,
}

impl Guards {
    /// Create the factory.
    pub fn new(
        config: &AuthConfig,
        authentication: AuthenticationGuard,
        roles: Arc<dyn RoleStore>,
        resolver: RbacResolver,
    ) -> Self {
        Self {
            authentication,
            roles,
            resolver,
            admin_role: config.admin_role.clone(),
            admin_cache: Arc::new(AdminRoleCache::new()),
        }
    }

    /// The authentication guard.
    pub fn authentication(&self) -> &AuthenticationGuard {
        &self.authentication
    }

    /// The shared admin role cache.
    pub fn admin_cache(&self) -> &Arc<AdminRoleCache> {
        &self.admin_cache
    }

    /// An empty policy: authentication only.
    pub fn policy(&self) -> AccessPolicy {
        AccessPolicy {
            authentication: self.authentication.clone(),
            factory: self.clone(),
            guards: Vec::new(),
        }
    }

    /// Role guard.
    pub fn role(&self, role_id: RoleId) -> RoleGuard {
        RoleGuard::require(role_id)
    }

    /// Permission guard reading token claims.
    pub fn permission(&self, permission: impl Into<String>) -> PermissionGuard {
        PermissionGuard::require(permission)
    }

    /// Permission guard resolving current grants.
    pub fn live_permission(&self, permission: impl Into<String>) -> PermissionGuard {
        PermissionGuard::live(permission, self.resolver.clone())
    }

    /// Admin guard over the shared cache.
    pub fn admin(&self) -> AdminGuard {
        AdminGuard::new(self.roles.clone(), self.admin_role.clone(), self.admin_cache.clone())
    }
}
