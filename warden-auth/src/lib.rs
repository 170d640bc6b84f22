//! # Warden Authentication
//!
//! Authentication and authorization core: purpose-tagged tokens, the
//! password credential lifecycle, federated login and request guards.
//!
//! ## Overview
//!
//! The warden-auth crate handles:
//! - **Tokens**: HS256 JWTs for four purposes (access, refresh, verify,
//!   reset), each with its own secret and lifetime
//! - **Credentials**: Registration, login with lockout, refresh rotation,
//!   password reset and change, email verification, account deletion
//! - **Federation**: Google, GitHub and Microsoft credentials turned into
//!   principals with race-safe find-or-create
//! - **Guards**: Bearer authentication with a live principal reload, plus
//!   role, permission and admin checks
//!
//! Roles and permissions come from `warden-rbac`.
//!
//! ## Features
//!
//! - `providers` (default): HTTP adapters for Google, GitHub and Microsoft
//!   using reqwest
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_auth::{AuthConfig, AuthServices, LogMailer, Registration, Stores};
//!
//! # async fn example() -> warden_auth::AuthResult<()> {
//! let config = AuthConfig::from_env()?;
//! let services = AuthServices::new(&config, Stores::in_memory(), Arc::new(LogMailer))?;
//!
//! services.catalog.create_permission("profile:read", None, None).await?;
//! services.catalog.create_role("user", "Default role", &["profile:read"]).await?;
//!
//! let outcome = services
//!     .credentials
//!     .register(Registration::new("ada@example.com", "Ada Lovelace", "correct horse"))
//!     .await?;
//! println!("{}", outcome.message);
//! # Ok(())
//! # }
//! ```
//!
//! ## Token claims
//!
//! | claim         | access | refresh / verify / reset |
//! |---------------|--------|--------------------------|
//! | `sub`         | yes    | yes                      |
//! | `roles`       | yes    | no                       |
//! | `permissions` | yes    | no                       |
//! | `purpose`     | no     | yes                      |
//! | `iss`, `iat`, `exp`, `jti` | yes | yes             |
//!
//! A refresh token is stored only as a SHA-256 fingerprint, and issuing a
//! new pair replaces it. Tokens issued before a password change stop
//! authenticating.

pub mod admin;
pub mod claims;
pub mod config;
pub mod credentials;
pub mod error;
pub mod federation;
pub mod guard;
pub mod issuer;
pub mod lockout;
pub mod mail;
pub mod memory;
pub mod password;
pub mod principal;
pub mod providers;
pub mod services;
pub mod store;
pub mod tokens;

// Re-export main types for convenience
pub use admin::AccountAdmin;
pub use claims::{TokenClaims, TokenPayload, TokenPurpose};
pub use config::{AuthConfig, ProviderSettings, TokenSettings};
pub use credentials::{Acknowledgement, CredentialService, Registration, RegistrationOutcome};
pub use error::{AuthError, AuthResult};
pub use federation::{FederatedLogin, OAuthOrchestrator, PrincipalResolution};
pub use guard::{
    bearer_token, AccessPolicy, AdminGuard, AdminRoleCache, AuthContext, AuthenticationGuard,
    Guard, Guards, PermissionGuard, PermissionSource, RoleGuard,
};
pub use issuer::TokenIssuer;
pub use lockout::LockoutPolicy;
pub use mail::{LogMailer, MailError, Mailer};
pub use memory::{MailKind, MemoryMailer, MemoryPrincipalStore, SentMail};
pub use password::{Argon2Hasher, Argon2Settings};
pub use principal::{Principal, PrincipalKind, PrincipalPatch};
pub use providers::{IdentityProvider, OAuthProvider, ProviderProfile, ProviderRegistry};
#[cfg(feature = "providers")]
pub use providers::{GitHubProvider, GoogleProvider, MicrosoftProvider};
pub use services::{AuthServices, Stores};
pub use store::PrincipalStore;
pub use tokens::{refresh_fingerprint, TokenPair, TokenService, MAX_TOKEN_LIFETIME_DAYS};
