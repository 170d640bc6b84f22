//! Identity providers
//!
//! An identity provider adapter takes an opaque credential issued by an
//! external provider (an ID token or an access token), verifies it against
//! that provider and returns a normalized [`ProviderProfile`]. The core never
//! handles provider secrets beyond the credential it is given.
//!
//! HTTP adapters for Google, GitHub and Microsoft are behind the `providers`
//! feature. Hosts can register their own [`IdentityProvider`] implementations
//! in a [`ProviderRegistry`] either way.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AuthError, AuthResult};

#[cfg(feature = "providers")]
mod github;
#[cfg(feature = "providers")]
mod google;
#[cfg(feature = "providers")]
mod http;
#[cfg(feature = "providers")]
mod microsoft;

#[cfg(feature = "providers")]
pub use github::GitHubProvider;
#[cfg(feature = "providers")]
pub use google::GoogleProvider;
#[cfg(feature = "providers")]
pub use microsoft::MicrosoftProvider;

/// Supported identity providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OAuthProvider {
    /// Google (ID token)
    Google,
    /// GitHub (OAuth access token)
    GitHub,
    /// Microsoft (Graph access token)
    Microsoft,
}

impl OAuthProvider {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::GitHub => "github",
            OAuthProvider::Microsoft => "microsoft",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google" => Some(OAuthProvider::Google),
            "github" => Some(OAuthProvider::GitHub),
            "microsoft" | "azure" | "azuread" => Some(OAuthProvider::Microsoft),
            _ => None,
        }
    }

    /// Display name used in error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "Google",
            OAuthProvider::GitHub => "GitHub",
            OAuthProvider::Microsoft => "Microsoft",
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized identity returned by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Which provider vouched for this identity
    pub provider: OAuthProvider,
    /// Provider-side subject id, when the provider exposes one
    pub provider_id: Option<String>,
    /// Email address, lowercase
    pub email: String,
    /// Display name
    pub name: Option<String>,
}

impl ProviderProfile {
    /// Create a profile, normalizing the email.
    pub fn new(provider: OAuthProvider, email: impl AsRef<str>) -> Self {
        Self {
            provider,
            provider_id: None,
            email: crate::principal::normalize_email(email.as_ref()),
            name: None,
        }
    }

    /// Set the provider subject id.
    pub fn with_provider_id(mut self, id: impl Into<String>) -> Self {
        self.provider_id = Some(id.into());
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Verifies provider credentials.
///
/// # Errors
///
/// Implementations return [`AuthError::Unauthorized`] when the provider
/// rejects the credential, [`AuthError::BadRequest`] when the provider's
/// answer is unusable (for example no email address) and
/// [`AuthError::Internal`] when the provider cannot be reached.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The provider this adapter talks to.
    fn provider(&self) -> OAuthProvider;

    /// Verify a credential and extract the caller's profile.
    async fn verify_and_extract_profile(&self, credential: &str) -> AuthResult<ProviderProfile>;
}

/// Identity providers by kind.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<OAuthProvider, Arc<dyn IdentityProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut registered: Vec<_> = self.providers.keys().map(OAuthProvider::as_str).collect();
        registered.sort_unstable();
        f.debug_struct("ProviderRegistry")
            .field("providers", &registered)
            .finish()
    }
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry holding the GitHub and Microsoft adapters, plus
    /// Google when a client id is configured.
    #[cfg(feature = "providers")]
    pub fn from_settings(settings: &crate::config::ProviderSettings) -> AuthResult<Self> {
        let mut registry = Self::new();
        if settings.google_client_id.is_some() {
            registry.register(Arc::new(GoogleProvider::new(settings)?));
        } else {
            tracing::warn!("GOOGLE_CLIENT_ID is not set; Google sign-in is disabled");
        }
        registry.register(Arc::new(GitHubProvider::new(settings)?));
        registry.register(Arc::new(MicrosoftProvider::new(settings)?));
        Ok(registry)
    }

    /// Register an adapter, replacing any previous one for the same provider.
    pub fn register(&mut self, provider: Arc<dyn IdentityProvider>) {
        self.providers.insert(provider.provider(), provider);
    }

    /// Look up an adapter.
    ///
    /// # Errors
    ///
    /// [`AuthError::BadRequest`] if no adapter is registered for `provider`.
    pub fn get(&self, provider: OAuthProvider) -> AuthResult<Arc<dyn IdentityProvider>> {
        self.providers.get(&provider).cloned().ok_or_else(|| {
            AuthError::BadRequest(format!("Provider {} is not enabled", provider))
        })
    }

    /// Look up an adapter by name.
    pub fn get_by_name(&self, name: &str) -> AuthResult<Arc<dyn IdentityProvider>> {
        let provider = OAuthProvider::parse(name)
            .ok_or_else(|| AuthError::BadRequest(format!("Unknown provider: {name}")))?;
        self.get(provider)
    }

    /// Check if an adapter is registered.
    pub fn contains(&self, provider: OAuthProvider) -> bool {
        self.providers.contains_key(&provider)
    }
}
