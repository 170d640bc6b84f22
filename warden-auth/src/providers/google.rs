//! Google ID token verification via the tokeninfo endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::http::{build_client, fetch_json};
use super::{IdentityProvider, OAuthProvider, ProviderProfile};
use crate::config::ProviderSettings;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Deserialize)]
struct TokenInfo {
    sub: Option<String>,
    aud: Option<String>,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<serde_json::Value>,
    name: Option<String>,
}

impl TokenInfo {
    // tokeninfo reports the flag as the string "true"; userinfo uses a bool.
    fn email_verified(&self) -> bool {
        match &self.email_verified {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

/// Verifies Google ID tokens.
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    client: Client,
    tokeninfo_url: String,
    client_id: String,
}

impl GoogleProvider {
    /// Create the adapter.
    ///
    /// # Errors
    ///
    /// [`AuthError::Config`] when `GOOGLE_CLIENT_ID` is unset; every ID token
    /// is checked against it.
    pub fn new(settings: &ProviderSettings) -> AuthResult<Self> {
        let client_id = settings.google_client_id.clone().ok_or_else(|| {
            AuthError::Config(
                "GOOGLE_CLIENT_ID is not set; Google ID tokens cannot be checked".to_string(),
            )
        })?;
        Ok(Self {
            client: build_client(settings.timeout)?,
            tokeninfo_url: settings.google_tokeninfo_url.clone(),
            client_id,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn provider(&self) -> OAuthProvider {
        OAuthProvider::Google
    }

    #[instrument(skip_all, fields(provider = "google"))]
    async fn verify_and_extract_profile(&self, credential: &str) -> AuthResult<ProviderProfile> {
        let request = self
            .client
            .get(self.tokeninfo_url.as_str())
            .query(&[("id_token", credential)]);
        let info: TokenInfo = fetch_json(OAuthProvider::Google, request).await?;

        if info.aud.as_deref() != Some(self.client_id.as_str()) {
            debug!("Google ID token issued for another client");
            return Err(AuthError::Unauthorized(
                "Google ID token was issued for another application".to_string(),
            ));
        }

        if !info.email_verified() {
            return Err(AuthError::Unauthorized(
                "Google account email is not verified".to_string(),
            ));
        }

        let email = info
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AuthError::BadRequest("Google profile has no email".to_string()))?;

        let mut profile = ProviderProfile::new(OAuthProvider::Google, email);
        profile.provider_id = info.sub;
        profile.name = info.name;
        Ok(profile)
    }
}
