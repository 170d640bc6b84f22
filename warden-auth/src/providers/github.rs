//! GitHub access token verification via the REST API.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::http::{build_client, endpoint, fetch_json};
use super::{IdentityProvider, OAuthProvider, ProviderProfile};
use crate::config::ProviderSettings;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// Verifies GitHub OAuth access tokens.
#[derive(Debug, Clone)]
pub struct GitHubProvider {
    client: Client,
    api_url: String,
}

impl GitHubProvider {
    /// Create the adapter.
    pub fn new(settings: &ProviderSettings) -> AuthResult<Self> {
        Ok(Self {
            client: build_client(settings.timeout)?,
            api_url: settings.github_api_url.clone(),
        })
    }

    fn get(&self, path: &str, token: &str) -> RequestBuilder {
        self.client
            .get(endpoint(&self.api_url, path))
            .bearer_auth(token)
            .header(ACCEPT, "application/vnd.github+json")
    }

    /// The primary verified address, or else any verified one.
    async fn verified_email(&self, token: &str) -> AuthResult<Option<String>> {
        let emails: Vec<GitHubEmail> =
            fetch_json(OAuthProvider::GitHub, self.get("/user/emails", token)).await?;

        let chosen = emails
            .iter()
            .find(|e| e.primary && e.verified)
            .or_else(|| emails.iter().find(|e| e.verified))
            .map(|e| e.email.clone());
        Ok(chosen)
    }
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
    fn provider(&self) -> OAuthProvider {
        OAuthProvider::GitHub
    }

    #[instrument(skip_all, fields(provider = "github"))]
    async fn verify_and_extract_profile(&self, credential: &str) -> AuthResult<ProviderProfile> {
        let user: GitHubUser = fetch_json(OAuthProvider::GitHub, self.get("/user", credential)).await?;

        let email = match user.email.filter(|e| !e.trim().is_empty()) {
            Some(email) => email,
            None => {
                debug!(login = %user.login, "Public email hidden; listing addresses");
                self.verified_email(credential).await?.ok_or_else(|| {
                    AuthError::BadRequest("GitHub account has no verified email".to_string())
                })?
            }
        };

        let name = user.name.filter(|n| !n.trim().is_empty()).unwrap_or(user.login);
        Ok(ProviderProfile::new(OAuthProvider::GitHub, email)
            .with_provider_id(user.id.to_string())
            .with_name(name))
    }
}
