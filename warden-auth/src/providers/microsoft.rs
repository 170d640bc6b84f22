//! Microsoft access token verification via Graph `/me`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use super::http::{build_client, endpoint, fetch_json};
use super::{IdentityProvider, OAuthProvider, ProviderProfile};
use crate::config::ProviderSettings;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    id: String,
    display_name: Option<String>,
    mail: Option<String>,
    user_principal_name: Option<String>,
}

/// Verifies Microsoft Graph access tokens.
#[derive(Debug, Clone)]
pub struct MicrosoftProvider {
    client: Client,
    graph_url: String,
}

impl MicrosoftProvider {
    /// Create the adapter.
    pub fn new(settings: &ProviderSettings) -> AuthResult<Self> {
        Ok(Self {
            client: build_client(settings.timeout)?,
            graph_url: settings.microsoft_graph_url.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for MicrosoftProvider {
    fn provider(&self) -> OAuthProvider {
        OAuthProvider::Microsoft
    }

    #[instrument(skip_all, fields(provider = "microsoft"))]
    async fn verify_and_extract_profile(&self, credential: &str) -> AuthResult<ProviderProfile> {
        let request = self
            .client
            .get(endpoint(&self.graph_url, "/me"))
            .bearer_auth(credential);
        let user: GraphUser = fetch_json(OAuthProvider::Microsoft, request).await?;

        // Work accounts without a mailbox only expose the UPN.
        let email = user
            .mail
            .filter(|m| !m.trim().is_empty())
            .or(user.user_principal_name.filter(|upn| upn.contains('@')))
            .ok_or_else(|| AuthError::BadRequest("Microsoft profile has no email".to_string()))?;

        let mut profile =
            ProviderProfile::new(OAuthProvider::Microsoft, email).with_provider_id(user.id);
        profile.name = user.display_name;
        Ok(profile)
    }
}
