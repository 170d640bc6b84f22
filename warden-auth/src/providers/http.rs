//! Shared HTTP plumbing for provider adapters.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use super::OAuthProvider;
use crate::error::{AuthError, AuthResult};

const USER_AGENT: &str = concat!("warden-auth/", env!("CARGO_PKG_VERSION"));

pub(super) fn build_client(timeout: Duration) -> AuthResult<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AuthError::Config(format!("Failed to build HTTP client: {e}")))
}

pub(super) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Send a request and decode the JSON body.
///
/// 400, 401 and 403 mean the provider rejected the credential. Any other
/// non-success status, a transport failure or a timeout is internal. A body
/// that does not decode is a bad request.
pub(super) async fn fetch_json<T>(provider: OAuthProvider, request: RequestBuilder) -> AuthResult<T>
where
    T: DeserializeOwned,
{
    let response = request.send().await.map_err(|e| {
        warn!(provider = %provider, error = %e, "Identity provider unreachable");
        AuthError::Internal(format!("{} request failed: {}", provider.display_name(), e))
    })?;

    let status = response.status();
    if matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    ) {
        debug!(provider = %provider, status = status.as_u16(), "Credential rejected");
        return Err(AuthError::Unauthorized(format!(
            "{} rejected the credential",
            provider.display_name()
        )));
    }

    if !status.is_success() {
        warn!(provider = %provider, status = status.as_u16(), "Identity provider error");
        return Err(AuthError::Internal(format!(
            "{} returned HTTP {}",
            provider.display_name(),
            status.as_u16()
        )));
    }

    response.json::<T>().await.map_err(|e| {
        AuthError::BadRequest(format!(
            "Malformed {} profile: {}",
            provider.display_name(),
            e
        ))
    })
}
