//! Token claims
//!
//! All four token kinds share one claim layout. Access tokens carry the
//! principal's role ids and permission names and no `purpose`; refresh,
//! verify and reset tokens carry a `purpose` tag and only the subject.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_rbac::ResolvedAccess;

/// The kind of token.
///
/// Each purpose is signed with its own secret, so a token minted for one
/// purpose never verifies under another.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Short-lived bearer token presented on requests
    Access,
    /// Long-lived token exchanged for a fresh pair
    Refresh,
    /// Email verification link token
    Verify,
    /// Password reset link token
    Reset,
}

impl TokenPurpose {
    /// All purposes.
    pub const ALL: [TokenPurpose; 4] = [
        TokenPurpose::Access,
        TokenPurpose::Refresh,
        TokenPurpose::Verify,
        TokenPurpose::Reset,
    ];

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
            TokenPurpose::Verify => "verify",
            TokenPurpose::Reset => "reset",
        }
    }

    /// Prefix of the environment variables configuring this purpose.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            TokenPurpose::Access => "ACCESS_TOKEN",
            TokenPurpose::Refresh => "REFRESH_TOKEN",
            TokenPurpose::Verify => "VERIFY_EMAIL_TOKEN",
            TokenPurpose::Reset => "RESET_PASSWORD_TOKEN",
        }
    }

    /// The `purpose` claim written for this purpose. Access tokens carry none.
    pub(crate) fn claim(self) -> Option<Self> {
        match self {
            TokenPurpose::Access => None,
            other => Some(other),
        }
    }
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller asks to have signed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Subject: the principal id.
    pub sub: String,
    /// Role ids (access tokens only).
    #[serde(default)]
    pub roles: Vec<String>,
    /// Permission names (access tokens only).
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl TokenPayload {
    /// Payload naming only a subject.
    pub fn subject(principal_id: Uuid) -> Self {
        Self {
            sub: principal_id.to_string(),
            ..Default::default()
        }
    }

    /// Access token payload built from resolved roles and permissions.
    pub fn with_access(principal_id: Uuid, access: &ResolvedAccess) -> Self {
        Self {
            sub: principal_id.to_string(),
            roles: access.role_id_strings(),
            permissions: access.permission_names(),
        }
    }
}

/// Decoded token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (principal id)
    pub sub: String,

    /// Purpose tag; absent on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<TokenPurpose>,

    /// Role ids
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    /// Permission names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Issued at, in microseconds since the Unix epoch
    #[serde(default)]
    pub iat_us: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Token id
    pub jti: String,
}

impl TokenClaims {
    /// Build claims for a payload, stamped now.
    pub fn new(
        purpose: TokenPurpose,
        payload: &TokenPayload,
        issuer: impl Into<String>,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: payload.sub.clone(),
            purpose: purpose.claim(),
            roles: payload.roles.clone(),
            permissions: payload.permissions.clone(),
            iss: issuer.into(),
            iat: now.timestamp(),
            iat_us: now.timestamp_micros(),
            exp: now
                .checked_add_signed(expires_in)
                .map_or(i64::MAX, |exp| exp.timestamp()),
            jti: Uuid::now_v7().to_string(),
        }
    }

    /// The purpose these claims were signed for.
    pub fn purpose(&self) -> TokenPurpose {
        self.purpose.unwrap_or(TokenPurpose::Access)
    }

    /// Subject as a principal id.
    pub fn principal_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    /// The payload portion of these claims.
    pub fn payload(&self) -> TokenPayload {
        TokenPayload {
            sub: self.sub.clone(),
            roles: self.roles.clone(),
            permissions: self.permissions.clone(),
        }
    }

    /// Issued-at in microseconds, falling back to `iat` for tokens
    /// without `iat_us`.
    pub fn issued_at_micros(&self) -> i64 {
        if self.iat_us > 0 {
            self.iat_us
        } else {
            self.iat.saturating_mul(1_000_000)
        }
    }

    /// Get the issued-at time.
    pub fn issued_at(&self) -> DateTime<Utc> {
        let micros = self.issued_at_micros();
        DateTime::from_timestamp(
            micros.div_euclid(1_000_000),
            (micros.rem_euclid(1_000_000) * 1_000) as u32,
        )
        .unwrap_or_default()
    }

    /// Get the expiration time.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }

    /// Check if expired.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Check if the token was issued strictly before `instant`, to the
    /// microsecond.
    pub fn issued_before(&self, instant: DateTime<Utc>) -> bool {
        self.issued_at_micros() < instant.timestamp_micros()
    }

    /// Check if the claims carry a role id.
    pub fn has_role(&self, role_id: &str) -> bool {
        self.roles.iter().any(|r| r == role_id)
    }

    /// Check if the claims carry a permission.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}
