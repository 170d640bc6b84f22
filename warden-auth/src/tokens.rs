//! Token signing and verification
//!
//! HS256 JWTs with one secret per [`TokenPurpose`]. Verification checks the
//! signature, expiry and issuer, then that the token was minted for the
//! purpose the caller expects.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::claims::{TokenClaims, TokenPayload, TokenPurpose};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// Longest lifetime, in days, accepted for any token purpose.
pub const MAX_TOKEN_LIFETIME_DAYS: i64 = 365;

struct PurposeKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expires_in: Duration,
}

impl PurposeKeys {
    fn from_config(config: &AuthConfig, purpose: TokenPurpose) -> AuthResult<Self> {
        let settings = config.settings(purpose);
        let secret = settings.secret.as_deref().ok_or_else(|| {
            AuthError::Config(format!(
                "{}_SECRET is not set; {} tokens cannot be signed",
                purpose.env_prefix(),
                purpose
            ))
        })?;
        let expires_in = settings.expires_in;
        let longest = Duration::days(MAX_TOKEN_LIFETIME_DAYS);
        if expires_in <= Duration::zero() || expires_in > longest {
            return Err(AuthError::Config(format!(
                "{}_EXPIRES_IN must be between 1s and {}d, got {}s",
                purpose.env_prefix(),
                MAX_TOKEN_LIFETIME_DAYS,
                expires_in.num_seconds()
            )));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expires_in,
        })
    }
}

/// Signs and verifies purpose-tagged tokens.
pub struct TokenService {
    issuer: String,
    access: PurposeKeys,
    refresh: PurposeKeys,
    verify: PurposeKeys,
    reset: PurposeKeys,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

impl TokenService {
    /// Create a token service from configuration.
    ///
    /// # Errors
    ///
    /// [`AuthError::Config`] naming the first purpose whose secret is unset
    /// or whose lifetime is not positive or exceeds [`MAX_TOKEN_LIFETIME_DAYS`].
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        Ok(Self {
            issuer: config.issuer.clone(),
            access: PurposeKeys::from_config(config, TokenPurpose::Access)?,
            refresh: PurposeKeys::from_config(config, TokenPurpose::Refresh)?,
            verify: PurposeKeys::from_config(config, TokenPurpose::Verify)?,
            reset: PurposeKeys::from_config(config, TokenPurpose::Reset)?,
        })
    }

    fn keys(&self, purpose: TokenPurpose) -> &PurposeKeys {
        match purpose {
            TokenPurpose::Access => &self.access,
            TokenPurpose::Refresh => &self.refresh,
            TokenPurpose::Verify => &self.verify,
            TokenPurpose::Reset => &self.reset,
        }
    }

    /// Lifetime of tokens signed for `purpose`.
    pub fn expires_in(&self, purpose: TokenPurpose) -> Duration {
        self.keys(purpose).expires_in
    }

    /// Issuer written into every token.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign a payload for a purpose.
    ///
    /// # Arguments
    ///
    /// * `purpose` - Selects the secret, the lifetime and the `purpose` claim
    /// * `payload` - Subject plus, for access tokens, roles and permissions
    ///
    /// # Returns
    ///
    /// Encoded JWT token string
    pub fn sign(&self, purpose: TokenPurpose, payload: &TokenPayload) -> AuthResult<String> {
        let claims = TokenClaims::new(purpose, payload, &self.issuer, self.expires_in(purpose));
        self.encode_claims(purpose, &claims)
    }

    /// Encode prepared claims with the secret for `purpose`.
    pub fn encode_claims(&self, purpose: TokenPurpose, claims: &TokenClaims) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.keys(purpose).encoding)
            .map_err(|e| AuthError::Internal(format!("Token encoding failed: {}", e)))
    }

    /// Verify a token for the expected purpose.
    ///
    /// # Errors
    ///
    /// * [`AuthError::ExpiredToken`] if `exp` has passed
    /// * [`AuthError::InvalidToken`] for a malformed token, a bad signature
    ///   or a foreign issuer
    /// * [`AuthError::WrongPurpose`] if the token decodes but was minted for
    ///   another purpose
    pub fn verify(&self, purpose: TokenPurpose, token: &str) -> AuthResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        let claims = decode::<TokenClaims>(token, &self.keys(purpose).decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidToken => AuthError::InvalidToken("Malformed token".to_string()),
                ErrorKind::InvalidSignature => {
                    AuthError::InvalidToken("Invalid signature".to_string())
                }
                ErrorKind::InvalidIssuer => AuthError::InvalidToken("Invalid issuer".to_string()),
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        let found = claims.purpose();
        if found != purpose {
            return Err(AuthError::WrongPurpose {
                expected: purpose,
                found,
            });
        }
        Ok(claims)
    }
}

/// Access and refresh tokens returned on login, refresh and federated login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access token
    pub access_token: String,

    /// Refresh token
    pub refresh_token: String,

    /// Token type (always "Bearer")
    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl TokenPair {
    /// Create a new token pair.
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

/// Fingerprint stored in place of a refresh token.
///
/// SHA-256 of the token, base64url without padding. Comparing fingerprints
/// detects replay of a rotated token without keeping the token itself.
pub fn refresh_fingerprint(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}
