//! Error types for authentication operations
//!
//! Every fallible operation in this crate returns [`AuthError`]. Each variant
//! maps to an HTTP status and a stable error code so hosts can render
//! responses without matching on messages.

use chrono::{DateTime, Utc};
use thiserror::Error;
use warden_rbac::{RbacError, StoreError};

use crate::claims::TokenPurpose;

/// Authentication error types.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A uniqueness rule was violated (email, username, phone, provider id).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Credentials were wrong or missing. Messages never reveal which part.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Token is malformed, has a bad signature, or names no principal.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token signature is valid but `exp` has passed.
    #[error("Token has expired")]
    ExpiredToken,

    /// Token was signed for a different purpose.
    #[error("Wrong token purpose: expected {expected}, found {found}")]
    WrongPurpose {
        /// Purpose the caller asked to verify.
        expected: TokenPurpose,
        /// Purpose carried in the token.
        found: TokenPurpose,
    },

    /// Principal is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Too many failed logins. Carries the unlock instant.
    #[error("Account is locked until {until}")]
    AccountLocked {
        /// When the lock expires.
        until: DateTime<Utc>,
    },

    /// Addressed record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input or upstream payload was unusable.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Check if this error should be logged at error level.
    ///
    /// Rejections such as bad credentials are expected traffic.
    pub fn is_server_error(&self) -> bool {
        matches!(self, AuthError::Internal(_) | AuthError::Config(_))
    }

    /// Check if this error means the caller is not authenticated.
    pub fn is_authentication_failure(&self) -> bool {
        self.status_code() == 401
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Unauthorized(_)
            | AuthError::InvalidToken(_)
            | AuthError::ExpiredToken
            | AuthError::WrongPurpose { .. } => 401,

            AuthError::Forbidden(_) | AuthError::AccountLocked { .. } => 403,
            AuthError::Conflict(_) => 409,
            AuthError::NotFound(_) => 404,
            AuthError::BadRequest(_) => 400,

            AuthError::Config(_) | AuthError::Internal(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Conflict(_) => "CONFLICT",
            AuthError::Unauthorized(_) => "UNAUTHORIZED",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::ExpiredToken => "TOKEN_EXPIRED",
            AuthError::WrongPurpose { .. } => "WRONG_TOKEN_PURPOSE",
            AuthError::Forbidden(_) => "FORBIDDEN",
            AuthError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::BadRequest(_) => "BAD_REQUEST",
            AuthError::Config(_) => "CONFIG_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn invalid_credentials() -> Self {
        AuthError::Unauthorized("Invalid credentials".to_string())
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(field) => AuthError::Conflict(format!("{field} already in use")),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<RbacError> for AuthError {
    fn from(err: RbacError) -> Self {
        match err {
            RbacError::Store(store) => AuthError::from(store),
            RbacError::Conflict { .. } => AuthError::Conflict(err.to_string()),
            RbacError::NotFound { .. } => AuthError::NotFound(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::invalid_credentials().status_code(), 401);
        assert_eq!(AuthError::ExpiredToken.status_code(), 401);
        assert_eq!(AuthError::Forbidden("banned".into()).status_code(), 403);
        assert_eq!(AuthError::Conflict("email".into()).status_code(), 409);
        assert_eq!(
            AuthError::AccountLocked { until: Utc::now() }.status_code(),
            403
        );
        assert!(AuthError::Config("missing".into()).is_server_error());
        assert!(!AuthError::BadRequest("x".into()).is_server_error());
    }

    #[test]
    fn test_wrong_purpose_is_authentication_failure() {
        let err = AuthError::WrongPurpose {
            expected: TokenPurpose::Refresh,
            found: TokenPurpose::Access,
        };
        assert!(err.is_authentication_failure());
        assert_eq!(err.error_code(), "WRONG_TOKEN_PURPOSE");
        assert_eq!(
            err.to_string(),
            "Wrong token purpose: expected refresh, found access"
        );
    }

    #[test]
    fn test_store_error_mapping() {
        let conflict: AuthError = StoreError::DuplicateKey("email".into()).into();
        assert!(matches!(conflict, AuthError::Conflict(ref m) if m == "email already in use"));

        let internal: AuthError = StoreError::Unavailable("db down".into()).into();
        assert!(internal.is_server_error());
    }
}
