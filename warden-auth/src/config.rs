//! Runtime configuration
//!
//! Configuration is read from the environment once at startup. Every value
//! has a default except the four token secrets; a missing secret surfaces as
//! a [`AuthError::Config`] when the [`crate::TokenService`] is built, naming
//! the variable that is absent.

use chrono::Duration;

use crate::claims::TokenPurpose;
use crate::error::{AuthError, AuthResult};
use crate::lockout::LockoutPolicy;
use crate::password::Argon2Settings;

/// Secret and lifetime for one token purpose.
#[derive(Clone)]
pub struct TokenSettings {
    /// HMAC secret. `None` until configured.
    pub secret: Option<String>,
    /// Lifetime of tokens signed for this purpose.
    pub expires_in: Duration,
}

impl TokenSettings {
    fn new(expires_in: Duration) -> Self {
        Self {
            secret: None,
            expires_in,
        }
    }
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Core configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// `iss` claim written into and required on every token.
    pub issuer: String,
    /// Access token settings.
    pub access: TokenSettings,
    /// Refresh token settings.
    pub refresh: TokenSettings,
    /// Email verification token settings.
    pub verify: TokenSettings,
    /// Password reset token settings.
    pub reset: TokenSettings,
    /// Failed-login lockout.
    pub lockout: LockoutPolicy,
    /// Role assigned to every new principal.
    pub default_role: String,
    /// Role the admin guard requires.
    pub admin_role: String,
    /// Shortest password accepted on register, reset and change.
    pub min_password_length: usize,
    /// Password hashing cost.
    pub argon2: Argon2Settings,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "warden".to_string(),
            access: TokenSettings::new(Duration::minutes(15)),
            refresh: TokenSettings::new(Duration::days(7)),
            verify: TokenSettings::new(Duration::days(1)),
            reset: TokenSettings::new(Duration::hours(1)),
            lockout: LockoutPolicy::default(),
            default_role: warden_rbac::DEFAULT_ROLE.to_string(),
            admin_role: warden_rbac::ADMIN_ROLE.to_string(),
            min_password_length: 6,
            argon2: Argon2Settings::default(),
        }
    }
}

impl AuthConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Unset keys keep their defaults. Malformed values are a
    /// [`AuthError::Config`] naming the key.
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(issuer) = lookup("TOKEN_ISSUER") {
            config.issuer = issuer;
        }

        for purpose in TokenPurpose::ALL {
            let prefix = purpose.env_prefix();
            let secret_key = format!("{prefix}_SECRET");
            let expires_key = format!("{prefix}_EXPIRES_IN");

            let settings = config.settings_mut(purpose);
            settings.secret = lookup(&secret_key).filter(|s| !s.is_empty());
            if let Some(raw) = lookup(&expires_key) {
                settings.expires_in = parse_duration(&raw)
                    .map_err(|e| AuthError::Config(format!("{expires_key}: {e}")))?;
            }
        }

        if let Some(raw) = lookup("MAX_FAILED_LOGIN_ATTEMPTS") {
            config.lockout.max_failed_attempts = parse_number(&raw, "MAX_FAILED_LOGIN_ATTEMPTS")?;
        }
        if let Some(raw) = lookup("ACCOUNT_LOCK_TIME_MINUTES") {
            let minutes: i64 = parse_number(&raw, "ACCOUNT_LOCK_TIME_MINUTES")?;
            config.lockout.lock_duration = Duration::try_minutes(minutes)
                .filter(|d| *d > Duration::zero())
                .ok_or_else(|| {
                    AuthError::Config(format!(
                        "ACCOUNT_LOCK_TIME_MINUTES: expected a positive number of minutes, got '{raw}'"
                    ))
                })?;
        }
        if let Some(role) = lookup("DEFAULT_ROLE_NAME") {
            config.default_role = role;
        }
        if let Some(role) = lookup("ADMIN_ROLE_NAME") {
            config.admin_role = role;
        }
        if let Some(raw) = lookup("MIN_PASSWORD_LENGTH") {
            config.min_password_length = parse_number(&raw, "MIN_PASSWORD_LENGTH")?;
        }
        if let Some(raw) = lookup("ARGON2_MEMORY_KIB") {
            config.argon2.memory_kib = parse_number(&raw, "ARGON2_MEMORY_KIB")?;
        }
        if let Some(raw) = lookup("ARGON2_ITERATIONS") {
            config.argon2.iterations = parse_number(&raw, "ARGON2_ITERATIONS")?;
        }
        if let Some(raw) = lookup("ARGON2_PARALLELISM") {
            config.argon2.parallelism = parse_number(&raw, "ARGON2_PARALLELISM")?;
        }

        Ok(config)
    }

    /// Set the secret for one purpose.
    pub fn with_secret(mut self, purpose: TokenPurpose, secret: impl Into<String>) -> Self {
        self.settings_mut(purpose).secret = Some(secret.into());
        self
    }

    /// Set the lifetime for one purpose.
    pub fn with_expiry(mut self, purpose: TokenPurpose, expires_in: Duration) -> Self {
        self.settings_mut(purpose).expires_in = expires_in;
        self
    }

    /// Settings for a purpose.
    pub fn settings(&self, purpose: TokenPurpose) -> &TokenSettings {
        match purpose {
            TokenPurpose::Access => &self.access,
            TokenPurpose::Refresh => &self.refresh,
            TokenPurpose::Verify => &self.verify,
            TokenPurpose::Reset => &self.reset,
        }
    }

    fn settings_mut(&mut self, purpose: TokenPurpose) -> &mut TokenSettings {
        match purpose {
            TokenPurpose::Access => &mut self.access,
            TokenPurpose::Refresh => &mut self.refresh,
            TokenPurpose::Verify => &mut self.verify,
            TokenPurpose::Reset => &mut self.reset,
        }
    }
}

/// Endpoints and credentials for the identity provider adapters.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Expected `aud` of Google ID tokens. Google sign-in is disabled when unset.
    pub google_client_id: Option<String>,
    /// Google tokeninfo endpoint.
    pub google_tokeninfo_url: String,
    /// GitHub REST API base.
    pub github_api_url: String,
    /// Microsoft Graph base.
    pub microsoft_graph_url: String,
    /// Per-request timeout.
    pub timeout: std::time::Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            google_client_id: None,
            google_tokeninfo_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
            github_api_url: "https://api.github.com".to_string(),
            microsoft_graph_url: "https://graph.microsoft.com/v1.0".to_string(),
            timeout: std::time::Duration::from_secs(10),
        }
    }
}

impl ProviderSettings {
    /// Load provider settings from process environment variables.
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load provider settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        settings.google_client_id = lookup("GOOGLE_CLIENT_ID").filter(|s| !s.is_empty());
        if let Some(url) = lookup("GOOGLE_TOKENINFO_URL") {
            settings.google_tokeninfo_url = url;
        }
        if let Some(url) = lookup("GITHUB_API_URL") {
            settings.github_api_url = url;
        }
        if let Some(url) = lookup("MICROSOFT_GRAPH_URL") {
            settings.microsoft_graph_url = url;
        }
        if let Some(raw) = lookup("IDENTITY_PROVIDER_TIMEOUT_SECS") {
            let secs: u64 = parse_number(&raw, "IDENTITY_PROVIDER_TIMEOUT_SECS")?;
            settings.timeout = std::time::Duration::from_secs(secs);
        }
        Ok(settings)
    }
}

/// Parse a duration written as an integer followed by `s`, `m`, `h` or `d`.
///
/// # Example
///
/// ```
/// use warden_auth::config::parse_duration;
///
/// assert_eq!(parse_duration("15m").unwrap(), chrono::Duration::minutes(15));
/// assert_eq!(parse_duration("7d").unwrap(), chrono::Duration::days(7));
/// ```
pub fn parse_duration(raw: &str) -> AuthResult<Duration> {
    let raw = raw.trim();
    let invalid = || AuthError::Config(format!("invalid duration '{raw}'"));

    let unit = raw.chars().last().ok_or_else(invalid)?;
    let amount: i64 = raw[..raw.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;
    if amount < 0 {
        return Err(invalid());
    }

    let duration = match unit {
        's' => Duration::try_seconds(amount),
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => None,
    };
    duration.ok_or_else(invalid)
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> AuthResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AuthError::Config(format!("{key}: expected a number, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.access.expires_in, Duration::minutes(15));
        assert_eq!(config.refresh.expires_in, Duration::days(7));
        assert_eq!(config.verify.expires_in, Duration::days(1));
        assert_eq!(config.reset.expires_in, Duration::hours(1));
        assert_eq!(config.lockout.max_failed_attempts, 3);
        assert_eq!(config.lockout.lock_duration, Duration::minutes(15));
        assert_eq!(config.default_role, "user");
        assert_eq!(config.admin_role, "admin");
        assert!(config.access.secret.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("ACCESS_TOKEN_SECRET", "a-secret"),
            ("ACCESS_TOKEN_EXPIRES_IN", "30s"),
            ("RESET_PASSWORD_TOKEN_EXPIRES_IN", "2h"),
            ("MAX_FAILED_LOGIN_ATTEMPTS", "5"),
            ("ACCOUNT_LOCK_TIME_MINUTES", "60"),
            ("DEFAULT_ROLE_NAME", "member"),
        ]))
        .unwrap();

        assert_eq!(config.access.secret.as_deref(), Some("a-secret"));
        assert_eq!(config.access.expires_in, Duration::seconds(30));
        assert_eq!(config.reset.expires_in, Duration::hours(2));
        assert_eq!(config.lockout.max_failed_attempts, 5);
        assert_eq!(config.lockout.lock_duration, Duration::minutes(60));
        assert_eq!(config.default_role, "member");
    }

    #[test]
    fn test_empty_secret_counts_as_unset() {
        let config = AuthConfig::from_lookup(lookup(&[("REFRESH_TOKEN_SECRET", "")])).unwrap();
        assert!(config.refresh.secret.is_none());
    }

    #[test]
    fn test_malformed_values_name_the_key() {
        let err = AuthConfig::from_lookup(lookup(&[("VERIFY_EMAIL_TOKEN_EXPIRES_IN", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("VERIFY_EMAIL_TOKEN_EXPIRES_IN"));

        let err = AuthConfig::from_lookup(lookup(&[("MAX_FAILED_LOGIN_ATTEMPTS", "three")]))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_FAILED_LOGIN_ATTEMPTS"));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10w").is_err());
        assert!(parse_duration("-5m").is_err());
        assert_eq!(parse_duration(" 90s ").unwrap(), Duration::seconds(90));
    }

    #[test]
    fn test_parse_duration_rejects_overflow() {
        for raw in ["100000000d", "9223372036854775807s", "99999999999999h"] {
            assert!(matches!(parse_duration(raw), Err(AuthError::Config(_))), "{raw}");
        }
        assert_eq!(parse_duration("365d").unwrap(), Duration::days(365));
    }

    #[test]
    fn test_lock_minutes_must_be_positive() {
        for raw in ["0", "-10", "9223372036854775807"] {
            let err = AuthConfig::from_lookup(lookup(&[("ACCOUNT_LOCK_TIME_MINUTES", raw)]))
                .unwrap_err();
            assert!(
                matches!(err, AuthError::Config(ref m) if m.contains("ACCOUNT_LOCK_TIME_MINUTES")),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AuthConfig::default().with_secret(TokenPurpose::Access, "hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_provider_settings() {
        let settings = ProviderSettings::from_lookup(lookup(&[
            ("GOOGLE_CLIENT_ID", "client-123"),
            ("GITHUB_API_URL", "http://localhost:9000"),
            ("IDENTITY_PROVIDER_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(settings.google_client_id.as_deref(), Some("client-123"));
        assert_eq!(settings.github_api_url, "http://localhost:9000");
        assert_eq!(settings.timeout, std::time::Duration::from_secs(3));
        assert_eq!(
            settings.microsoft_graph_url,
            "https://graph.microsoft.com/v1.0"
        );
    }
}
