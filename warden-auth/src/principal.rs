//! Principals
//!
//! A principal is an authenticated subject: a human user or a machine client.
//! It owns its credentials, its lifecycle flags and a list of role
//! references. Permissions are never attached directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use warden_rbac::{RoleHolder, RoleId};

use crate::providers::OAuthProvider;

/// Kind of principal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// Human user
    #[default]
    User,
    /// Machine client
    Client,
}

/// An authenticated subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier
    pub id: Uuid,

    /// User or client
    #[serde(default)]
    pub kind: PrincipalKind,

    /// Email address, stored lowercase
    pub email: String,

    /// Unique handle
    pub username: Option<String>,

    /// Unique phone number
    pub phone: Option<String>,

    /// Given name
    pub first_name: String,

    /// Family name
    pub last_name: String,

    /// Argon2 PHC hash. Absent for provider-only principals.
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,

    /// Linked identity provider subject ids
    #[serde(default)]
    pub provider_ids: BTreeMap<OAuthProvider, String>,

    /// Role references
    #[serde(default)]
    pub roles: Vec<RoleId>,

    /// Email ownership confirmed
    pub verified: bool,

    /// Barred from authenticating
    pub banned: bool,

    /// Last password change; tokens issued earlier are stale
    pub password_changed_at: Option<DateTime<Utc>>,

    /// Consecutive failed logins since the last success or lock
    #[serde(default)]
    pub failed_login_attempts: u32,

    /// Login refused until this instant
    pub lock_until: Option<DateTime<Utc>>,

    /// Fingerprint of the one live refresh token
    #[serde(default, skip_serializing)]
    pub refresh_token: Option<String>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    /// Create an unverified principal with no credentials or roles.
    pub fn new(
        kind: PrincipalKind,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            kind,
            email: normalize_email(&email.into()),
            username: None,
            phone: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            password_hash: None,
            provider_ids: BTreeMap::new(),
            roles: Vec::new(),
            verified: false,
            banned: false,
            password_changed_at: None,
            failed_login_attempts: 0,
            lock_until: None,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the phone number.
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Set the password hash.
    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    /// Link a provider subject id.
    pub fn with_provider_id(mut self, provider: OAuthProvider, id: impl Into<String>) -> Self {
        self.provider_ids.insert(provider, id.into());
        self
    }

    /// Add a role reference.
    pub fn with_role(mut self, role: RoleId) -> Self {
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
        self
    }

    /// Mark verified.
    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    /// Full display name.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Linked subject id for a provider.
    pub fn provider_id(&self, provider: OAuthProvider) -> Option<&str> {
        self.provider_ids.get(&provider).map(String::as_str)
    }

    /// Check if the principal can log in with a password.
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Active lock expiry, if the principal is locked at `now`.
    pub fn locked_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.lock_until.filter(|until| *until > now)
    }

    /// Check whether a token issued at `issued_at_us` (microseconds since
    /// the epoch) predates the last password change.
    pub fn is_token_stale(&self, issued_at_us: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| issued_at_us < changed.timestamp_micros())
    }
}

impl RoleHolder for Principal {
    fn role_ids(&self) -> &[RoleId] {
        &self.roles
    }
}

/// Partial update applied atomically by a store.
///
/// Fields left `None` are untouched. Nested options distinguish "leave as is"
/// from "clear".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrincipalPatch {
    /// New password hash and change instant
    pub password: Option<(String, DateTime<Utc>)>,
    /// New verified flag
    pub verified: Option<bool>,
    /// New banned flag
    pub banned: Option<bool>,
    /// New failed-login counter
    pub failed_login_attempts: Option<u32>,
    /// New lock expiry, or `Some(None)` to clear
    pub lock_until: Option<Option<DateTime<Utc>>>,
    /// New refresh fingerprint, or `Some(None)` to revoke
    pub refresh_token: Option<Option<String>>,
    /// Replacement role list
    pub roles: Option<Vec<RoleId>>,
    /// Provider link to add
    pub link_provider: Option<(OAuthProvider, String)>,
}

impl PrincipalPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the password hash, stamping the change instant.
    pub fn password(mut self, hash: impl Into<String>, changed_at: DateTime<Utc>) -> Self {
        self.password = Some((hash.into(), changed_at));
        self
    }

    /// Set the verified flag.
    pub fn verified(mut self, verified: bool) -> Self {
        self.verified = Some(verified);
        self
    }

    /// Set the banned flag.
    pub fn banned(mut self, banned: bool) -> Self {
        self.banned = Some(banned);
        self
    }

    /// Set the failed-login counter.
    pub fn failed_login_attempts(mut self, attempts: u32) -> Self {
        self.failed_login_attempts = Some(attempts);
        self
    }

    /// Set or clear the lock.
    pub fn lock_until(mut self, until: Option<DateTime<Utc>>) -> Self {
        self.lock_until = Some(until);
        self
    }

    /// Zero the counter and clear any lock.
    pub fn clear_lockout(self) -> Self {
        self.failed_login_attempts(0).lock_until(None)
    }

    /// Store or clear the refresh fingerprint.
    pub fn refresh_token(mut self, fingerprint: Option<String>) -> Self {
        self.refresh_token = Some(fingerprint);
        self
    }

    /// Replace the role list.
    pub fn roles(mut self, roles: Vec<RoleId>) -> Self {
        self.roles = Some(roles);
        self
    }

    /// Link a provider subject id.
    pub fn link_provider(mut self, provider: OAuthProvider, id: impl Into<String>) -> Self {
        self.link_provider = Some((provider, id.into()));
        self
    }

    /// Check if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to a principal, bumping `updated_at`.
    pub fn apply(self, principal: &mut Principal) {
        if let Some((hash, changed_at)) = self.password {
            principal.password_hash = Some(hash);
            principal.password_changed_at = Some(changed_at);
        }
        if let Some(verified) = self.verified {
            principal.verified = verified;
        }
        if let Some(banned) = self.banned {
            principal.banned = banned;
        }
        if let Some(attempts) = self.failed_login_attempts {
            principal.failed_login_attempts = attempts;
        }
        if let Some(lock_until) = self.lock_until {
            principal.lock_until = lock_until;
        }
        if let Some(fingerprint) = self.refresh_token {
            principal.refresh_token = fingerprint;
        }
        if let Some(roles) = self.roles {
            principal.roles = roles;
        }
        if let Some((provider, id)) = self.link_provider {
            principal.provider_ids.insert(provider, id);
        }
        principal.updated_at = Utc::now();
    }
}

/// Trim and lowercase an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Split a display name into first and last name.
///
/// The first whitespace-separated word is the first name and the rest is the
/// last name. A missing name becomes `("Federated", "User")`; a single word
/// gets `"User"` as its last name.
pub fn split_display_name(name: Option<&str>) -> (String, String) {
    let name = name.map(str::trim).unwrap_or_default();
    let mut parts = name.splitn(2, char::is_whitespace);
    match (parts.next().filter(|s| !s.is_empty()), parts.next()) {
        (None, _) => ("Federated".to_string(), "User".to_string()),
        (Some(first), Some(rest)) if !rest.trim().is_empty() => {
            (first.to_string(), rest.trim().to_string())
        }
        (Some(first), _) => (first.to_string(), "User".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_principal_normalizes_email() {
        let principal = Principal::new(PrincipalKind::User, "  Ada@Example.COM ", "Ada", "Lovelace");
        assert_eq!(principal.email, "ada@example.com");
        assert!(!principal.verified);
        assert!(!principal.has_password());
        assert_eq!(principal.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_patch_apply() {
        let role = Uuid::now_v7();
        let mut principal = Principal::new(PrincipalKind::User, "a@b.c", "A", "B")
            .with_password_hash("old")
            .with_role(role);
        principal.failed_login_attempts = 2;
        principal.refresh_token = Some("fp".to_string());
        let before = principal.updated_at;

        let changed_at = Utc::now();
        PrincipalPatch::new()
            .password("new", changed_at)
            .clear_lockout()
            .refresh_token(None)
            .link_provider(OAuthProvider::GitHub, "42")
            .apply(&mut principal);

        assert_eq!(principal.password_hash.as_deref(), Some("new"));
        assert_eq!(principal.password_changed_at, Some(changed_at));
        assert_eq!(principal.failed_login_attempts, 0);
        assert!(principal.lock_until.is_none());
        assert!(principal.refresh_token.is_none());
        assert_eq!(principal.provider_id(OAuthProvider::GitHub), Some("42"));
        assert_eq!(principal.roles, vec![role]);
        assert!(principal.updated_at >= before);
    }

    #[test]
    fn test_empty_patch() {
        assert!(PrincipalPatch::new().is_empty());
        assert!(!PrincipalPatch::new().verified(true).is_empty());
    }

    #[test]
    fn test_lock_expiry() {
        let now = Utc::now();
        let mut principal = Principal::new(PrincipalKind::User, "a@b.c", "A", "B");
        assert_eq!(principal.locked_until(now), None);

        principal.lock_until = Some(now + Duration::minutes(5));
        assert!(principal.locked_until(now).is_some());

        principal.lock_until = Some(now - Duration::minutes(5));
        assert_eq!(principal.locked_until(now), None);
    }

    #[test]
    fn test_token_staleness() {
        let mut principal = Principal::new(PrincipalKind::User, "a@b.c", "A", "B");
        let issued = Utc::now();
        let issued_us = issued.timestamp_micros();
        assert!(!principal.is_token_stale(issued_us));

        // Same second, one millisecond later.
        principal.password_changed_at = Some(issued + Duration::milliseconds(1));
        assert!(principal.is_token_stale(issued_us));

        principal.password_changed_at = Some(issued);
        assert!(!principal.is_token_stale(issued_us));

        principal.password_changed_at = Some(issued - Duration::seconds(1));
        assert!(!principal.is_token_stale(issued_us));
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut principal =
            Principal::new(PrincipalKind::Client, "svc@b.c", "Svc", "Bot").with_password_hash("hash");
        principal.refresh_token = Some("fp".to_string());

        let json = serde_json::to_value(&principal).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("refresh_token").is_none());
        assert_eq!(json["kind"], "client");
    }

    #[test]
    fn test_split_display_name() {
        assert_eq!(
            split_display_name(Some("Grace Brewster Hopper")),
            ("Grace".to_string(), "Brewster Hopper".to_string())
        );
        assert_eq!(
            split_display_name(Some("Cher")),
            ("Cher".to_string(), "User".to_string())
        );
        assert_eq!(
            split_display_name(None),
            ("Federated".to_string(), "User".to_string())
        );
        assert_eq!(
            split_display_name(Some("   ")),
            ("Federated".to_string(), "User".to_string())
        );
    }
}
