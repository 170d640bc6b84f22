//! Credential lifecycle
//!
//! Registration, password login with lockout, refresh rotation, password
//! reset and change, email verification and account deletion.
//!
//! Requests that take only an email address (forgot password, resend
//! verification) always answer with the same acknowledgement so callers
//! cannot probe which addresses are registered.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use warden_rbac::RoleStore;

use crate::claims::{TokenPayload, TokenPurpose};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::issuer::TokenIssuer;
use crate::lockout::{FailureOutcome, LockoutPolicy};
use crate::mail::Mailer;
use crate::password::{check_password_policy, Argon2Hasher};
use crate::principal::{normalize_email, split_display_name, Principal, PrincipalKind, PrincipalPatch};
use crate::store::PrincipalStore;
use crate::tokens::{refresh_fingerprint, TokenPair, TokenService};

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for this email, a password reset link has been sent.";
const RESEND_VERIFICATION_MESSAGE: &str =
    "If an unverified account exists for this email, a verification link has been sent.";

/// Registration input.
#[derive(Clone, Deserialize)]
pub struct Registration {
    /// User or client
    #[serde(default)]
    pub kind: PrincipalKind,
    /// Email address
    pub email: String,
    /// Plaintext password
    pub password: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Optional unique handle
    #[serde(default)]
    pub username: Option<String>,
    /// Optional unique phone number
    #[serde(default)]
    pub phone: Option<String>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("kind", &self.kind)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("username", &self.username)
            .field("phone", &self.phone)
            .finish()
    }
}

impl Registration {
    /// Registration of a user from an email, display name and password.
    pub fn new(email: impl Into<String>, display_name: &str, password: impl Into<String>) -> Self {
        let (first_name, last_name) = split_display_name(Some(display_name));
        Self {
            kind: PrincipalKind::User,
            email: email.into(),
            password: password.into(),
            first_name,
            last_name,
            username: None,
            phone: None,
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

    /// Register a machine client instead of a user.
    pub fn as_client(mut self) -> Self {
        self.kind = PrincipalKind::Client;
        self
    }
}

/// Result of a registration.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    /// The created principal
    pub principal: Principal,
    /// Whether the verification email went out
    pub verification_email_sent: bool,
    /// Message for the caller
    pub message: String,
}

/// Generic success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// Message for the caller
    pub message: String,
}

impl Acknowledgement {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Password-based credential operations.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn PrincipalStore>,
    roles: Arc<dyn RoleStore>,
    issuer: TokenIssuer,
    hasher: Argon2Hasher,
    mailer: Arc<dyn Mailer>,
    lockout: LockoutPolicy,
    default_role: String,
    min_password_length: usize,
}

impl std::fmt::Debug for CredentialService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialService")
            .field("lockout", &self.lockout)
            .field("default_role", &self.default_role)
            .finish_non_exhaustive()
    }
}

impl CredentialService {
    /// Create the service.
    pub fn new(
        config: &AuthConfig,
        store: Arc<dyn PrincipalStore>,
        roles: Arc<dyn RoleStore>,
        issuer: TokenIssuer,
        mailer: Arc<dyn Mailer>,
    ) -> AuthResult<Self> {
        config.lockout.validate()?;
        Ok(Self {
            store,
            roles,
            issuer,
            hasher: Argon2Hasher::new(&config.argon2)?,
            mailer,
            lockout: config.lockout,
            default_role: config.default_role.clone(),
            min_password_length: config.min_password_length,
        })
    }

    fn tokens(&self) -> &TokenService {
        self.issuer.tokens()
    }

    /// Register a principal.
    ///
    /// The principal is created unverified with the default role, then a
    /// verification email is sent. A failed email does not undo the
    /// registration; the outcome reports it instead.
    ///
    /// # Errors
    ///
    /// * [`AuthError::Conflict`] if the email, username or phone is taken,
    ///   including when a concurrent registration wins the race
    /// * [`AuthError::BadRequest`] for an invalid email or a short password
    /// * [`AuthError::Config`] if the default role has not been seeded
    #[instrument(skip_all, fields(email = %input.email))]
    pub async fn register(&self, input: Registration) -> AuthResult<RegistrationOutcome> {
        let email = normalize_email(&input.email);
        if !is_plausible_email(&email) {
            return Err(AuthError::BadRequest("Invalid email address".to_string()));
        }
        check_password_policy(&input.password, self.min_password_length)?;

        let (by_email, by_username, by_phone) = tokio::try_join!(
            self.store.find_by_email(&email),
            async {
                match input.username.as_deref() {
                    Some(username) => self.store.find_by_username(username).await,
                    None => Ok(None),
                }
            },
            async {
                match input.phone.as_deref() {
                    Some(phone) => self.store.find_by_phone(phone).await,
                    None => Ok(None),
                }
            },
        )?;
        if by_email.is_some() {
            return Err(AuthError::Conflict("Email is already registered".to_string()));
        }
        if by_username.is_some() {
            return Err(AuthError::Conflict("Username is already taken".to_string()));
        }
        if by_phone.is_some() {
            return Err(AuthError::Conflict("Phone number is already registered".to_string()));
        }

        let default_role = self
            .roles
            .find_by_name(&self.default_role)
            .await?
            .ok_or_else(|| {
                AuthError::Config(format!("Default role '{}' has not been seeded", self.default_role))
            })?;

        let hash = self.hasher.hash(&input.password).await?;
        let mut principal = Principal::new(input.kind, &email, input.first_name, input.last_name)
            .with_password_hash(hash)
            .with_role(default_role.id);
        principal.username = input.username;
        principal.phone = input.phone;

        // The unique indexes are the final arbiter when two registrations race.
        let principal = self.store.create(principal).await?;
        info!(principal_id = %principal.id, kind = ?principal.kind, "Principal registered");

        let verification_email_sent = self.send_verification(&principal).await;
        let message = if verification_email_sent {
            "Registration successful. Check your email to verify your account."
        } else {
            "Registration successful, but the verification email could not be sent. Request a new one to verify your account."
        };

        Ok(RegistrationOutcome {
            principal,
            verification_email_sent,
            message: message.to_string(),
        })
    }

    /// Log in with email and password.
    ///
    /// A wrong password counts toward the lockout threshold; the attempt
    /// that reaches it is answered with [`AuthError::AccountLocked`]. A
    /// successful login resets the counter.
    ///
    /// # Errors
    ///
    /// * [`AuthError::Unauthorized`] for an unknown email or wrong password,
    ///   with the same message for both
    /// * [`AuthError::AccountLocked`] while a lock is active
    /// * [`AuthError::Forbidden`] if the principal is banned or unverified
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        let email = normalize_email(email);
        let principal = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or_else(AuthError::invalid_credentials)?;

        let now = Utc::now();
        if let Some(until) = principal.locked_until(now) {
            debug!(principal_id = %principal.id, "Login attempted while locked");
            return Err(AuthError::AccountLocked { until });
        }

        let Some(stored_hash) = principal.password_hash.as_deref() else {
            return Err(AuthError::invalid_credentials());
        };

        if !self.hasher.verify(password, stored_hash).await? {
            let (patch, outcome) = self.lockout.register_failure(&principal, now);
            self.store.update_by_id(principal.id, patch).await?;
            return Err(match outcome {
                FailureOutcome::Locked { until } => {
                    warn!(principal_id = %principal.id, %until, "Account locked after failed logins");
                    AuthError::AccountLocked { until }
                }
                FailureOutcome::Counted { attempts } => {
                    debug!(principal_id = %principal.id, attempts, "Failed login");
                    AuthError::invalid_credentials()
                }
            });
        }

        if principal.banned {
            return Err(AuthError::Forbidden("Account is banned".to_string()));
        }
        if !principal.verified {
            return Err(AuthError::Forbidden("Email address is not verified".to_string()));
        }

        if let Some(patch) = self.lockout.register_success(&principal) {
            self.store.update_by_id(principal.id, patch).await?;
        }

        let pair = self.issuer.issue_for(&principal).await?;
        info!(principal_id = %principal.id, "Login succeeded");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// Only the most recently issued refresh token is accepted; presenting
    /// an older one fails even if it has not expired.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self.tokens().verify(TokenPurpose::Refresh, refresh_token)?;
        let principal_id = claims
            .principal_id()
            .ok_or_else(|| AuthError::InvalidToken("Subject is not a principal id".to_string()))?;

        let principal = self
            .store
            .find_by_id(principal_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("Principal no longer exists".to_string()))?;

        if principal.banned {
            return Err(AuthError::Forbidden("Account is banned".to_string()));
        }
        if !principal.verified {
            return Err(AuthError::Forbidden("Email address is not verified".to_string()));
        }
        if principal.is_token_stale(claims.issued_at_micros()) {
            return Err(AuthError::Unauthorized(
                "Password changed since this token was issued".to_string(),
            ));
        }
        if principal.refresh_token.as_deref() != Some(refresh_fingerprint(refresh_token).as_str()) {
            warn!(principal_id = %principal.id, "Revoked refresh token presented");
            return Err(AuthError::Unauthorized("Refresh token has been revoked".to_string()));
        }

        self.issuer.issue_for(&principal).await
    }

    /// Revoke the principal's refresh token.
    #[instrument(skip(self))]
    pub async fn logout(&self, principal_id: Uuid) -> AuthResult<()> {
        self.store
            .update_by_id(principal_id, PrincipalPatch::new().refresh_token(None))
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("Principal {principal_id}")))?;
        info!(%principal_id, "Logged out");
        Ok(())
    }

    /// Start a password reset.
    ///
    /// Always acknowledges. Unknown addresses and delivery failures are
    /// logged and otherwise invisible to the caller.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Acknowledgement {
        if let Err(e) = self.send_reset(&normalize_email(email)).await {
            warn!(error = %e, "Password reset request failed");
        }
        Acknowledgement::new(FORGOT_PASSWORD_MESSAGE)
    }

    async fn send_reset(&self, email: &str) -> AuthResult<()> {
        let Some(principal) = self.store.find_by_email(email).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(());
        };
        let token = self
            .tokens()
            .sign(TokenPurpose::Reset, &TokenPayload::subject(principal.id))?;
        self.mailer
            .send_password_reset_email(&principal.email, &token)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        info!(principal_id = %principal.id, "Password reset email sent");
        Ok(())
    }

    /// Complete a password reset.
    ///
    /// Replaces the hash, revokes the refresh token and clears any lockout.
    /// A reset token is single-use: it is refused once the password has
    /// changed at or after the instant it was issued.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<Acknowledgement> {
        let claims = self.tokens().verify(TokenPurpose::Reset, token)?;
        let principal_id = claims
            .principal_id()
            .ok_or_else(|| AuthError::InvalidToken("Subject is not a principal id".to_string()))?;

        let principal = self
            .store
            .find_by_id(principal_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("Invalid or expired reset token".to_string()))?;
        let consumed = principal
            .password_changed_at
            .is_some_and(|changed| claims.issued_at_micros() <= changed.timestamp_micros());
        if consumed {
            return Err(AuthError::Unauthorized(
                "Reset token has already been used".to_string(),
            ));
        }
        check_password_policy(new_password, self.min_password_length)?;

        let hash = self.hasher.hash(new_password).await?;
        let patch = PrincipalPatch::new()
            .password(hash, Utc::now())
            .refresh_token(None)
            .clear_lockout();
        self.store
            .update_by_id(principal.id, patch)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("Principal {}", principal.id)))?;

        info!(principal_id = %principal.id, "Password reset");
        Ok(Acknowledgement::new("Password has been reset."))
    }

    /// Change a password, given the current one.
    ///
    /// Revokes the refresh token; access tokens issued before the change
    /// stop authenticating.
    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        principal_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<Acknowledgement> {
        let principal = self
            .store
            .find_by_id(principal_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("Principal {principal_id}")))?;

        let Some(stored_hash) = principal.password_hash.as_deref() else {
            return Err(AuthError::BadRequest(
                "Account has no password; use password reset to set one".to_string(),
            ));
        };
        if !self.hasher.verify(current_password, stored_hash).await? {
            return Err(AuthError::invalid_credentials());
        }
        check_password_policy(new_password, self.min_password_length)?;

        let hash = self.hasher.hash(new_password).await?;
        self.store
            .update_by_id(
                principal_id,
                PrincipalPatch::new().password(hash, Utc::now()).refresh_token(None),
            )
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("Principal {principal_id}")))?;

        info!(%principal_id, "Password changed");
        Ok(Acknowledgement::new("Password has been changed."))
    }

    /// Confirm email ownership. Verifying twice succeeds both times.
    #[instrument(skip_all)]
    pub async fn verify_email(&self, token: &str) -> AuthResult<Acknowledgement> {
        let claims = self.tokens().verify(TokenPurpose::Verify, token)?;
        let principal_id = claims
            .principal_id()
            .ok_or_else(|| AuthError::InvalidToken("Subject is not a principal id".to_string()))?;

        let principal = self
            .store
            .find_by_id(principal_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("Principal {principal_id}")))?;
        if principal.verified {
            return Ok(Acknowledgement::new("Email is already verified."));
        }

        self.store
            .update_by_id(principal_id, PrincipalPatch::new().verified(true))
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("Principal {principal_id}")))?;
        info!(%principal_id, "Email verified");
        Ok(Acknowledgement::new("Email has been verified."))
    }

    /// Send a fresh verification email.
    ///
    /// Always acknowledges. Nothing is sent for unknown or already verified
    /// addresses.
    #[instrument(skip(self))]
    pub async fn resend_verification(&self, email: &str) -> Acknowledgement {
        match self.store.find_by_email(&normalize_email(email)).await {
            Ok(Some(principal)) if !principal.verified => {
                self.send_verification(&principal).await;
            }
            Ok(_) => debug!("Verification resend skipped"),
            Err(e) => warn!(error = %e, "Verification resend lookup failed"),
        }
        Acknowledgement::new(RESEND_VERIFICATION_MESSAGE)
    }

    /// Delete a principal.
    #[instrument(skip(self))]
    pub async fn delete_account(&self, principal_id: Uuid) -> AuthResult<()> {
        if !self.store.delete_by_id(principal_id).await? {
            return Err(AuthError::NotFound(format!("Principal {principal_id}")));
        }
        info!(%principal_id, "Account deleted");
        Ok(())
    }

    async fn send_verification(&self, principal: &Principal) -> bool {
        let token = match self
            .tokens()
            .sign(TokenPurpose::Verify, &TokenPayload::subject(principal.id))
        {
            Ok(token) => token,
            Err(e) => {
                warn!(principal_id = %principal.id, error = %e, "Verification token signing failed");
                return false;
            }
        };
        match self.mailer.send_verification_email(&principal.email, &token).await {
            Ok(()) => true,
            Err(e) => {
                warn!(principal_id = %principal.id, error = %e, "Verification email failed");
                false
            }
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}
