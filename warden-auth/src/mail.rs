//! Outbound mail contract
//!
//! Delivery is a collaborator. The core only hands over the recipient and the
//! signed token; link building and templates belong to the mailer.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Mail delivery failures.
#[derive(Debug, Error)]
pub enum MailError {
    /// The transport rejected or dropped the message
    #[error("Mail transport failed: {0}")]
    Transport(String),

    /// The recipient address was refused
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Sends account emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the email-verification message carrying `token`.
    async fn send_verification_email(&self, email: &str, token: &str) -> Result<(), MailError>;

    /// Send the password-reset message carrying `token`.
    async fn send_password_reset_email(&self, email: &str, token: &str) -> Result<(), MailError>;
}

/// Mailer that only logs. Tokens are never written to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_email(&self, email: &str, _token: &str) -> Result<(), MailError> {
        info!(recipient = %email, "Verification email queued");
        Ok(())
    }

    async fn send_password_reset_email(&self, email: &str, _token: &str) -> Result<(), MailError> {
        info!(recipient = %email, "Password reset email queued");
        Ok(())
    }
}
