//! Failed-login lockout
//!
//! Consecutive failed password logins are counted on the principal. Reaching
//! the threshold sets a lock and zeroes the counter, so the next window starts
//! fresh once the lock expires.

use chrono::{DateTime, Duration, Utc};

use crate::error::{AuthError, AuthResult};
use crate::principal::{Principal, PrincipalPatch};

/// Lockout thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures that trigger a lock. Zero disables lockout.
    pub max_failed_attempts: u32,
    /// How long a lock lasts.
    pub lock_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 3,
            lock_duration: Duration::minutes(15),
        }
    }
}

/// Result of recording one failed login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Counted; still below the threshold.
    Counted {
        /// Consecutive failures so far
        attempts: u32,
    },
    /// Threshold reached; the principal is now locked.
    Locked {
        /// Unlock instant
        until: DateTime<Utc>,
    },
}

impl LockoutPolicy {
    /// Reject a lock duration that is zero or negative.
    ///
    /// # Errors
    ///
    /// [`AuthError::Config`] when `lock_duration` is not positive.
    pub fn validate(&self) -> AuthResult<()> {
        if self.lock_duration <= Duration::zero() {
            return Err(AuthError::Config(format!(
                "Lock duration must be positive, got {}s",
                self.lock_duration.num_seconds()
            )));
        }
        Ok(())
    }

    /// Record one failure, returning the patch to persist and the outcome.
    pub fn register_failure(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> (PrincipalPatch, FailureOutcome) {
        let attempts = principal.failed_login_attempts.saturating_add(1);

        if self.max_failed_attempts > 0 && attempts >= self.max_failed_attempts {
            let until = now
                .checked_add_signed(self.lock_duration)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            let patch = PrincipalPatch::new()
                .failed_login_attempts(0)
                .lock_until(Some(until));
            return (patch, FailureOutcome::Locked { until });
        }

        (
            PrincipalPatch::new().failed_login_attempts(attempts),
            FailureOutcome::Counted { attempts },
        )
    }

    /// Patch resetting lockout state after a successful login, if any is set.
    pub fn register_success(&self, principal: &Principal) -> Option<PrincipalPatch> {
        if principal.failed_login_attempts == 0 && principal.lock_until.is_none() {
            return None;
        }
        Some(PrincipalPatch::new().clear_lockout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::PrincipalKind;

    fn principal() -> Principal {
        Principal::new(PrincipalKind::User, "a@b.c", "A", "B")
    }

    #[test]
    fn test_third_failure_locks() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let mut principal = principal();

        for expected in 1..=2 {
            let (patch, outcome) = policy.register_failure(&principal, now);
            assert_eq!(outcome, FailureOutcome::Counted { attempts: expected });
            patch.apply(&mut principal);
        }

        let (patch, outcome) = policy.register_failure(&principal, now);
        assert_eq!(
            outcome,
            FailureOutcome::Locked {
                until: now + Duration::minutes(15)
            }
        );
        patch.apply(&mut principal);
        assert_eq!(principal.failed_login_attempts, 0);
        assert!(principal.locked_until(now).is_some());
    }

    #[test]
    fn test_zero_threshold_never_locks() {
        let policy = LockoutPolicy {
            max_failed_attempts: 0,
            ..Default::default()
        };
        let mut principal = principal();
        principal.failed_login_attempts = 100;

        let (_, outcome) = policy.register_failure(&principal, Utc::now());
        assert_eq!(outcome, FailureOutcome::Counted { attempts: 101 });
    }

    #[test]
    fn test_non_positive_duration_is_rejected() {
        assert!(LockoutPolicy::default().validate().is_ok());
        for lock_duration in [Duration::zero(), Duration::minutes(-5)] {
            let policy = LockoutPolicy {
                lock_duration,
                ..Default::default()
            };
            assert!(matches!(policy.validate(), Err(AuthError::Config(_))));
        }
    }

    #[test]
    fn test_huge_duration_saturates() {
        let policy = LockoutPolicy {
            max_failed_attempts: 1,
            lock_duration: Duration::MAX,
        };
        let (_, outcome) = policy.register_failure(&principal(), Utc::now());
        assert_eq!(
            outcome,
            FailureOutcome::Locked {
                until: DateTime::<Utc>::MAX_UTC
            }
        );
    }

    #[test]
    fn test_success_clears_only_when_needed() {
        let policy = LockoutPolicy::default();
        let mut principal = principal();
        assert!(policy.register_success(&principal).is_none());

        principal.failed_login_attempts = 1;
        let patch = policy.register_success(&principal).unwrap();
        patch.apply(&mut principal);
        assert_eq!(principal.failed_login_attempts, 0);
    }
}
