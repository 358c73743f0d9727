//! Per-login password attempt limiting.

use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::error::{OAuthError, OAuthResult};

/// Tracked logins before stale entries are swept.
const PRUNE_THRESHOLD: usize = 4096;

/// Keyed rate limiter over login names.
///
/// Shared by the login form and the password grant. A limit of zero
/// disables throttling. Logins are caller-supplied, so entries whose
/// window has fully replenished are dropped once the map grows past
/// [`PRUNE_THRESHOLD`].
pub struct LoginThrottle {
    limiter: Option<DefaultKeyedRateLimiter<String>>,
}

impl LoginThrottle {
    #[must_use]
    pub fn per_minute(attempts: u32) -> Self {
        Self::with_quota(NonZeroU32::new(attempts).map(Quota::per_minute))
    }

    fn with_quota(quota: Option<Quota>) -> Self {
        Self { limiter: quota.map(RateLimiter::keyed) }
    }

    /// Forget logins that are back to a full allowance.
    pub fn prune(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Count one attempt for `login`.
    ///
    /// Over-limit attempts fail exactly like a wrong password.
    pub fn check(&self, login: &str) -> OAuthResult<()> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        let allowed = limiter.check_key(&login.to_owned()).is_ok();
        if limiter.len() > PRUNE_THRESHOLD {
            self.prune();
        }
        if !allowed {
            tracing::warn!(login, "Login attempts throttled");
            return Err(OAuthError::InvalidCredentials);
        }
        Ok(())
    }
}

impl std::fmt::Debug for LoginThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginThrottle").field("enabled", &self.limiter.is_some()).finish()
    }
}
