//! Configuration for the OAuth server.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Duration;

/// Defaults.
pub mod defaults {
    /// Issuer reported by the validation endpoint.
    pub const ISSUER: &str = "oauth-server";

    /// Public base URL.
    pub const BASE_URL: &str = "http://localhost:8080";

    /// Access token lifetime (24 hours).
    pub const ACCESS_TOKEN_LIFETIME_SECS: i64 = 24 * 3600;

    /// Grant request lifetime (15 minutes).
    pub const GRANT_REQUEST_LIFETIME_SECS: i64 = 15 * 60;

    /// Scope required to list an account's approvals.
    pub const ACCOUNT_READ_SCOPE: &str = "account-read";

    /// Scope required to revoke an account's approvals.
    pub const ACCOUNT_WRITE_SCOPE: &str = "account-write";

    /// Password attempts allowed per login name and minute.
    pub const LOGIN_ATTEMPTS_PER_MINUTE: u32 = 10;
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public base URL, used to build validation and account URLs.
    pub base_url: String,

    /// Value of `iss` in token validation responses.
    pub issuer: String,

    /// Lifetime of newly minted access tokens.
    pub access_token_lifetime: Duration,

    /// Lifetime of a grant request from `/authorize` to redemption.
    pub grant_request_lifetime: Duration,

    /// Scope guarding `GET /api/approvals`.
    pub account_read_scope: String,

    /// Scope guarding `DELETE /api/approvals/{client}`.
    pub account_write_scope: String,

    /// Per-login password attempts per minute.
    pub login_attempts_per_minute: u32,

    /// JSON file with clients and accounts to load at start-up.
    pub seed_file: Option<PathBuf>,
}

impl Config {
    /// Create a configuration with default settings for the given public URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            issuer: defaults::ISSUER.to_owned(),
            access_token_lifetime: Duration::seconds(defaults::ACCESS_TOKEN_LIFETIME_SECS),
            grant_request_lifetime: Duration::seconds(defaults::GRANT_REQUEST_LIFETIME_SECS),
            account_read_scope: defaults::ACCOUNT_READ_SCOPE.to_owned(),
            account_write_scope: defaults::ACCOUNT_WRITE_SCOPE.to_owned(),
            login_attempts_per_minute: defaults::LOGIN_ATTEMPTS_PER_MINUTE,
            seed_file: None,
        }
    }

    /// Create a test configuration.
    ///
    /// The login throttle is set high enough that tests never trip it.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self { login_attempts_per_minute: 10_000, ..Self::new(base_url) }
    }

    /// Create configuration from environment variables (and `.env` if present).
    ///
    /// # Errors
    ///
    /// Returns error if a numeric variable does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let mut config =
            Self::new(std::env::var("OAUTH_BASE_URL").unwrap_or_else(|_| defaults::BASE_URL.into()));

        if let Ok(issuer) = std::env::var("OAUTH_ISSUER") {
            config.issuer = issuer;
        }
        if let Some(secs) = env_number::<i64>("OAUTH_TOKEN_LIFETIME_SECS")? {
            config.access_token_lifetime = Duration::seconds(secs);
        }
        if let Some(secs) = env_number::<i64>("OAUTH_GRANT_REQUEST_LIFETIME_SECS")? {
            config.grant_request_lifetime = Duration::seconds(secs);
        }
        if let Ok(scope) = std::env::var("OAUTH_ACCOUNT_READ_SCOPE") {
            config.account_read_scope = scope;
        }
        if let Ok(scope) = std::env::var("OAUTH_ACCOUNT_WRITE_SCOPE") {
            config.account_write_scope = scope;
        }
        if let Some(n) = env_number::<u32>("OAUTH_LOGIN_ATTEMPTS_PER_MINUTE")? {
            config.login_attempts_per_minute = n;
        }
        config.seed_file = std::env::var("OAUTH_SEED_FILE").ok().map(PathBuf::from);

        Ok(config)
    }

    /// Absolute URL for a server path.
    #[must_use]
    pub fn make_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(defaults::BASE_URL)
    }
}

fn env_number<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).with_context(|| format!("{name} must be a number")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.issuer, defaults::ISSUER);
        assert_eq!(config.access_token_lifetime, Duration::hours(24));
        assert!(config.seed_file.is_none());
    }

    #[test]
    fn test_make_url() {
        let config = Config::new("https://auth.example/");
        assert_eq!(config.make_url("/oauth/validate/abc"), "https://auth.example/oauth/validate/abc");
        assert_eq!(config.make_url("api/accounts/alice"), "https://auth.example/api/accounts/alice");
    }
}
