use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scope::Scope;

/// Generate an opaque credential string.
///
/// Two v4 UUIDs drawn from the OS CSPRNG, 64 hex characters in total.
#[must_use]
pub fn random_token() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}

/// A bearer credential with a hard expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub expires: DateTime<Utc>,
    pub scope: Scope,
    pub client_id: String,
    /// Absent for tokens minted by the client credentials grant.
    pub account_id: Option<String>,
}

impl AccessToken {
    /// A token read at or after its expiry must be treated as nonexistent.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }
}

/// A long-lived credential for minting new access tokens.
///
/// Never expires; it is valid until deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub token: String,
    pub client_id: String,
    pub account_id: String,
    pub scope: Scope,
}
