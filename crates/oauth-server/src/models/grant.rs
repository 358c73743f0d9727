use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::scope::Scope;

/// The `response_type` of an authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Authorization code flow.
    Code,
    /// Implicit flow.
    Token,
}

impl ResponseType {
    /// Parse the wire value; anything but `code` or `token` is rejected.
    #[must_use]
    pub fn parse(wire: &str) -> Option<Self> {
        match wire {
            "code" => Some(Self::Code),
            "token" => Some(Self::Token),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Token => "token",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a grant request stands. Derived from the record, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantState {
    /// Created, no account attached yet.
    Pending,
    /// An account authenticated against the request.
    Authenticated,
    /// An exchange code was issued and awaits redemption.
    CodeIssued,
}

/// One in-flight authorization attempt.
///
/// Addressed externally only by `token`, which is unrelated to any access or
/// refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    pub token: String,
    pub grant_type: ResponseType,
    pub client_id: String,
    /// Redirect URI fixed at creation; finalization always redirects here.
    pub redirect_uri: String,
    pub scope: Scope,
    /// Opaque caller state, echoed back untouched.
    pub state: String,
    pub account_id: Option<String>,
    /// One-time exchange code (code flow only).
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GrantRequest {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.account_id.is_some()
    }

    #[must_use]
    pub fn state(&self) -> GrantState {
        match (&self.account_id, &self.code) {
            (_, Some(_)) => GrantState::CodeIssued,
            (Some(_), None) => GrantState::Authenticated,
            (None, None) => GrantState::Pending,
        }
    }

    /// True once the request has outlived `lifetime`.
    #[must_use]
    pub fn is_expired(&self, lifetime: Duration, now: DateTime<Utc>) -> bool {
        now >= self.created_at + lifetime
    }
}
