use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scope::Scope;

/// A registered OAuth client application.
///
/// Clients are populated by administrative configuration (see
/// [`crate::service::sync`]) and are read-only to the protocol core.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Internal identifier; never shown on the wire.
    pub id: String,
    /// Public client identifier (`client_id` on the wire).
    pub name: String,
    /// Shared secret for confidential clients.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub redirect_uris: BTreeSet<String>,
    /// Scope names this client contributes to the global vocabulary, with
    /// human readable descriptions.
    #[serde(default)]
    pub scope_provided: BTreeMap<String, String>,
    /// Scope that never needs explicit account consent.
    #[serde(default)]
    pub scope_whitelist: Scope,
}

impl Client {
    /// The provided scope catalog as a set of names.
    #[must_use]
    pub fn scope_provided(&self) -> Scope {
        self.scope_provided.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.contains(uri)
    }

    /// Check a presented secret.
    ///
    /// Public clients (no secret) accept an absent or empty secret only.
    #[must_use]
    pub fn verify_secret(&self, presented: Option<&str>) -> bool {
        match (self.secret.as_deref(), presented) {
            (Some(secret), Some(presented)) => secret == presented,
            (None, None | Some("")) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("redirect_uris", &self.redirect_uris)
            .field("scope_whitelist", &self.scope_whitelist)
            .finish()
    }
}
