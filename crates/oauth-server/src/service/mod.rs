//! Protocol core.
//!
//! [`OAuthService`] is a cheap, cloneable handle over the store and the
//! configuration. Each component borrows it for the span of one operation:
//!
//! - [`ClientRegistry`]: client lookup and scope vocabulary
//! - [`ApprovalLedger`]: per (client, account) consent
//! - [`GrantRequests`]: the authorization request state machine
//! - [`TokenIssuer`]: minting, exchange and validation of credentials

mod approvals;
mod grants;
mod registry;
pub mod sync;
mod tokens;

use std::sync::Arc;

use crate::config::Config;
use crate::store::Store;

pub use approvals::ApprovalLedger;
pub use grants::{ApprovedGrant, ConsentPrompt, Finalized, GrantRequests};
pub use registry::{ClientRegistry, ScopeDescription};
pub use tokens::{IssuedTokens, TokenGrant, TokenIssuer, TokenValidation};

/// Entry point to the OAuth core.
#[derive(Clone)]
pub struct OAuthService {
    store: Arc<dyn Store>,
    config: Arc<Config>,
}

impl OAuthService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self { store, config: Arc::new(config) }
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> ClientRegistry<'_> {
        ClientRegistry::new(self.store())
    }

    #[must_use]
    pub fn approvals(&self) -> ApprovalLedger<'_> {
        ApprovalLedger::new(self.store())
    }

    #[must_use]
    pub fn grants(&self) -> GrantRequests<'_> {
        GrantRequests::new(self)
    }

    #[must_use]
    pub fn tokens(&self) -> TokenIssuer<'_> {
        TokenIssuer::new(self)
    }
}

impl std::fmt::Debug for OAuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthService").field("issuer", &self.config.issuer).finish()
    }
}
