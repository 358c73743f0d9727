//! OAuth 2.0 authorization server.
//!
//! Issues and validates bearer credentials for third-party client
//! applications acting on behalf of user accounts.
//!
//! # Features
//!
//! - **Four grant types**: authorization code, implicit, resource owner
//!   password and client credentials, plus refresh
//! - **Consent ledger**: per (client, account) approvals that only grow
//! - **One-time codes**: concurrent redemption of a code succeeds at most once
//! - **Bearer guard**: request-scoped token context for protected routes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use oauth_server::{Config, OAuthService, server::OAuthServer, store::MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let service = OAuthService::new(Arc::new(MemoryStore::new()), config);
//!     OAuthServer::new(service).run_http(8080).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod scope;
pub mod server;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{OAuthError, StoreError};
pub use scope::Scope;
pub use service::OAuthService;
