//! Records owned by the durable store.
//!
//! The core holds these only for the duration of a single operation; the store
//! is the authoritative copy.

mod account;
mod approval;
mod client;
mod grant;
mod token;

pub use account::Account;
pub use approval::ClientApproval;
pub use client::Client;
pub use grant::{GrantRequest, GrantState, ResponseType};
pub use token::{AccessToken, RefreshToken, random_token};
