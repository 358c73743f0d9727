//! Durable store contract.
//!
//! Every operation is atomic for the single record it touches. Reads return
//! `Ok(None)` for absent records; errors are reserved for infrastructure
//! failures and key conflicts. The core never retries a conflicting create.

mod memory;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{AccessToken, Account, Client, ClientApproval, GrantRequest, RefreshToken};
use crate::scope::Scope;

pub use memory::MemoryStore;

/// What [`Store::merge_approval`] did to the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalMerge {
    Created(ClientApproval),
    Widened(ClientApproval),
    /// The stored scope already covered the merged scope.
    Unchanged(ClientApproval),
}

impl ApprovalMerge {
    #[must_use]
    pub fn into_approval(self) -> ClientApproval {
        match self {
            Self::Created(a) | Self::Widened(a) | Self::Unchanged(a) => a,
        }
    }
}

/// Storage backend for every record the OAuth core reads or writes.
#[async_trait]
pub trait Store: Send + Sync {
    // Clients

    async fn client(&self, id: &str) -> StoreResult<Option<Client>>;

    /// Look a client up by its public name (`client_id` on the wire).
    async fn client_by_name(&self, name: &str) -> StoreResult<Option<Client>>;

    /// All registered clients, ordered by name.
    async fn clients(&self) -> StoreResult<Vec<Client>>;

    /// Insert or replace a client (administrative path only).
    async fn put_client(&self, client: Client) -> StoreResult<()>;

    /// Remove a client. Returns whether it existed.
    async fn delete_client(&self, id: &str) -> StoreResult<bool>;

    // Accounts

    async fn account(&self, id: &str) -> StoreResult<Option<Account>>;

    async fn account_by_login(&self, login: &str) -> StoreResult<Option<Account>>;

    async fn create_account(&self, account: Account) -> StoreResult<()>;

    // Approvals

    async fn approval(
        &self,
        client_id: &str,
        account_id: &str,
    ) -> StoreResult<Option<ClientApproval>>;

    async fn approvals_for_account(&self, account_id: &str) -> StoreResult<Vec<ClientApproval>>;

    /// Create the approval, or widen the stored scope to its union with
    /// `scope`, as one atomic step. Concurrent merges never lose names.
    async fn merge_approval(
        &self,
        client_id: &str,
        account_id: &str,
        scope: &Scope,
    ) -> StoreResult<ApprovalMerge>;

    async fn delete_approval(&self, client_id: &str, account_id: &str) -> StoreResult<bool>;

    // Grant requests

    async fn create_grant_request(&self, request: GrantRequest) -> StoreResult<()>;

    async fn grant_request(&self, token: &str) -> StoreResult<Option<GrantRequest>>;

    async fn grant_request_by_code(&self, code: &str) -> StoreResult<Option<GrantRequest>>;

    async fn update_grant_request(&self, request: GrantRequest) -> StoreResult<()>;

    /// Remove a grant request. Returns whether this call removed it, so
    /// exactly one of several concurrent callers observes `true`.
    async fn delete_grant_request(&self, token: &str) -> StoreResult<bool>;

    // Access tokens

    async fn create_access_token(&self, token: AccessToken) -> StoreResult<()>;

    /// Fetch a token as stored, expired or not. Expiry is the caller's concern.
    async fn access_token(&self, token: &str) -> StoreResult<Option<AccessToken>>;

    async fn delete_access_token(&self, token: &str) -> StoreResult<bool>;

    // Refresh tokens

    async fn create_refresh_token(&self, token: RefreshToken) -> StoreResult<()>;

    async fn refresh_token(&self, token: &str) -> StoreResult<Option<RefreshToken>>;

    async fn delete_refresh_token(&self, token: &str) -> StoreResult<bool>;
}
