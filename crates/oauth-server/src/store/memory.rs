//! In-memory store.
//!
//! Each record family sits behind its own `RwLock`, so single-record operations
//! are atomic. Nothing is swept in the background; expired records linger until
//! deleted.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ApprovalMerge, Store};
use crate::error::{StoreError, StoreResult};
use crate::models::{AccessToken, Account, Client, ClientApproval, GrantRequest, RefreshToken};
use crate::scope::Scope;

type ApprovalKey = (String, String);

/// Process-local [`Store`] implementation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    clients: Arc<RwLock<HashMap<String, Client>>>,
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    approvals: Arc<RwLock<HashMap<ApprovalKey, ClientApproval>>>,
    grant_requests: Arc<RwLock<HashMap<String, GrantRequest>>>,
    access_tokens: Arc<RwLock<HashMap<String, AccessToken>>>,
    refresh_tokens: Arc<RwLock<HashMap<String, RefreshToken>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish()
    }
}

fn approval_key(client_id: &str, account_id: &str) -> ApprovalKey {
    (client_id.to_owned(), account_id.to_owned())
}

#[async_trait]
impl Store for MemoryStore {
    async fn client(&self, id: &str) -> StoreResult<Option<Client>> {
        Ok(self.clients.read().await.get(id).cloned())
    }

    async fn client_by_name(&self, name: &str) -> StoreResult<Option<Client>> {
        let clients = self.clients.read().await;
        Ok(clients.values().find(|c| c.name == name).cloned())
    }

    async fn clients(&self) -> StoreResult<Vec<Client>> {
        let mut all: Vec<Client> = self.clients.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn put_client(&self, client: Client) -> StoreResult<()> {
        let mut clients = self.clients.write().await;
        if clients.values().any(|c| c.name == client.name && c.id != client.id) {
            return Err(StoreError::conflict("client name", client.name));
        }
        clients.insert(client.id.clone(), client);
        Ok(())
    }

    async fn delete_client(&self, id: &str) -> StoreResult<bool> {
        Ok(self.clients.write().await.remove(id).is_some())
    }

    async fn account(&self, id: &str) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().await.get(id).cloned())
    }

    async fn account_by_login(&self, login: &str) -> StoreResult<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.login == login).cloned())
    }

    async fn create_account(&self, account: Account) -> StoreResult<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.id) {
            return Err(StoreError::conflict("account", account.id));
        }
        if accounts.values().any(|a| a.login == account.login) {
            return Err(StoreError::conflict("account login", account.login));
        }
        accounts.insert(account.id.clone(), account);
        Ok(())
    }

    async fn approval(
        &self,
        client_id: &str,
        account_id: &str,
    ) -> StoreResult<Option<ClientApproval>> {
        Ok(self.approvals.read().await.get(&approval_key(client_id, account_id)).cloned())
    }

    async fn approvals_for_account(&self, account_id: &str) -> StoreResult<Vec<ClientApproval>> {
        let approvals = self.approvals.read().await;
        let mut found: Vec<ClientApproval> =
            approvals.values().filter(|a| a.account_id == account_id).cloned().collect();
        found.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        Ok(found)
    }

    async fn merge_approval(
        &self,
        client_id: &str,
        account_id: &str,
        scope: &Scope,
    ) -> StoreResult<ApprovalMerge> {
        let mut approvals = self.approvals.write().await;
        match approvals.entry(approval_key(client_id, account_id)) {
            Entry::Occupied(mut entry) => {
                let approval = entry.get_mut();
                if approval.scope.is_superset(scope) {
                    return Ok(ApprovalMerge::Unchanged(approval.clone()));
                }
                approval.scope = approval.scope.union(scope);
                approval.updated_at = Utc::now();
                Ok(ApprovalMerge::Widened(approval.clone()))
            }
            Entry::Vacant(entry) => {
                let approval = ClientApproval::new(client_id, account_id, scope.clone());
                Ok(ApprovalMerge::Created(entry.insert(approval).clone()))
            }
        }
    }

    async fn delete_approval(&self, client_id: &str, account_id: &str) -> StoreResult<bool> {
        Ok(self.approvals.write().await.remove(&approval_key(client_id, account_id)).is_some())
    }

    async fn create_grant_request(&self, request: GrantRequest) -> StoreResult<()> {
        let mut requests = self.grant_requests.write().await;
        if requests.contains_key(&request.token) {
            return Err(StoreError::conflict("grant request", request.token));
        }
        requests.insert(request.token.clone(), request);
        Ok(())
    }

    async fn grant_request(&self, token: &str) -> StoreResult<Option<GrantRequest>> {
        Ok(self.grant_requests.read().await.get(token).cloned())
    }

    async fn grant_request_by_code(&self, code: &str) -> StoreResult<Option<GrantRequest>> {
        let requests = self.grant_requests.read().await;
        Ok(requests.values().find(|r| r.code.as_deref() == Some(code)).cloned())
    }

    async fn update_grant_request(&self, request: GrantRequest) -> StoreResult<()> {
        let mut requests = self.grant_requests.write().await;
        match requests.get_mut(&request.token) {
            Some(existing) => {
                *existing = request;
                Ok(())
            }
            None => Err(StoreError::missing("grant request", request.token)),
        }
    }

    async fn delete_grant_request(&self, token: &str) -> StoreResult<bool> {
        Ok(self.grant_requests.write().await.remove(token).is_some())
    }

    async fn create_access_token(&self, token: AccessToken) -> StoreResult<()> {
        let mut tokens = self.access_tokens.write().await;
        if tokens.contains_key(&token.token) {
            return Err(StoreError::conflict("access token", token.token));
        }
        tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn access_token(&self, token: &str) -> StoreResult<Option<AccessToken>> {
        Ok(self.access_tokens.read().await.get(token).cloned())
    }

    async fn delete_access_token(&self, token: &str) -> StoreResult<bool> {
        Ok(self.access_tokens.write().await.remove(token).is_some())
    }

    async fn create_refresh_token(&self, token: RefreshToken) -> StoreResult<()> {
        let mut tokens = self.refresh_tokens.write().await;
        if tokens.contains_key(&token.token) {
            return Err(StoreError::conflict("refresh token", token.token));
        }
        tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn refresh_token(&self, token: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(self.refresh_tokens.read().await.get(token).cloned())
    }

    async fn delete_refresh_token(&self, token: &str) -> StoreResult<bool> {
        Ok(self.refresh_tokens.write().await.remove(token).is_some())
    }
}
