//! Administrative client sync and start-up seeding.
//!
//! Runs outside the protocol path: the configured client list is the source
//! of truth and the registry is reconciled against it.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::error::StoreResult;
use crate::models::{Account, Client};
use crate::store::Store;

/// Outcome of a [`sync_clients`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub upserted: usize,
    pub removed: usize,
}

/// An account entry in the seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedAccount {
    pub login: String,
    pub password: String,
}

/// Contents of the JSON seed file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub accounts: Vec<SeedAccount>,
}

/// Read and parse a seed file.
pub fn load_seed(path: &Path) -> anyhow::Result<Seed> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid seed file {}", path.display()))
}

/// Upsert every configured client and delete registered clients missing from
/// `clients`. Running it twice with the same input changes nothing more.
pub async fn sync_clients(store: &dyn Store, clients: Vec<Client>) -> StoreResult<SyncReport> {
    let wanted: HashSet<String> = clients.iter().map(|c| c.id.clone()).collect();
    let mut report = SyncReport::default();

    for existing in store.clients().await? {
        if !wanted.contains(&existing.id) && store.delete_client(&existing.id).await? {
            tracing::info!(client = %existing.name, "Removed client");
            report.removed += 1;
        }
    }

    for client in clients {
        if store.client(&client.id).await?.as_ref() == Some(&client) {
            continue;
        }
        tracing::info!(client = %client.name, "Upserted client");
        store.put_client(client).await?;
        report.upserted += 1;
    }

    Ok(report)
}

/// Apply a seed: sync clients, then create accounts whose login is unknown.
pub async fn apply_seed(store: &dyn Store, seed: Seed) -> StoreResult<SyncReport> {
    let report = sync_clients(store, seed.clients).await?;
    for entry in seed.accounts {
        if store.account_by_login(&entry.login).await?.is_some() {
            continue;
        }
        store.create_account(Account::new(entry.login.clone(), &entry.password)).await?;
        tracing::info!(login = %entry.login, "Seeded account");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::client;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let store = MemoryStore::new();
        let clients = vec![client("gin", &["read"], "read"), client("wb", &["write"], "")];

        let report = sync_clients(&store, clients.clone()).await.unwrap();
        assert_eq!(report, SyncReport { upserted: 2, removed: 0 });

        let report = sync_clients(&store, clients).await.unwrap();
        assert_eq!(report, SyncReport::default());
    }

    #[tokio::test]
    async fn test_sync_updates_and_removes() {
        let store = MemoryStore::new();
        sync_clients(&store, vec![client("gin", &["read"], "read"), client("wb", &["write"], "")])
            .await
            .unwrap();

        let mut gin = client("gin", &["read", "profile"], "read");
        gin.redirect_uris.insert("https://gin.example/other".into());
        let report = sync_clients(&store, vec![gin.clone()]).await.unwrap();
        assert_eq!(report, SyncReport { upserted: 1, removed: 1 });

        assert_eq!(store.client_by_name("gin").await.unwrap(), Some(gin));
        assert!(store.client_by_name("wb").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_seed_from_json() {
        let seed: Seed = serde_json::from_value(serde_json::json!({
            "clients": [{
                "id": "c1",
                "name": "gin",
                "secret": "s3cret",
                "redirect_uris": ["https://gin.example/callback"],
                "scope_provided": {"read": "Read things"},
                "scope_whitelist": "read"
            }],
            "accounts": [{"login": "alice", "password": "testtest"}]
        }))
        .unwrap();

        let store = MemoryStore::new();
        apply_seed(&store, seed.clone()).await.unwrap();
        let alice = store.account_by_login("alice").await.unwrap().unwrap();
        assert!(alice.verify_password("testtest"));

        // Re-seeding keeps the existing account.
        apply_seed(&store, seed).await.unwrap();
        assert_eq!(store.account_by_login("alice").await.unwrap().unwrap().id, alice.id);

        let gin = store.client_by_name("gin").await.unwrap().unwrap();
        assert!(gin.verify_secret(Some("s3cret")));
        assert!(gin.scope_whitelist.contains("read"));
    }
}
