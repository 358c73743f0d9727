use std::collections::BTreeMap;

use crate::error::{OAuthError, OAuthResult};
use crate::models::Client;
use crate::scope::Scope;
use crate::store::Store;

/// Human descriptions for a set of scope names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeDescription {
    pub descriptions: BTreeMap<String, String>,
    /// False if some requested name has no description anywhere.
    pub complete: bool,
}

/// Read access to registered clients and the shared scope vocabulary.
pub struct ClientRegistry<'a> {
    store: &'a dyn Store,
}

impl<'a> ClientRegistry<'a> {
    pub(crate) fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn lookup_by_id(&self, id: &str) -> OAuthResult<Option<Client>> {
        Ok(self.store.client(id).await?)
    }

    pub async fn lookup_by_name(&self, name: &str) -> OAuthResult<Option<Client>> {
        Ok(self.store.client_by_name(name).await?)
    }

    /// Authenticate a client by public name and secret.
    ///
    /// Unknown name and wrong secret fail identically.
    pub async fn authenticate(&self, name: &str, secret: Option<&str>) -> OAuthResult<Client> {
        match self.lookup_by_name(name).await? {
            Some(client) if client.verify_secret(secret) => Ok(client),
            _ => Err(OAuthError::InvalidClient),
        }
    }

    /// Union of every client's provided scope, with descriptions.
    async fn catalog(&self) -> OAuthResult<BTreeMap<String, String>> {
        let mut catalog = BTreeMap::new();
        for client in self.store.clients().await? {
            catalog.extend(client.scope_provided);
        }
        Ok(catalog)
    }

    /// A scope is valid if it is non-empty and every name is provided by some
    /// registered client. The vocabulary is global, not per client.
    pub async fn validate_scope(&self, scope: &Scope) -> OAuthResult<bool> {
        if scope.is_empty() {
            return Ok(false);
        }
        let catalog = self.catalog().await?;
        Ok(scope.iter().all(|name| catalog.contains_key(name)))
    }

    pub async fn describe_scope(&self, scope: &Scope) -> OAuthResult<ScopeDescription> {
        if scope.is_empty() {
            return Ok(ScopeDescription::default());
        }
        let catalog = self.catalog().await?;
        let descriptions: BTreeMap<String, String> = scope
            .iter()
            .filter_map(|name| catalog.get(name).map(|d| (name.to_owned(), d.clone())))
            .collect();
        let complete = descriptions.len() == scope.len();
        Ok(ScopeDescription { descriptions, complete })
    }
}
