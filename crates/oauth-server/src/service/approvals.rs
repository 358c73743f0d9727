use crate::error::{OAuthError, OAuthResult};
use crate::models::ClientApproval;
use crate::scope::Scope;
use crate::service::ClientRegistry;
use crate::store::{ApprovalMerge, Store};

/// Persisted, monotonically growing consent per (client, account).
pub struct ApprovalLedger<'a> {
    store: &'a dyn Store,
}

impl<'a> ApprovalLedger<'a> {
    pub(crate) fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn find(
        &self,
        client_id: &str,
        account_id: &str,
    ) -> OAuthResult<Option<ClientApproval>> {
        Ok(self.store.approval(client_id, account_id).await?)
    }

    pub async fn list_for_account(&self, account_id: &str) -> OAuthResult<Vec<ClientApproval>> {
        Ok(self.store.approvals_for_account(account_id).await?)
    }

    /// Record that `account_id` approved `scope` for `client_id`.
    ///
    /// Creates the approval or widens it to the union with `scope`; never
    /// narrows it. Fails with [`OAuthError::InvalidScope`] for scope outside
    /// the global vocabulary.
    pub async fn grant(
        &self,
        client_id: &str,
        account_id: &str,
        scope: &Scope,
    ) -> OAuthResult<ClientApproval> {
        if !ClientRegistry::new(self.store).validate_scope(scope).await? {
            return Err(OAuthError::InvalidScope);
        }

        let merged = self.store.merge_approval(client_id, account_id, scope).await?;
        match &merged {
            ApprovalMerge::Created(approval) => {
                tracing::info!(client_id, account_id, scope = %approval.scope, "Created client approval");
            }
            ApprovalMerge::Widened(approval) => {
                tracing::info!(client_id, account_id, scope = %approval.scope, "Extended client approval");
            }
            ApprovalMerge::Unchanged(_) => {}
        }
        Ok(merged.into_approval())
    }

    /// Remove an approval entirely. The only way consent ever shrinks.
    pub async fn revoke(&self, client_id: &str, account_id: &str) -> OAuthResult<()> {
        if self.store.delete_approval(client_id, account_id).await? {
            tracing::info!(client_id, account_id, "Revoked client approval");
            Ok(())
        } else {
            Err(OAuthError::ApprovalNotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::service::testing::fixture;

    #[tokio::test]
    async fn test_grant_creates_then_widens() {
        let f = fixture().await;
        let ledger = f.service.approvals();

        let first = ledger.grant(&f.gin.id, &f.alice.id, &Scope::parse("read")).await.unwrap();
        assert_eq!(first.scope, Scope::parse("read"));

        let second = ledger.grant(&f.gin.id, &f.alice.id, &Scope::parse("profile")).await.unwrap();
        assert_eq!(second.scope, Scope::parse("read profile"));

        // A narrower grant never shrinks the record.
        let third = ledger.grant(&f.gin.id, &f.alice.id, &Scope::parse("read")).await.unwrap();
        assert_eq!(third.scope, Scope::parse("read profile"));

        let stored = ledger.find(&f.gin.id, &f.alice.id).await.unwrap().unwrap();
        assert_eq!(stored.scope, Scope::parse("read profile"));
    }

    #[tokio::test]
    async fn test_grant_rejects_invalid_scope() {
        let f = fixture().await;
        let ledger = f.service.approvals();

        let err = ledger.grant(&f.gin.id, &f.alice.id, &Scope::parse("root")).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidScope));
        let err = ledger.grant(&f.gin.id, &f.alice.id, &Scope::empty()).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidScope));
        assert!(ledger.find(&f.gin.id, &f.alice.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke() {
        let f = fixture().await;
        let ledger = f.service.approvals();

        ledger.grant(&f.gin.id, &f.alice.id, &Scope::parse("read")).await.unwrap();
        assert_eq!(ledger.list_for_account(&f.alice.id).await.unwrap().len(), 1);

        ledger.revoke(&f.gin.id, &f.alice.id).await.unwrap();
        assert!(ledger.find(&f.gin.id, &f.alice.id).await.unwrap().is_none());
        assert!(matches!(
            ledger.revoke(&f.gin.id, &f.alice.id).await.unwrap_err(),
            OAuthError::ApprovalNotFound
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_grants_never_lose_scope() {
        let f = fixture().await;
        f.service.approvals().grant(&f.gin.id, &f.alice.id, &Scope::parse("read")).await.unwrap();

        let grants = ["profile", "write", "admin", "profile write"].map(|names| {
            let service = f.service.clone();
            let (client, account) = (f.gin.id.clone(), f.alice.id.clone());
            tokio::spawn(async move {
                service.approvals().grant(&client, &account, &Scope::parse(names)).await
            })
        });
        for handle in grants {
            handle.await.unwrap().unwrap();
        }

        let stored = f.service.approvals().find(&f.gin.id, &f.alice.id).await.unwrap().unwrap();
        assert_eq!(stored.scope, Scope::parse("read profile write admin"));
    }

    fn arb_valid_scope() -> impl Strategy<Value = Scope> {
        proptest::sample::subsequence(vec!["read", "profile", "write", "admin"], 1..=4)
            .prop_map(|names| names.into_iter().collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn grants_accumulate_in_any_order(s1 in arb_valid_scope(), s2 in arb_valid_scope()) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let (forward, backward) = rt.block_on(async {
                let f = fixture().await;
                let ledger = f.service.approvals();
                ledger.grant(&f.gin.id, &f.alice.id, &s1).await.unwrap();
                let forward = ledger.grant(&f.gin.id, &f.alice.id, &s2).await.unwrap().scope;

                ledger.grant(&f.wb.id, &f.alice.id, &s2).await.unwrap();
                ledger.grant(&f.wb.id, &f.alice.id, &s1).await.unwrap();
                let backward = ledger.grant(&f.wb.id, &f.alice.id, &s1).await.unwrap().scope;
                (forward, backward)
            });

            prop_assert_eq!(&forward, &s1.union(&s2));
            prop_assert_eq!(&backward, &s1.union(&s2));
        }
    }
}
