use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scope::Scope;

/// Cumulative consent an account has given a client.
///
/// At most one record exists per (client, account) pair. The consent flow only
/// ever widens `scope`; deleting the record is the only way to shrink it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientApproval {
    pub client_id: String,
    pub account_id: String,
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientApproval {
    #[must_use]
    pub fn new(client_id: impl Into<String>, account_id: impl Into<String>, scope: Scope) -> Self {
        let now = Utc::now();
        Self {
            client_id: client_id.into(),
            account_id: account_id.into(),
            scope,
            created_at: now,
            updated_at: now,
        }
    }
}
