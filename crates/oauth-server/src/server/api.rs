//! Account-facing API behind the bearer guard.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::bearer::{MaybeOAuthInfo, OAuthInfo};
use super::routes::HttpState;
use crate::error::{OAuthError, OAuthResult};
use crate::scope::Scope;

/// One approval as shown to its account.
#[derive(Debug, Serialize)]
pub struct ApprovalView {
    /// Public client name.
    pub client: String,
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `GET /api/approvals`
pub async fn list_approvals(
    State(state): State<Arc<HttpState>>,
    info: OAuthInfo,
) -> OAuthResult<Json<Vec<ApprovalView>>> {
    let service = &state.service;
    let registry = service.registry();
    let mut views = Vec::new();

    for approval in service.approvals().list_for_account(info.account_id()?).await? {
        // Approvals of since-removed clients are not shown.
        let Some(client) = registry.lookup_by_id(&approval.client_id).await? else {
            continue;
        };
        views.push(ApprovalView {
            client: client.name,
            scope: approval.scope,
            created_at: approval.created_at,
            updated_at: approval.updated_at,
        });
    }
    views.sort_by(|a, b| a.client.cmp(&b.client));
    Ok(Json(views))
}

/// `DELETE /api/approvals/{client}`
pub async fn revoke_approval(
    State(state): State<Arc<HttpState>>,
    Path(client_name): Path<String>,
    info: OAuthInfo,
) -> OAuthResult<StatusCode> {
    let account_id = info.account_id()?;
    let client = state
        .service
        .registry()
        .lookup_by_name(&client_name)
        .await?
        .ok_or(OAuthError::UnknownClient(client_name))?;
    state.service.approvals().revoke(&client.id, account_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
}

/// `GET /api/whoami`
///
/// Answers anonymous callers too.
pub async fn whoami(
    State(state): State<Arc<HttpState>>,
    MaybeOAuthInfo(info): MaybeOAuthInfo,
) -> OAuthResult<Json<WhoAmI>> {
    let Some(info) = info else {
        return Ok(Json(WhoAmI { authenticated: false, login: None, scope: None }));
    };
    let login = match info.token.account_id.as_deref() {
        Some(id) => state.service.store().account(id).await?.map(|a| a.login),
        None => None,
    };
    Ok(Json(WhoAmI { authenticated: true, login, scope: Some(info.token.scope) }))
}
