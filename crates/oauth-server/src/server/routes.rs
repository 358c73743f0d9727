//! HTTP routing.

use std::sync::Arc;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{delete, get, post},
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use super::api;
use super::bearer::{BearerGuard, bearer_context};
use super::oauth::handlers;
use super::throttle::LoginThrottle;
use crate::scope::Scope;
use crate::service::OAuthService;

/// Upper bound on requests processed at once.
const MAX_CONCURRENT_REQUESTS: usize = 512;

/// Shared state for HTTP handlers.
#[derive(Debug)]
pub struct HttpState {
    pub service: OAuthService,
    pub throttle: LoginThrottle,
}

/// Create the HTTP router.
pub fn create_router(service: OAuthService) -> Router {
    let config = service.config();
    let read_scope = Scope::parse(&config.account_read_scope);
    let write_scope = Scope::parse(&config.account_write_scope);

    let state = Arc::new(HttpState {
        throttle: LoginThrottle::per_minute(config.login_attempts_per_minute),
        service: service.clone(),
    });

    let read_api = Router::new().route("/api/approvals", get(api::list_approvals)).route_layer(
        from_fn_with_state(BearerGuard::require(service.clone(), read_scope.clone()), bearer_context),
    );
    let write_api = Router::new()
        .route("/api/approvals/{client}", delete(api::revoke_approval))
        .route_layer(from_fn_with_state(
            BearerGuard::require(service.clone(), write_scope),
            bearer_context,
        ));
    let open_api = Router::new().route("/api/whoami", get(api::whoami)).route_layer(
        from_fn_with_state(BearerGuard::permissive(service, read_scope), bearer_context),
    );

    Router::new()
        .route("/health", get(health_check))
        .route("/oauth/authorize", get(handlers::handle_authorize))
        .route("/oauth/login_page", get(handlers::handle_login_page))
        .route("/oauth/login", post(handlers::handle_login))
        .route("/oauth/approve_page", get(handlers::handle_approve_page))
        .route("/oauth/approve", post(handlers::handle_approve))
        .route("/oauth/token", post(handlers::handle_token))
        .route("/oauth/revoke", post(handlers::handle_revoke))
        .route("/oauth/validate/{token}", get(handlers::handle_validate))
        .merge(read_api)
        .merge(write_api)
        .merge(open_api)
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "oauth-server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
