//! Shared helpers for the HTTP integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use tower::ServiceExt;

use oauth_server::models::{Account, Client};
use oauth_server::server::routes::create_router;
use oauth_server::store::{MemoryStore, Store};
use oauth_server::{Config, OAuthService, Scope};

pub const BASE_URL: &str = "https://auth.example";
pub const REDIRECT: &str = "https://gin.example/callback";
pub const PASSWORD: &str = "testtest";

fn client(name: &str, provided: &[&str], whitelist: &str) -> Client {
    Client {
        id: format!("{name}-id"),
        name: name.to_owned(),
        secret: Some(format!("{name}-secret")),
        redirect_uris: BTreeSet::from([REDIRECT.to_owned()]),
        scope_provided: provided
            .iter()
            .map(|s| ((*s).to_owned(), format!("Description of {s}")))
            .collect::<BTreeMap<_, _>>(),
        scope_whitelist: Scope::parse(whitelist),
    }
}

pub struct TestApp {
    pub router: Router,
    pub service: OAuthService,
    pub alice: Account,
}

/// Clients `gin` (whitelist: read, account-read, account-write) and `wb`
/// (whitelist: write), one account `alice`.
pub async fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    store
        .put_client(client(
            "gin",
            &["read", "profile", "account-read", "account-write"],
            "read account-read account-write",
        ))
        .await
        .unwrap();
    store.put_client(client("wb", &["write", "admin"], "write")).await.unwrap();
    let alice = Account::new("alice", PASSWORD);
    store.create_account(alice.clone()).await.unwrap();

    let service = OAuthService::new(store, Config::for_testing(BASE_URL));
    TestApp { router: create_router(service.clone()), service, alice }
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn get_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn post_form(uri: &str, params: &[(&str, &str)]) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(serde_urlencoded::to_string(params).unwrap()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

/// The `Location` header resolved against the server base URL.
pub fn location(response: &Response<Body>) -> url::Url {
    let raw = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    url::Url::parse(BASE_URL).unwrap().join(raw).unwrap()
}

pub fn query(url: &url::Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

pub fn authorize_uri(response_type: &str, scope: &str, state: &str) -> String {
    let params = [
        ("response_type", response_type),
        ("client_id", "gin"),
        ("redirect_uri", REDIRECT),
        ("state", state),
        ("scope", scope),
    ];
    format!("/oauth/authorize?{}", serde_urlencoded::to_string(params).unwrap())
}

/// Start an authorization and return the grant request id.
pub async fn start_authorization(app: &TestApp, response_type: &str, scope: &str) -> String {
    let response = send(&app.router, get(&authorize_uri(response_type, scope, "xyz"))).await;
    assert_eq!(response.status(), 302);
    query(&location(&response))["request_id"].clone()
}

/// Log in as alice; returns the redirect target.
pub async fn login(app: &TestApp, request_id: &str) -> url::Url {
    let response = send(
        &app.router,
        post_form(
            "/oauth/login",
            &[("request_id", request_id), ("login", "alice"), ("password", PASSWORD)],
        ),
    )
    .await;
    assert_eq!(response.status(), 302);
    location(&response)
}

/// Run the code flow for whitelisted scope and return the exchange code.
pub async fn issue_code(app: &TestApp, scope: &str) -> String {
    let request_id = start_authorization(app, "code", scope).await;
    let target = login(app, &request_id).await;
    assert!(target.as_str().starts_with(REDIRECT), "{target}");
    query(&target)["code"].clone()
}

pub async fn exchange(app: &TestApp, params: &[(&str, &str)]) -> Response<Body> {
    send(&app.router, post_form("/oauth/token", params)).await
}
