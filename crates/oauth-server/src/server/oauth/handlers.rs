//! OAuth 2.0 endpoint handlers.
//!
//! Implements:
//! - RFC 6749 §4.1 / §4.2: authorization endpoint (code and implicit)
//! - RFC 6749 §4.1.3, §4.3, §4.4, §6: token endpoint
//! - RFC 7009: token revocation
//! - Token validation for resource servers
//!
//! Every form and query is decoded into an explicit struct, then checked
//! field by field before the core sees it.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Form, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Basic};
use serde::{Deserialize, Serialize};

use super::pages;
use crate::error::{OAuthError, OAuthResult};
use crate::models::Client;
use crate::scope::Scope;
use crate::server::routes::HttpState;
use crate::service::{Finalized, IssuedTokens, TokenGrant, TokenValidation};

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// `302 Found` with caching disabled.
fn redirect(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(location) {
        headers.insert(header::LOCATION, value);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn login_page_location(request_id: &str, failed: bool) -> String {
    if failed {
        format!("/oauth/login_page?request_id={request_id}&failed=true")
    } else {
        format!("/oauth/login_page?request_id={request_id}")
    }
}

fn approve_page_location(request_id: &str) -> String {
    format!("/oauth/approve_page?request_id={request_id}")
}

fn finish(finalized: &Finalized) -> OAuthResult<Response> {
    Ok(redirect(finalized.redirect_url()?.as_str()))
}

fn required(value: Option<String>, name: &'static str) -> OAuthResult<String> {
    value.filter(|v| !v.is_empty()).ok_or(OAuthError::MissingParameter(name))
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
}

/// `GET /oauth/authorize`
///
/// Create a grant request and send the user agent to the login step.
pub async fn handle_authorize(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<AuthorizeQuery>,
) -> OAuthResult<Response> {
    let client_name = required(query.client_id, "client_id")?;
    let service = &state.service;
    let client = service
        .registry()
        .lookup_by_name(&client_name)
        .await?
        .ok_or(OAuthError::UnknownClient(client_name))?;

    let request = service
        .grants()
        .create(
            &client,
            &required(query.response_type, "response_type")?,
            &required(query.redirect_uri, "redirect_uri")?,
            query.state.as_deref().unwrap_or_default(),
            Scope::parse(query.scope.as_deref().unwrap_or_default()),
        )
        .await?;

    Ok(redirect(&login_page_location(&request.token, false)))
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RequestIdQuery {
    pub request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginPageQuery {
    pub request_id: Option<String>,
    /// Set after a rejected login attempt.
    #[serde(default)]
    pub failed: bool,
}

/// `GET /oauth/login_page`
pub async fn handle_login_page(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<LoginPageQuery>,
) -> OAuthResult<Html<String>> {
    let request_id = required(query.request_id, "request_id")?;
    let request = state.service.grants().get(&request_id).await?;
    let error = query.failed.then(|| OAuthError::InvalidCredentials.to_string());
    Ok(Html(pages::render_login_page(&request.token, error.as_deref())))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub request_id: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
}

/// `POST /oauth/login`
///
/// Authenticate the grant request, then finalize it or ask for consent.
/// Failed logins go back to the login page.
pub async fn handle_login(
    State(state): State<Arc<HttpState>>,
    Form(form): Form<LoginForm>,
) -> OAuthResult<Response> {
    let grants = state.service.grants();
    let request = grants.get(&required(form.request_id, "request_id")?).await?;
    let request_id = request.token.clone();
    let login = form.login.unwrap_or_default();
    let password = form.password.unwrap_or_default();

    let authenticated = match state.throttle.check(&login) {
        Ok(()) => grants.login(request, &login, &password).await,
        Err(e) => Err(e),
    };
    let request = match authenticated {
        Ok(request) => request,
        Err(OAuthError::InvalidCredentials) => {
            return Ok(redirect(&login_page_location(&request_id, true)));
        }
        Err(e) => return Err(e),
    };

    match grants.approve(request).await {
        Ok(approved) => finish(&grants.finalize(approved).await?),
        Err(OAuthError::ApprovalRequired) => Ok(redirect(&approve_page_location(&request_id))),
        Err(e) => Err(e),
    }
}

// ─── Consent ─────────────────────────────────────────────────────────────────

/// `GET /oauth/approve_page`
pub async fn handle_approve_page(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<RequestIdQuery>,
) -> OAuthResult<Html<String>> {
    let grants = state.service.grants();
    let request = grants.get(&required(query.request_id, "request_id")?).await?;
    let prompt = grants.consent_prompt(&request).await?;
    Ok(Html(pages::render_approve_page(&prompt)))
}

/// The consent form. `scope` may repeat and each value may hold several
/// space-separated names.
#[derive(Debug, Default)]
pub struct ApproveForm {
    pub request_id: Option<String>,
    pub scope: Scope,
}

impl ApproveForm {
    #[must_use]
    pub fn decode(body: &[u8]) -> Self {
        let mut form = Self::default();
        let mut names = Vec::new();
        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "request_id" => form.request_id = Some(value.into_owned()),
                "scope" => names.extend(value.split_whitespace().map(str::to_owned)),
                _ => {}
            }
        }
        form.scope = names.into_iter().collect();
        form
    }
}

/// `POST /oauth/approve`
pub async fn handle_approve(State(state): State<Arc<HttpState>>, body: Bytes) -> OAuthResult<Response> {
    let form = ApproveForm::decode(&body);
    let grants = state.service.grants();
    let request = grants.get(&required(form.request_id, "request_id")?).await?;
    let request_id = request.token.clone();

    match grants.consent(request, &form.scope).await {
        Ok(finalized) => finish(&finalized),
        Err(OAuthError::ScopeNotApproved) => Ok(redirect(&approve_page_location(&request_id))),
        Err(e) => Err(e),
    }
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub code: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Only read by the revocation endpoint.
    pub token: Option<String>,
}

impl TokenForm {
    /// Decode the grant-specific fields.
    pub fn grant(&self) -> OAuthResult<TokenGrant> {
        let scope = || Scope::parse(self.scope.as_deref().unwrap_or_default());
        let grant_type = required(self.grant_type.clone(), "grant_type")?;
        match grant_type.as_str() {
            "authorization_code" => {
                Ok(TokenGrant::AuthorizationCode { code: required(self.code.clone(), "code")? })
            }
            "refresh_token" => Ok(TokenGrant::RefreshToken {
                refresh_token: required(self.refresh_token.clone(), "refresh_token")?,
            }),
            "password" => Ok(TokenGrant::Password {
                username: required(self.username.clone(), "username")?,
                password: self.password.clone().unwrap_or_default(),
                scope: scope(),
            }),
            "client_credentials" => Ok(TokenGrant::ClientCredentials { scope: scope() }),
            _ => Err(OAuthError::UnsupportedGrantType(grant_type)),
        }
    }
}

/// Authenticate the calling client from HTTP Basic, falling back to the
/// `client_id` / `client_secret` form fields.
async fn authenticate_client(
    state: &HttpState,
    headers: &HeaderMap,
    form: &TokenForm,
) -> OAuthResult<Client> {
    let registry = state.service.registry();
    if let Some(basic) = headers.typed_get::<Authorization<Basic>>() {
        return registry.authenticate(basic.username(), Some(basic.password())).await;
    }
    let name = form.client_id.as_deref().ok_or(OAuthError::InvalidClient)?;
    registry.authenticate(name, form.client_secret.as_deref()).await
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token_type: &'static str,
    pub scope: Scope,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl From<IssuedTokens> for TokenResponse {
    fn from(issued: IssuedTokens) -> Self {
        Self {
            token_type: "Bearer",
            scope: issued.access.scope,
            access_token: issued.access.token,
            refresh_token: issued.refresh.map(|r| r.token),
        }
    }
}

/// `POST /oauth/token`
pub async fn handle_token(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Form(form): Form<TokenForm>,
) -> OAuthResult<Response> {
    let client = authenticate_client(&state, &headers, &form).await?;
    let grant = form.grant()?;
    if let TokenGrant::Password { username, .. } = &grant {
        state.throttle.check(username)?;
    }

    let issued = state.service.tokens().exchange(&client, grant).await?;
    Ok(token_success(issued.into()))
}

/// Token responses must not be cached (RFC 6749 §5.1).
fn token_success(body: TokenResponse) -> Response {
    let mut response = Json(body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

/// `POST /oauth/revoke`
///
/// Always `200 OK` once the client authenticated, known token or not.
pub async fn handle_revoke(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Form(form): Form<TokenForm>,
) -> OAuthResult<StatusCode> {
    let client = authenticate_client(&state, &headers, &form).await?;
    let token = required(form.token, "token")?;
    state.service.tokens().revoke(&client, &token).await?;
    Ok(StatusCode::OK)
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// `GET /oauth/validate/{token}`
pub async fn handle_validate(
    State(state): State<Arc<HttpState>>,
    Path(token): Path<String>,
) -> OAuthResult<Json<TokenValidation>> {
    Ok(Json(state.service.tokens().validate(&token).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> TokenForm {
        let body = serde_urlencoded::to_string(pairs).unwrap();
        serde_urlencoded::from_str(&body).unwrap()
    }

    #[test]
    fn test_token_form_decoding() {
        let grant = form(&[("grant_type", "authorization_code"), ("code", "abc")]).grant().unwrap();
        assert_eq!(grant, TokenGrant::AuthorizationCode { code: "abc".into() });

        let grant = form(&[("grant_type", "client_credentials"), ("scope", "write read")])
            .grant()
            .unwrap();
        assert_eq!(grant, TokenGrant::ClientCredentials { scope: Scope::parse("read write") });

        let err = form(&[("grant_type", "authorization_code")]).grant().unwrap_err();
        assert!(matches!(err, OAuthError::MissingParameter("code")));

        let err = form(&[("grant_type", "implicit")]).grant().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported grant type implicit");

        let err = form(&[]).grant().unwrap_err();
        assert!(matches!(err, OAuthError::MissingParameter("grant_type")));
    }

    #[test]
    fn test_approve_form_accepts_repeated_and_joined_scope() {
        let form = ApproveForm::decode(b"request_id=r1&scope=read&scope=profile+email&other=x");
        assert_eq!(form.request_id.as_deref(), Some("r1"));
        assert_eq!(form.scope, Scope::parse("email profile read"));

        let form = ApproveForm::decode(b"");
        assert!(form.request_id.is_none());
        assert!(form.scope.is_empty());
    }

    #[test]
    fn test_token_response_omits_missing_refresh_token() {
        let body = TokenResponse {
            token_type: "Bearer",
            scope: Scope::parse("read"),
            access_token: "abc".into(),
            refresh_token: None,
        };
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json, serde_json::json!({"token_type": "Bearer", "scope": "read", "access_token": "abc"}));
    }
}
