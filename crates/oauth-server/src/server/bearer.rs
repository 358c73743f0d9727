//! Bearer authentication context.
//!
//! [`bearer_context`] runs in front of protected routes, resolves the
//! `Authorization: Bearer` credential and stores an [`OAuthInfo`] in the
//! request extensions. The value lives and dies with that one request;
//! handlers read it with the [`OAuthInfo`] or [`MaybeOAuthInfo`] extractors.
//!
//! ```ignore
//! let approvals = Router::new()
//!     .route("/api/approvals", get(list_approvals))
//!     .route_layer(from_fn_with_state(
//!         BearerGuard::require(service, Scope::parse("account-read")),
//!         bearer_context,
//!     ));
//! ```

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::error::{OAuthError, OAuthResult};
use crate::models::AccessToken;
use crate::scope::Scope;
use crate::service::OAuthService;

/// The resolved credential of the current request.
#[derive(Debug, Clone)]
pub struct OAuthInfo {
    pub token: AccessToken,
    /// Behind a required guard, the granted scope intersected with the
    /// route's scope. Behind a permissive guard, the full granted scope.
    pub matched: Scope,
}

impl OAuthInfo {
    /// Account the token acts for.
    ///
    /// Client credentials tokens have none and fail with
    /// [`OAuthError::AccountRequired`].
    pub fn account_id(&self) -> OAuthResult<&str> {
        self.token.account_id.as_deref().ok_or(OAuthError::AccountRequired)
    }
}

/// How a route treats callers without a usable token.
#[derive(Debug, Clone)]
enum Policy {
    Require,
    Permissive,
}

/// Middleware state: which scope a route needs and what to do on failure.
#[derive(Debug, Clone)]
pub struct BearerGuard {
    service: OAuthService,
    scope: Scope,
    policy: Policy,
}

impl BearerGuard {
    /// Reject requests whose token is missing, invalid or lacks `scope`.
    #[must_use]
    pub fn require(service: OAuthService, scope: Scope) -> Self {
        Self { service, scope, policy: Policy::Require }
    }

    /// Let callers without a resolvable token through unauthenticated.
    #[must_use]
    pub fn permissive(service: OAuthService, scope: Scope) -> Self {
        Self { service, scope, policy: Policy::Permissive }
    }

    async fn authorize(&self, bearer: &str) -> OAuthResult<OAuthInfo> {
        let token = self
            .service
            .tokens()
            .resolve(bearer)
            .await?
            .ok_or(OAuthError::InvalidBearerToken)?;

        let matched = match self.policy {
            Policy::Require => token.scope.intersect(&self.scope),
            Policy::Permissive => token.scope.clone(),
        };
        if matched.is_empty() {
            return Err(OAuthError::InsufficientScope);
        }
        tracing::debug!(client_id = %token.client_id, scope = %matched, "Resolved bearer token");
        Ok(OAuthInfo { token, matched })
    }
}

/// The raw bearer credential, copied out of the headers before any await.
fn bearer_token(headers: &HeaderMap) -> OAuthResult<String> {
    if !headers.contains_key(AUTHORIZATION) {
        return Err(OAuthError::NoBearerToken);
    }
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|bearer| bearer.token().to_owned())
        .ok_or(OAuthError::InvalidBearerToken)
}

/// Resolve the bearer credential and attach it to the request.
pub async fn bearer_context(
    State(guard): State<BearerGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let authorized = match bearer_token(request.headers()) {
        Ok(bearer) => guard.authorize(&bearer).await,
        Err(e) => Err(e),
    };
    match authorized {
        Ok(info) => {
            request.extensions_mut().insert(info);
        }
        Err(e @ (OAuthError::Store(_) | OAuthError::Invariant(_))) => return e.into_response(),
        Err(e) => match guard.policy {
            Policy::Require => return e.into_response(),
            Policy::Permissive => tracing::debug!(error = %e, "Proceeding unauthenticated"),
        },
    }
    next.run(request).await
}

impl<S: Send + Sync> FromRequestParts<S> for OAuthInfo {
    type Rejection = OAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or(OAuthError::NoBearerToken)
    }
}

/// [`OAuthInfo`] for routes behind a permissive guard.
#[derive(Debug, Clone)]
pub struct MaybeOAuthInfo(pub Option<OAuthInfo>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeOAuthInfo {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<OAuthInfo>().cloned()))
    }
}
