//! Error types for the OAuth server.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Display strings are the messages sent to clients, so authentication failures
//! deliberately share wording across their causes.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

/// Errors from the durable store.
///
/// "Not found" on reads is `Ok(None)`, not an error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Create-if-absent hit an existing key.
    #[error("{entity} '{key}' already exists")]
    Conflict {
        /// Record kind
        entity: &'static str,
        /// Conflicting key
        key: String,
    },

    /// Update addressed a record that does not exist.
    #[error("{entity} '{key}' does not exist")]
    Missing {
        /// Record kind
        entity: &'static str,
        /// Missing key
        key: String,
    },

    /// Backend failure (connection, serialization, ...).
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    #[must_use]
    pub fn conflict(entity: &'static str, key: impl Into<String>) -> Self {
        Self::Conflict { entity, key: key.into() }
    }

    #[must_use]
    pub fn missing(entity: &'static str, key: impl Into<String>) -> Self {
        Self::Missing { entity, key: key.into() }
    }
}

/// Errors from the OAuth protocol core.
#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    // Validation: client-correctable, never retried.
    #[error("Client '{0}' does not exist")]
    UnknownClient(String),

    #[error("Response type expected to be 'code' or 'token'")]
    UnsupportedResponseType,

    #[error("Redirect URI invalid: '{0}'")]
    InvalidRedirectUri(String),

    #[error("Invalid scope")]
    InvalidScope,

    #[error("Parameter '{0}' was missing")]
    MissingParameter(&'static str),

    #[error("Unsupported grant type {0}")]
    UnsupportedGrantType(String),

    // Authentication and authorization: generic wording, no enumeration.
    #[error("Wrong client id or client secret")]
    InvalidClient,

    #[error("Wrong username or password")]
    InvalidCredentials,

    #[error("Invalid grant code")]
    InvalidGrantCode,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("No bearer token")]
    NoBearerToken,

    #[error("Invalid bearer token")]
    InvalidBearerToken,

    #[error("Insufficient scope")]
    InsufficientScope,

    #[error("Token is not bound to an account")]
    AccountRequired,

    #[error("Grant request is not authenticated")]
    NotAuthenticated,

    #[error("Grant request does not exist")]
    GrantRequestNotFound,

    #[error("The requested token does not exist")]
    TokenNotFound,

    #[error("Approval does not exist")]
    ApprovalNotFound,

    // Consistency: the caller should be sent to the consent step.
    #[error("Requested scope requires approval")]
    ApprovalRequired,

    #[error("Requested scope was not approved")]
    ScopeNotApproved,

    // Infrastructure and contract breaches.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Invariant(String),
}

impl OAuthError {
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }

    /// HTTP status for this error at the protocol boundary.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::UnknownClient(_)
            | Self::UnsupportedResponseType
            | Self::InvalidRedirectUri(_)
            | Self::InvalidScope
            | Self::MissingParameter(_)
            | Self::UnsupportedGrantType(_) => StatusCode::BAD_REQUEST,
            Self::InvalidClient
            | Self::InvalidCredentials
            | Self::InvalidGrantCode
            | Self::InvalidRefreshToken
            | Self::NoBearerToken
            | Self::InvalidBearerToken
            | Self::InsufficientScope
            | Self::AccountRequired
            | Self::NotAuthenticated
            | Self::ApprovalRequired
            | Self::ScopeNotApproved => StatusCode::UNAUTHORIZED,
            Self::GrantRequestNotFound | Self::TokenNotFound | Self::ApprovalNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::Store(_) | Self::Invariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// RFC 6749 / RFC 6750 error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::UnknownClient(_) | Self::InvalidRedirectUri(_) | Self::MissingParameter(_) => {
                "invalid_request"
            }
            Self::NoBearerToken => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidCredentials | Self::InvalidGrantCode | Self::InvalidRefreshToken => {
                "invalid_grant"
            }
            Self::InvalidBearerToken | Self::AccountRequired | Self::TokenNotFound => {
                "invalid_token"
            }
            Self::InsufficientScope => "insufficient_scope",
            Self::NotAuthenticated
            | Self::ApprovalRequired
            | Self::ScopeNotApproved
            | Self::GrantRequestNotFound
            | Self::ApprovalNotFound => "access_denied",
            Self::Store(_) | Self::Invariant(_) => "server_error",
        }
    }

    /// True for failures of the bearer credential itself.
    #[must_use]
    pub const fn is_bearer_failure(&self) -> bool {
        matches!(
            self,
            Self::NoBearerToken
                | Self::InvalidBearerToken
                | Self::InsufficientScope
                | Self::AccountRequired
        )
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let description = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed with internal error");
            "Internal server error".to_owned()
        } else {
            self.to_string()
        };

        let mut response = (
            status,
            Json(serde_json::json!({
                "error": self.code(),
                "error_description": description
            })),
        )
            .into_response();

        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        if self.is_bearer_failure() {
            let challenge = format!(r#"Bearer error="{}", error_description="{}""#, self.code(), self);
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for protocol operations.
pub type OAuthResult<T> = Result<T, OAuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_and_wrong_credential_share_wording() {
        assert_eq!(OAuthError::InvalidCredentials.to_string(), "Wrong username or password");
        assert_eq!(OAuthError::InvalidGrantCode.to_string(), "Invalid grant code");
        assert_eq!(OAuthError::InvalidRefreshToken.to_string(), "Invalid refresh token");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(OAuthError::InvalidScope.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            OAuthError::UnsupportedGrantType("foo".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(OAuthError::InvalidGrantCode.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(OAuthError::GrantRequestNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            OAuthError::from(StoreError::conflict("access token", "abc")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_bearer_failure_sets_challenge() {
        let response = OAuthError::InsufficientScope.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response.headers().get(header::WWW_AUTHENTICATE).unwrap();
        assert!(challenge.to_str().unwrap().contains("insufficient_scope"));
    }

    #[test]
    fn test_internal_error_hides_details() {
        let response = OAuthError::Store(StoreError::Backend("disk on fire".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}
