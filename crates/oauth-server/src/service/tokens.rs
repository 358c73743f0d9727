//! Token minting, exchange and validation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::OAuthService;
use crate::error::{OAuthError, OAuthResult};
use crate::models::{AccessToken, Client, RefreshToken, random_token};
use crate::scope::Scope;

/// A decoded token endpoint request, one variant per supported `grant_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenGrant {
    AuthorizationCode { code: String },
    RefreshToken { refresh_token: String },
    Password { username: String, password: String, scope: Scope },
    ClientCredentials { scope: Scope },
}

impl TokenGrant {
    /// The wire `grant_type` value.
    #[must_use]
    pub const fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::RefreshToken { .. } => "refresh_token",
            Self::Password { .. } => "password",
            Self::ClientCredentials { .. } => "client_credentials",
        }
    }
}

/// Result of a successful exchange.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access: AccessToken,
    /// Only the authorization code grant issues one.
    pub refresh: Option<RefreshToken>,
}

/// Body of the token validation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenValidation {
    pub url: String,
    pub jti: String,
    pub exp: DateTime<Utc>,
    pub iss: String,
    pub login: Option<String>,
    pub account_url: Option<String>,
    pub scope: Scope,
}

/// Issues and resolves credentials.
pub struct TokenIssuer<'a> {
    service: &'a OAuthService,
}

impl<'a> TokenIssuer<'a> {
    pub(crate) fn new(service: &'a OAuthService) -> Self {
        Self { service }
    }

    /// Persist a fresh access token.
    ///
    /// A store conflict is returned as is; the caller decides whether to retry.
    pub async fn mint_access(
        &self,
        client_id: &str,
        account_id: Option<String>,
        scope: Scope,
    ) -> OAuthResult<AccessToken> {
        let token = AccessToken {
            token: random_token(),
            expires: Utc::now() + self.service.config().access_token_lifetime,
            scope,
            client_id: client_id.to_owned(),
            account_id,
        };
        self.service.store().create_access_token(token.clone()).await?;
        tracing::info!(
            client_id,
            account_bound = token.account_id.is_some(),
            scope = %token.scope,
            "Minted access token"
        );
        Ok(token)
    }

    async fn mint_refresh(
        &self,
        client_id: &str,
        account_id: &str,
        scope: Scope,
    ) -> OAuthResult<RefreshToken> {
        let token = RefreshToken {
            token: random_token(),
            client_id: client_id.to_owned(),
            account_id: account_id.to_owned(),
            scope,
        };
        self.service.store().create_refresh_token(token.clone()).await?;
        tracing::info!(client_id, scope = %token.scope, "Minted refresh token");
        Ok(token)
    }

    /// Exchange a grant for tokens on behalf of an authenticated client.
    pub async fn exchange(&self, client: &Client, grant: TokenGrant) -> OAuthResult<IssuedTokens> {
        tracing::debug!(client = %client.name, grant_type = grant.grant_type(), "Token exchange");
        match grant {
            TokenGrant::AuthorizationCode { code } => self.exchange_code(client, &code).await,
            TokenGrant::RefreshToken { refresh_token } => self.refresh(client, &refresh_token).await,
            TokenGrant::Password { username, password, scope } => {
                self.password(client, &username, &password, scope).await
            }
            TokenGrant::ClientCredentials { scope } => self.client_credentials(client, scope).await,
        }
    }

    async fn exchange_code(&self, client: &Client, code: &str) -> OAuthResult<IssuedTokens> {
        let store = self.service.store();
        let request = store
            .grant_request_by_code(code)
            .await?
            .filter(|r| !r.is_expired(self.service.config().grant_request_lifetime, Utc::now()))
            .ok_or(OAuthError::InvalidGrantCode)?;

        if request.client_id != client.id {
            store.delete_grant_request(&request.token).await?;
            tracing::warn!(client = %client.name, "Burned grant code presented by another client");
            return Err(OAuthError::InvalidGrantCode);
        }

        // Losing the delete race means another redemption already won.
        if !store.delete_grant_request(&request.token).await? {
            return Err(OAuthError::InvalidGrantCode);
        }

        let Some(account_id) = request.account_id else {
            return Err(OAuthError::invariant("Code issued for an unauthenticated grant request"));
        };
        let access =
            self.mint_access(&client.id, Some(account_id.clone()), request.scope.clone()).await?;
        let refresh = self.mint_refresh(&client.id, &account_id, request.scope).await?;
        Ok(IssuedTokens { access, refresh: Some(refresh) })
    }

    async fn refresh(&self, client: &Client, refresh_token: &str) -> OAuthResult<IssuedTokens> {
        let store = self.service.store();
        let refresh =
            store.refresh_token(refresh_token).await?.ok_or(OAuthError::InvalidRefreshToken)?;

        if refresh.client_id != client.id {
            store.delete_refresh_token(&refresh.token).await?;
            tracing::warn!(client = %client.name, "Burned refresh token presented by another client");
            return Err(OAuthError::InvalidRefreshToken);
        }

        let access = self
            .mint_access(&client.id, Some(refresh.account_id.clone()), refresh.scope.clone())
            .await?;
        Ok(IssuedTokens { access, refresh: None })
    }

    async fn password(
        &self,
        client: &Client,
        login: &str,
        password: &str,
        scope: Scope,
    ) -> OAuthResult<IssuedTokens> {
        let account = self
            .service
            .store()
            .account_by_login(login)
            .await?
            .filter(|a| a.verify_password(password))
            .ok_or(OAuthError::InvalidCredentials)?;
        Self::check_whitelisted(client, &scope)?;

        let access = self.mint_access(&client.id, Some(account.id), scope).await?;
        Ok(IssuedTokens { access, refresh: None })
    }

    async fn client_credentials(&self, client: &Client, scope: Scope) -> OAuthResult<IssuedTokens> {
        Self::check_whitelisted(client, &scope)?;
        let access = self.mint_access(&client.id, None, scope).await?;
        Ok(IssuedTokens { access, refresh: None })
    }

    /// Grants without a consent step may only reach the client's whitelist.
    fn check_whitelisted(client: &Client, scope: &Scope) -> OAuthResult<()> {
        if scope.is_empty() || !scope.is_subset(&client.scope_whitelist) {
            return Err(OAuthError::InvalidScope);
        }
        Ok(())
    }

    /// Look up a live access token. Expired tokens resolve to `None`.
    pub async fn resolve(&self, token: &str) -> OAuthResult<Option<AccessToken>> {
        Ok(self.service.store().access_token(token).await?.filter(|t| !t.is_expired(Utc::now())))
    }

    /// Describe a live access token for resource servers.
    pub async fn validate(&self, token: &str) -> OAuthResult<TokenValidation> {
        let access = self.resolve(token).await?.ok_or(OAuthError::TokenNotFound)?;
        let config = self.service.config();

        let login = match access.account_id.as_deref() {
            Some(account_id) => {
                let account = self.service.store().account(account_id).await?.ok_or_else(|| {
                    OAuthError::invariant("Unable to find account associated with the request")
                })?;
                Some(account.login)
            }
            None => None,
        };

        Ok(TokenValidation {
            url: config.make_url(&format!("/oauth/validate/{}", access.token)),
            account_url: login.as_ref().map(|l| config.make_url(&format!("/api/accounts/{l}"))),
            jti: access.token,
            exp: access.expires,
            iss: config.issuer.clone(),
            login,
            scope: access.scope,
        })
    }

    /// Revoke an access or refresh token owned by `client`.
    ///
    /// Unknown tokens and tokens of other clients are ignored, so callers
    /// learn nothing about foreign credentials.
    pub async fn revoke(&self, client: &Client, token: &str) -> OAuthResult<()> {
        let store = self.service.store();
        if let Some(access) = store.access_token(token).await? {
            if access.client_id == client.id {
                store.delete_access_token(token).await?;
                tracing::info!(client = %client.name, "Revoked access token");
            }
            return Ok(());
        }
        if let Some(refresh) = store.refresh_token(token).await? {
            if refresh.client_id == client.id {
                store.delete_refresh_token(token).await?;
                tracing::info!(client = %client.name, "Revoked refresh token");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{PASSWORD, REDIRECT, fixture};
    use crate::service::{Finalized, OAuthService};

    /// Run the code flow up to an issued code for `scope`.
    async fn issue_code(service: &OAuthService, client: &Client, scope: &str) -> String {
        let grants = service.grants();
        let request = grants.create(client, "code", REDIRECT, "", Scope::parse(scope)).await.unwrap();
        let request = grants.login(request, "alice", PASSWORD).await.unwrap();
        match grants.consent(request, &Scope::parse(scope)).await.unwrap() {
            Finalized::Code { code, .. } => code,
            Finalized::Implicit { .. } => panic!("expected code flow"),
        }
    }

    #[tokio::test]
    async fn test_authorization_code_end_to_end() {
        let f = fixture().await;
        let code = issue_code(&f.service, &f.gin, "read profile").await;

        let approval = f.service.approvals().find(&f.gin.id, &f.alice.id).await.unwrap().unwrap();
        assert_eq!(approval.scope, Scope::parse("read profile"));

        let tokens = f.service.tokens();
        let issued = tokens
            .exchange(&f.gin, TokenGrant::AuthorizationCode { code: code.clone() })
            .await
            .unwrap();
        assert_eq!(issued.access.scope, Scope::parse("read profile"));
        assert_eq!(issued.access.account_id.as_deref(), Some(f.alice.id.as_str()));
        let refresh = issued.refresh.unwrap();
        assert_eq!(refresh.scope, Scope::parse("read profile"));

        let again = tokens.exchange(&f.gin, TokenGrant::AuthorizationCode { code }).await;
        assert!(matches!(again, Err(OAuthError::InvalidGrantCode)));
    }

    #[tokio::test]
    async fn test_code_presented_by_other_client_is_burned() {
        let f = fixture().await;
        let code = issue_code(&f.service, &f.gin, "read").await;
        let tokens = f.service.tokens();

        let err = tokens
            .exchange(&f.wb, TokenGrant::AuthorizationCode { code: code.clone() })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), OAuthError::InvalidGrantCode.to_string());

        let err = tokens.exchange(&f.gin, TokenGrant::AuthorizationCode { code }).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidGrantCode));
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let f = fixture().await;
        let err = f
            .service
            .tokens()
            .exchange(&f.gin, TokenGrant::AuthorizationCode { code: "nope".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidGrantCode));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_rotated() {
        let f = fixture().await;
        let code = issue_code(&f.service, &f.gin, "read").await;
        let tokens = f.service.tokens();
        let issued = tokens.exchange(&f.gin, TokenGrant::AuthorizationCode { code }).await.unwrap();
        let refresh = issued.refresh.unwrap();

        let grant = TokenGrant::RefreshToken { refresh_token: refresh.token.clone() };
        let first = tokens.exchange(&f.gin, grant.clone()).await.unwrap();
        let second = tokens.exchange(&f.gin, grant).await.unwrap();

        assert!(first.refresh.is_none());
        assert_ne!(first.access.token, second.access.token);
        assert_ne!(first.access.token, issued.access.token);
        assert_eq!(first.access.scope, refresh.scope);
        assert_eq!(second.access.scope, refresh.scope);
        assert_eq!(f.service.store().refresh_token(&refresh.token).await.unwrap(), Some(refresh));
    }

    #[tokio::test]
    async fn test_refresh_token_presented_by_other_client_is_burned() {
        let f = fixture().await;
        let code = issue_code(&f.service, &f.gin, "read").await;
        let tokens = f.service.tokens();
        let refresh = tokens
            .exchange(&f.gin, TokenGrant::AuthorizationCode { code })
            .await
            .unwrap()
            .refresh
            .unwrap();

        let grant = TokenGrant::RefreshToken { refresh_token: refresh.token };
        let err = tokens.exchange(&f.wb, grant.clone()).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidRefreshToken));
        let err = tokens.exchange(&f.gin, grant).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn test_password_grant() {
        let f = fixture().await;
        let tokens = f.service.tokens();
        let grant = |username: &str, password: &str, scope: &str| TokenGrant::Password {
            username: username.into(),
            password: password.into(),
            scope: Scope::parse(scope),
        };

        let issued = tokens.exchange(&f.gin, grant("alice", PASSWORD, "read")).await.unwrap();
        assert!(issued.refresh.is_none());
        assert_eq!(issued.access.account_id.as_deref(), Some(f.alice.id.as_str()));

        let wrong = tokens.exchange(&f.gin, grant("alice", "nope", "read")).await.unwrap_err();
        let unknown = tokens.exchange(&f.gin, grant("bob", PASSWORD, "read")).await.unwrap_err();
        assert_eq!(wrong.to_string(), "Wrong username or password");
        assert_eq!(wrong.to_string(), unknown.to_string());

        // "profile" is provided but not whitelisted for gin.
        let err = tokens.exchange(&f.gin, grant("alice", PASSWORD, "read profile")).await;
        assert!(matches!(err, Err(OAuthError::InvalidScope)));
        let err = tokens.exchange(&f.gin, grant("alice", PASSWORD, "")).await;
        assert!(matches!(err, Err(OAuthError::InvalidScope)));
    }

    #[tokio::test]
    async fn test_client_credentials_grant() {
        let f = fixture().await;
        let tokens = f.service.tokens();

        let issued = tokens
            .exchange(&f.wb, TokenGrant::ClientCredentials { scope: Scope::parse("write") })
            .await
            .unwrap();
        assert_eq!(issued.access.scope, Scope::parse("write"));
        assert!(issued.access.account_id.is_none());
        assert!(issued.refresh.is_none());

        let err = tokens
            .exchange(&f.wb, TokenGrant::ClientCredentials { scope: Scope::parse("admin") })
            .await;
        assert!(matches!(err, Err(OAuthError::InvalidScope)));
    }

    #[tokio::test]
    async fn test_expired_token_resolves_like_missing() {
        let f = fixture().await;
        let tokens = f.service.tokens();
        let mut token = tokens.mint_access(&f.gin.id, None, Scope::parse("read")).await.unwrap();
        assert!(tokens.resolve(&token.token).await.unwrap().is_some());

        f.service.store().delete_access_token(&token.token).await.unwrap();
        token.expires = Utc::now() - chrono::Duration::seconds(1);
        f.service.store().create_access_token(token.clone()).await.unwrap();

        assert!(tokens.resolve(&token.token).await.unwrap().is_none());
        assert!(tokens.resolve("missing").await.unwrap().is_none());
        assert!(matches!(tokens.validate(&token.token).await, Err(OAuthError::TokenNotFound)));
    }

    #[tokio::test]
    async fn test_validate() {
        let f = fixture().await;
        let tokens = f.service.tokens();

        let bound = tokens
            .mint_access(&f.gin.id, Some(f.alice.id.clone()), Scope::parse("read"))
            .await
            .unwrap();
        let info = tokens.validate(&bound.token).await.unwrap();
        assert_eq!(info.jti, bound.token);
        assert_eq!(info.url, format!("https://auth.example/oauth/validate/{}", bound.token));
        assert_eq!(info.login.as_deref(), Some("alice"));
        assert_eq!(info.account_url.as_deref(), Some("https://auth.example/api/accounts/alice"));
        assert_eq!(info.iss, f.service.config().issuer);

        let client_only = tokens.mint_access(&f.wb.id, None, Scope::parse("write")).await.unwrap();
        let info = tokens.validate(&client_only.token).await.unwrap();
        assert!(info.login.is_none());
        assert!(info.account_url.is_none());

        let orphan = tokens
            .mint_access(&f.gin.id, Some("gone".into()), Scope::parse("read"))
            .await
            .unwrap();
        assert!(matches!(tokens.validate(&orphan.token).await, Err(OAuthError::Invariant(_))));
    }

    #[tokio::test]
    async fn test_revoke_only_own_tokens() {
        let f = fixture().await;
        let tokens = f.service.tokens();
        let token = tokens.mint_access(&f.gin.id, None, Scope::parse("read")).await.unwrap();

        tokens.revoke(&f.wb, &token.token).await.unwrap();
        assert!(tokens.resolve(&token.token).await.unwrap().is_some());

        tokens.revoke(&f.gin, &token.token).await.unwrap();
        assert!(tokens.resolve(&token.token).await.unwrap().is_none());

        tokens.revoke(&f.gin, "never-issued").await.unwrap();
    }
}
