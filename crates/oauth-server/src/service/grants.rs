//! The grant request state machine.
//!
//! ```text
//! create ──► Pending ──authenticate──► Authenticated ──approve──► ApprovedGrant
//!                                           │   ▲                      │
//!                                           └───┘ consent              │ finalize
//!                                                                      ▼
//!                                   code: CodeIssued (awaits one redemption)
//!                                   token: deleted, access token minted
//! ```
//!
//! Approval is re-evaluated on demand and never cached on the request.
//! A request in `CodeIssued` is terminal: it only waits for redemption at
//! the token endpoint and is invisible to the login and consent steps.
//! [`ApprovedGrant`] can only be built by a passing approval check, so
//! [`GrantRequests::finalize`] cannot run on an unapproved request.

use chrono::Utc;
use url::Url;

use super::{OAuthService, ScopeDescription};
use crate::error::{OAuthError, OAuthResult};
use crate::models::{
    AccessToken, Account, Client, GrantRequest, GrantState, ResponseType, random_token,
};
use crate::scope::Scope;

/// A grant request whose requested scope is covered by the client whitelist
/// and the account's approval.
#[derive(Debug)]
pub struct ApprovedGrant {
    request: GrantRequest,
}

impl ApprovedGrant {
    #[must_use]
    pub fn request(&self) -> &GrantRequest {
        &self.request
    }
}

/// Outcome of finalizing a grant request.
#[derive(Debug)]
pub enum Finalized {
    /// Code flow: the request stays stored with its one-time code set.
    Code { request: GrantRequest, code: String },
    /// Implicit flow: the request is gone and an access token was minted.
    Implicit { request: GrantRequest, token: AccessToken },
}

impl Finalized {
    #[must_use]
    pub fn request(&self) -> &GrantRequest {
        match self {
            Self::Code { request, .. } | Self::Implicit { request, .. } => request,
        }
    }

    /// Where to send the user agent.
    ///
    /// Always the redirect URI stored at creation, never one supplied later.
    pub fn redirect_url(&self) -> OAuthResult<Url> {
        let request = self.request();
        let mut url = Url::parse(&request.redirect_uri)
            .map_err(|_| OAuthError::InvalidRedirectUri(request.redirect_uri.clone()))?;
        {
            let mut query = url.query_pairs_mut();
            match self {
                Self::Code { code, .. } => {
                    query
                        .append_pair("scope", &request.scope.to_wire())
                        .append_pair("state", &request.state)
                        .append_pair("code", code);
                }
                Self::Implicit { token, .. } => {
                    query
                        .append_pair("token_type", "bearer")
                        .append_pair("scope", &token.scope.to_wire())
                        .append_pair("state", &request.state)
                        .append_pair("access_token", &token.token);
                }
            }
        }
        Ok(url)
    }
}

/// What the consent page shows for a request.
#[derive(Debug, Clone)]
pub struct ConsentPrompt {
    pub request_id: String,
    pub client_name: String,
    /// Scope the account already approved for this client.
    pub existing: ScopeDescription,
    /// Scope that still needs approval.
    pub additional: ScopeDescription,
}

/// Operations on grant requests.
pub struct GrantRequests<'a> {
    service: &'a OAuthService,
}

impl<'a> GrantRequests<'a> {
    pub(crate) fn new(service: &'a OAuthService) -> Self {
        Self { service }
    }

    /// Start an authorization attempt for `client`.
    pub async fn create(
        &self,
        client: &Client,
        response_type: &str,
        redirect_uri: &str,
        state: &str,
        scope: Scope,
    ) -> OAuthResult<GrantRequest> {
        let grant_type =
            ResponseType::parse(response_type).ok_or(OAuthError::UnsupportedResponseType)?;
        if !client.has_redirect_uri(redirect_uri) {
            return Err(OAuthError::InvalidRedirectUri(redirect_uri.to_owned()));
        }
        if !self.service.registry().validate_scope(&scope).await? {
            return Err(OAuthError::InvalidScope);
        }

        let request = GrantRequest {
            token: random_token(),
            grant_type,
            client_id: client.id.clone(),
            redirect_uri: redirect_uri.to_owned(),
            scope,
            state: state.to_owned(),
            account_id: None,
            code: None,
            created_at: Utc::now(),
        };
        self.service.store().create_grant_request(request.clone()).await?;

        tracing::info!(
            client = %client.name,
            grant_type = %request.grant_type,
            scope = %request.scope,
            "Created grant request"
        );
        Ok(request)
    }

    /// Fetch a live request by its opaque token.
    ///
    /// Expired requests and requests that already carry a code are reported
    /// as missing.
    pub async fn get(&self, token: &str) -> OAuthResult<GrantRequest> {
        self.service
            .store()
            .grant_request(token)
            .await?
            .filter(|r| !r.is_expired(self.service.config().grant_request_lifetime, Utc::now()))
            .filter(|r| r.state() != GrantState::CodeIssued)
            .ok_or(OAuthError::GrantRequestNotFound)
    }

    fn ensure_open(request: &GrantRequest) -> OAuthResult<()> {
        match request.state() {
            GrantState::Pending | GrantState::Authenticated => Ok(()),
            GrantState::CodeIssued => Err(OAuthError::GrantRequestNotFound),
        }
    }

    /// Attach `account` to the request. Re-authentication overwrites.
    pub async fn authenticate(
        &self,
        mut request: GrantRequest,
        account: &Account,
    ) -> OAuthResult<GrantRequest> {
        Self::ensure_open(&request)?;
        request.account_id = Some(account.id.clone());
        self.service.store().update_grant_request(request.clone()).await?;
        tracing::info!(account = %account.login, "Authenticated grant request");
        Ok(request)
    }

    /// Verify a login and password, then [`authenticate`](Self::authenticate).
    ///
    /// Unknown login and wrong password fail identically.
    pub async fn login(
        &self,
        request: GrantRequest,
        login: &str,
        password: &str,
    ) -> OAuthResult<GrantRequest> {
        Self::ensure_open(&request)?;
        let account = self
            .service
            .store()
            .account_by_login(login)
            .await?
            .filter(|a| a.verify_password(password))
            .ok_or(OAuthError::InvalidCredentials)?;
        self.authenticate(request, &account).await
    }

    async fn client_of(&self, request: &GrantRequest) -> OAuthResult<Client> {
        self.service.registry().lookup_by_id(&request.client_id).await?.ok_or_else(|| {
            OAuthError::invariant(format!("Client of grant request vanished: {}", request.client_id))
        })
    }

    /// Scope the account must still approve: requested minus whitelist.
    fn required_scope(request: &GrantRequest, client: &Client) -> Scope {
        request.scope.difference(&client.scope_whitelist)
    }

    /// Whether the request may be finalized without asking the account.
    pub async fn is_approved(&self, request: &GrantRequest) -> OAuthResult<bool> {
        let client = self.client_of(request).await?;
        let required = Self::required_scope(request, &client);
        if required.is_empty() {
            return Ok(true);
        }
        let Some(account_id) = request.account_id.as_deref() else {
            return Ok(false);
        };
        Ok(self
            .service
            .approvals()
            .find(&client.id, account_id)
            .await?
            .is_some_and(|approval| approval.scope.is_superset(&required)))
    }

    /// Check an authenticated request for approval.
    ///
    /// Fails with [`OAuthError::ApprovalRequired`] when the account still has
    /// to consent.
    pub async fn approve(&self, request: GrantRequest) -> OAuthResult<ApprovedGrant> {
        Self::ensure_open(&request)?;
        if !request.is_authenticated() {
            return Err(OAuthError::NotAuthenticated);
        }
        if self.is_approved(&request).await? {
            Ok(ApprovedGrant { request })
        } else {
            Err(OAuthError::ApprovalRequired)
        }
    }

    /// Complete an approved request.
    pub async fn finalize(&self, approved: ApprovedGrant) -> OAuthResult<Finalized> {
        let mut request = approved.request;
        match request.grant_type {
            ResponseType::Code => {
                let code = random_token();
                request.code = Some(code.clone());
                self.service.store().update_grant_request(request.clone()).await?;
                tracing::info!(client_id = %request.client_id, "Issued authorization code");
                Ok(Finalized::Code { request, code })
            }
            ResponseType::Token => {
                if !self.service.store().delete_grant_request(&request.token).await? {
                    return Err(OAuthError::GrantRequestNotFound);
                }
                let token = self
                    .service
                    .tokens()
                    .mint_access(&request.client_id, request.account_id.clone(), request.scope.clone())
                    .await?;
                tracing::info!(client_id = %request.client_id, "Finalized implicit grant");
                Ok(Finalized::Implicit { request, token })
            }
        }
    }

    /// Build the consent prompt for an authenticated request.
    pub async fn consent_prompt(&self, request: &GrantRequest) -> OAuthResult<ConsentPrompt> {
        let Some(account_id) = request.account_id.as_deref() else {
            return Err(OAuthError::NotAuthenticated);
        };
        let client = self.client_of(request).await?;
        let required = Self::required_scope(request, &client);
        let registry = self.service.registry();

        let existing_scope = self
            .service
            .approvals()
            .find(&client.id, account_id)
            .await?
            .map(|a| a.scope)
            .unwrap_or_default();

        Ok(ConsentPrompt {
            request_id: request.token.clone(),
            client_name: client.name,
            existing: registry.describe_scope(&existing_scope).await?,
            additional: registry.describe_scope(&required.difference(&existing_scope)).await?,
        })
    }

    /// Apply the account's consent and finalize.
    ///
    /// `approved` must cover the requested scope minus the whitelist; the
    /// ledger then records the full requested scope.
    pub async fn consent(&self, request: GrantRequest, approved: &Scope) -> OAuthResult<Finalized> {
        Self::ensure_open(&request)?;
        let Some(account_id) = request.account_id.clone() else {
            return Err(OAuthError::NotAuthenticated);
        };
        let client = self.client_of(&request).await?;
        if !approved.is_superset(&Self::required_scope(&request, &client)) {
            return Err(OAuthError::ScopeNotApproved);
        }

        self.service.approvals().grant(&client.id, &account_id, &request.scope).await?;

        let approved = match self.approve(request).await {
            Ok(approved) => approved,
            Err(OAuthError::ApprovalRequired) => {
                return Err(OAuthError::invariant(
                    "Requested scope should be approved but was not",
                ));
            }
            Err(e) => return Err(e),
        };
        self.finalize(approved).await
    }
}
