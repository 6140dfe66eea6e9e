//! API authentication
//!
//! Both authentication modes sit behind [`AccessTokenProvider`], so the
//! request path is written once:
//!
//! - [`OAuthTokenProvider`]: token manager backed, refreshes ahead of expiry
//! - [`StaticTokenProvider`]: a fixed integration token, never refreshed

use std::time::Duration;

use async_trait::async_trait;
use bokio_common::auth::{
    OAuthClient, OAuthClientError, OAuthClientTrait, TokenManager, TokenManagerError, TokenSet,
};
use bokio_domain::constants::TOKEN_REFRESH_SKEW_SECS;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::errors::{ApiError, ApiErrorBody};
use super::response::ApiResponse;

/// Tenant identifiers (`tenant_id`, `tenant_type`)
pub type TenantInfo = (Option<String>, Option<String>);

/// Trait for providing access tokens
///
/// This trait allows dependency injection and testing with mock providers.
/// Operations that only make sense for OAuth default to
/// [`ApiError::Unsupported`].
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Get a valid access token, refreshing first if needed
    async fn access_token(&self, cancel: &CancellationToken) -> Result<String, ApiError>;

    /// Force a refresh
    async fn refresh(&self, _cancel: &CancellationToken) -> Result<(), ApiError> {
        Err(ApiError::NoRefreshToken)
    }

    async fn exchange_code(&self, _cancel: &CancellationToken, _code: &str) -> Result<(), ApiError> {
        Err(ApiError::Unsupported("authorization code exchange".into()))
    }

    async fn authenticate_client_credentials(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        Err(ApiError::Unsupported("client credentials grant".into()))
    }

    fn authorization_url(&self, _state: &str) -> Result<String, ApiError> {
        Err(ApiError::Unsupported("authorization URL".into()))
    }

    fn is_authenticated(&self) -> bool;

    fn tenant_info(&self) -> TenantInfo {
        (None, None)
    }

    fn set_tokens(&self, _tokens: TokenSet) -> Result<(), ApiError> {
        Err(ApiError::Unsupported("token import".into()))
    }

    fn tokens(&self) -> Option<TokenSet> {
        None
    }
}

/// OAuth 2.0 provider backed by [`TokenManager`]
pub struct OAuthTokenProvider<C: OAuthClientTrait + 'static = OAuthClient> {
    manager: TokenManager<C>,
    timeout: Duration,
}

impl<C: OAuthClientTrait + 'static> OAuthTokenProvider<C> {
    /// Refresh five minutes ahead of expiry
    pub fn new(client: C, timeout: Duration) -> Self {
        Self { manager: TokenManager::new(client, TOKEN_REFRESH_SKEW_SECS), timeout }
    }

    pub const fn manager(&self) -> &TokenManager<C> {
        &self.manager
    }

    fn map_error(&self, err: TokenManagerError) -> ApiError {
        match err {
            TokenManagerError::NotAuthenticated => ApiError::NotAuthenticated,
            TokenManagerError::NoRefreshToken => ApiError::NoRefreshToken,
            TokenManagerError::Cancelled => ApiError::Cancelled,
            TokenManagerError::OAuthError(inner) => self.map_oauth_error(inner),
        }
    }

    fn map_oauth_error(&self, err: OAuthClientError) -> ApiError {
        match err {
            OAuthClientError::Endpoint { status, body } => {
                let error = ApiErrorBody::parse(status, body.as_bytes());
                let status =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let response = ApiResponse::new(status, HeaderMap::new(), body.into_bytes());
                ApiError::Api { error, response: Box::new(response) }
            }
            OAuthClientError::ParseError { message, body } => ApiError::Decode { message, body },
            OAuthClientError::NoRefreshToken => ApiError::NoRefreshToken,
            OAuthClientError::ConfigError(msg) => ApiError::Config(msg),
            err @ OAuthClientError::RequestFailed(_) if err.is_timeout() => {
                ApiError::Timeout(self.timeout)
            }
            OAuthClientError::RequestFailed(e) => ApiError::Network(e.to_string()),
        }
    }
}

#[async_trait]
impl<C: OAuthClientTrait + 'static> AccessTokenProvider for OAuthTokenProvider<C> {
    async fn access_token(&self, cancel: &CancellationToken) -> Result<String, ApiError> {
        self.manager.ensure_valid_token(cancel).await.map_err(|e| self.map_error(e))
    }

    async fn refresh(&self, cancel: &CancellationToken) -> Result<(), ApiError> {
        self.manager.refresh_access_token(cancel).await.map_err(|e| self.map_error(e))
    }

    async fn exchange_code(&self, cancel: &CancellationToken, code: &str) -> Result<(), ApiError> {
        self.manager.exchange_code_for_token(cancel, code).await.map_err(|e| self.map_error(e))
    }

    async fn authenticate_client_credentials(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        self.manager.authenticate_client_credentials(cancel).await.map_err(|e| self.map_error(e))
    }

    fn authorization_url(&self, state: &str) -> Result<String, ApiError> {
        Ok(self.manager.authorization_url(state))
    }

    fn is_authenticated(&self) -> bool {
        self.manager.is_authenticated()
    }

    fn tenant_info(&self) -> TenantInfo {
        self.manager.tenant_info()
    }

    fn set_tokens(&self, tokens: TokenSet) -> Result<(), ApiError> {
        self.manager.set_tokens(tokens);
        Ok(())
    }

    fn tokens(&self) -> Option<TokenSet> {
        Some(self.manager.tokens())
    }
}

/// Integration-token provider
///
/// Authenticated from construction to drop; no token endpoint traffic.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// The token is used verbatim, without trimming
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider").field("token", &"<redacted>").finish()
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self, cancel: &CancellationToken) -> Result<String, ApiError> {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        if self.token.is_empty() {
            return Err(ApiError::NotAuthenticated);
        }
        Ok(self.token.clone())
    }

    async fn refresh(&self, _cancel: &CancellationToken) -> Result<(), ApiError> {
        debug!("Refresh requested for integration token");
        Err(ApiError::NoRefreshToken)
    }

    fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }
}
