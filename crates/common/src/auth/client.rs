//! OAuth 2.0 token endpoint client
//!
//! Handles the HTTP side of the Bokio authorization server:
//! - Authorization URL building (the browser redirect itself is external)
//! - Authorization code exchange
//! - Token refresh
//! - Client credentials grant

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::traits::OAuthClientTrait;
use super::types::{OAuthConfig, TokenResponse, TokenSet};

/// Error type for OAuth client operations
#[derive(Debug)]
pub enum OAuthClientError {
    /// HTTP request failed before a response arrived
    RequestFailed(reqwest::Error),

    /// Token endpoint answered with a non-200 status
    Endpoint { status: u16, body: String },

    /// Failed to parse the token response; raw body kept for diagnostics
    ParseError { message: String, body: String },

    /// No refresh token available
    NoRefreshToken,

    /// Invalid configuration
    ConfigError(String),
}

impl OAuthClientError {
    /// Check whether the underlying transport timed out
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestFailed(err) if err.is_timeout())
    }
}

impl std::fmt::Display for OAuthClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed(e) => write!(f, "HTTP request failed: {e}"),
            Self::Endpoint { status, body } => {
                write!(f, "token endpoint returned status {status}: {body}")
            }
            Self::ParseError { message, .. } => write!(f, "Parse error: {message}"),
            Self::NoRefreshToken => write!(f, "No refresh token available"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for OAuthClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RequestFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for OAuthClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed(err)
    }
}

/// Token endpoint client for the Bokio authorization server
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    client: Client,
}

impl OAuthClient {
    /// Create a client with its own HTTP connection pool
    ///
    /// # Errors
    /// Returns `ConfigError` if the HTTP client cannot be built
    pub fn new(config: OAuthConfig) -> Result<Self, OAuthClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy()
            .build()
            .map_err(|e| OAuthClientError::ConfigError(format!("HTTP client: {e}")))?;
        Ok(Self::with_http_client(config, client))
    }

    /// Create a client sharing an existing connection pool, timeout and
    /// user agent
    #[must_use]
    pub fn with_http_client(config: OAuthConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Build the authorization URL for an external UI to present
    ///
    /// # Examples
    /// ```
    /// use bokio_common::auth::{OAuthClient, OAuthConfig};
    ///
    /// let config = OAuthConfig::new(
    ///     "https://api.bokio.se".to_string(),
    ///     "client_id".to_string(),
    ///     "client_secret".to_string(),
    ///     "http://localhost:8080/callback".to_string(),
    ///     vec!["accounting".to_string()],
    /// );
    /// let client = OAuthClient::new(config).unwrap();
    /// let url = client.authorization_url("xyz");
    /// assert!(url.starts_with("https://api.bokio.se/authorize?response_type=code"));
    /// ```
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        let scope_string = self.config.scope_string();

        let params = [
            ("response_type", "code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", scope_string.as_str()),
            ("state", state),
        ];

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.config.authorization_url(), query_string)
    }

    /// Exchange authorization code for tokens
    ///
    /// # Errors
    /// Returns error if the request fails, the endpoint rejects the code,
    /// or the response cannot be parsed
    pub async fn exchange_code_for_tokens(&self, code: &str) -> Result<TokenSet, OAuthClientError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        self.request_token("authorization_code", &params).await
    }

    /// Refresh access token using refresh token
    ///
    /// # Errors
    /// Returns `NoRefreshToken` for an empty token; otherwise as
    /// [`Self::exchange_code_for_tokens`]
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        if refresh_token.is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }

        let params = [("grant_type", "refresh_token"), ("refresh_token", refresh_token)];
        self.request_token("refresh_token", &params).await
    }

    /// Authenticate the client itself, without a user
    ///
    /// # Errors
    /// As [`Self::exchange_code_for_tokens`]
    pub async fn client_credentials(&self) -> Result<TokenSet, OAuthClientError> {
        let params = [("grant_type", "client_credentials")];
        self.request_token("client_credentials", &params).await
    }

    /// Get a reference to the OAuth configuration
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    async fn request_token(
        &self,
        grant_type: &str,
        params: &[(&str, &str)],
    ) -> Result<TokenSet, OAuthClientError> {
        let token_url = self.config.token_url();
        debug!(grant_type, url = %token_url, "requesting token");

        let response = self
            .client
            .post(&token_url)
            .header(AUTHORIZATION, self.config.basic_auth_header())
            .header(ACCEPT, "application/json")
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            debug!(grant_type, %status, "token endpoint rejected request");
            return Err(OAuthClientError::Endpoint { status: status.as_u16(), body });
        }

        let token_response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| OAuthClientError::ParseError { message: e.to_string(), body })?;

        Ok(token_response.into())
    }
}

#[async_trait]
impl OAuthClientTrait for OAuthClient {
    async fn exchange_code_for_tokens(&self, code: &str) -> Result<TokenSet, OAuthClientError> {
        self.exchange_code_for_tokens(code).await
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        self.refresh_access_token(refresh_token).await
    }

    async fn client_credentials(&self) -> Result<TokenSet, OAuthClientError> {
        self.client_credentials().await
    }

    fn authorization_url(&self, state: &str) -> String {
        self.authorization_url(state)
    }
}
