//! Token manager with refresh-before-expiry
//!
//! Manages the OAuth token lifecycle:
//! - Authorization code exchange and client credentials grant
//! - Refresh when the token is within the skew window of expiry
//! - Thread-safe snapshot access for the request path
//!
//! # Concurrency
//!
//! The token store is only locked for the clone or the assignment; every
//! token endpoint call happens with no lock held. `ensure_valid_token`
//! therefore checks and refreshes in two steps, and two callers that both
//! observe a stale token may both refresh. Both refreshes produce valid
//! tokens and the last write wins, so the race is benign and left in place.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::client::OAuthClientError;
use super::token_store::{MemoryTokenStore, TokenStoreTrait};
use super::traits::OAuthClientTrait;
use super::types::TokenSet;

/// Error type for token manager operations
#[derive(Debug)]
pub enum TokenManagerError {
    /// OAuth operation failed
    OAuthError(OAuthClientError),

    /// No tokens available (not authenticated)
    NotAuthenticated,

    /// No refresh token available
    NoRefreshToken,

    /// Caller cancelled while the token endpoint call was in flight
    Cancelled,
}

impl std::fmt::Display for TokenManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OAuthError(e) => write!(f, "OAuth error: {e}"),
            Self::NotAuthenticated => write!(f, "Not authenticated (no tokens)"),
            Self::NoRefreshToken => write!(f, "No refresh token available"),
            Self::Cancelled => write!(f, "Token operation cancelled"),
        }
    }
}

impl std::error::Error for TokenManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OAuthError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<OAuthClientError> for TokenManagerError {
    fn from(err: OAuthClientError) -> Self {
        match err {
            OAuthClientError::NoRefreshToken => Self::NoRefreshToken,
            other => Self::OAuthError(other),
        }
    }
}

/// Token manager for the interactive OAuth mode
///
/// Owns the token store; nothing else writes to it.
pub struct TokenManager<C: OAuthClientTrait + 'static, S: TokenStoreTrait + 'static = MemoryTokenStore>
{
    oauth_client: Arc<C>,
    store: Arc<S>,
    refresh_threshold_seconds: i64,
}

impl<C: OAuthClientTrait + 'static> TokenManager<C, MemoryTokenStore> {
    /// Create a token manager with an empty in-memory store
    ///
    /// # Arguments
    /// * `oauth_client` - Token endpoint client
    /// * `refresh_threshold_seconds` - Refresh tokens this many seconds before
    ///   expiry (default: 300 = 5 min)
    #[must_use]
    pub fn new(oauth_client: C, refresh_threshold_seconds: i64) -> Self {
        Self::with_store(oauth_client, Arc::new(MemoryTokenStore::new()), refresh_threshold_seconds)
    }
}

impl<C: OAuthClientTrait + 'static, S: TokenStoreTrait + 'static> TokenManager<C, S> {
    /// Create a token manager over a caller-provided store
    #[must_use]
    pub fn with_store(oauth_client: C, store: Arc<S>, refresh_threshold_seconds: i64) -> Self {
        Self { oauth_client: Arc::new(oauth_client), store, refresh_threshold_seconds }
    }

    /// Exchange an authorization code and store the resulting tokens
    ///
    /// # Errors
    /// Returns error if the exchange fails or `cancel` fires first; the
    /// store is left untouched in both cases
    pub async fn exchange_code_for_token(
        &self,
        cancel: &CancellationToken,
        code: &str,
    ) -> Result<(), TokenManagerError> {
        let tokens = cancellable(cancel, self.oauth_client.exchange_code_for_tokens(code)).await?;

        info!(
            tenant_id = tokens.tenant_id.as_deref().unwrap_or(""),
            expires_in = tokens.expires_in,
            "Exchanged authorization code for tokens"
        );
        self.store.write(tokens);
        Ok(())
    }

    /// Authenticate with the client credentials grant
    ///
    /// No refresh token is issued; once the token expires callers must
    /// authenticate again.
    ///
    /// # Errors
    /// As [`Self::exchange_code_for_token`]
    pub async fn authenticate_client_credentials(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), TokenManagerError> {
        let tokens = cancellable(cancel, self.oauth_client.client_credentials()).await?;

        info!(
            tenant_id = tokens.tenant_id.as_deref().unwrap_or(""),
            expires_in = tokens.expires_in,
            "Authenticated with client credentials"
        );
        self.store.write(tokens);
        Ok(())
    }

    /// Refresh access token using the stored refresh token
    ///
    /// On failure the previous (possibly expired) tokens stay in place so
    /// the next call retries the refresh.
    ///
    /// # Errors
    /// Returns `NoRefreshToken` without any request if none is stored,
    /// otherwise the endpoint or cancellation error
    pub async fn refresh_access_token(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), TokenManagerError> {
        self.refresh(cancel).await.map(|_| ())
    }

    /// Return a bearer token that is valid for at least the skew window
    ///
    /// Reads a snapshot; refreshes only when the token is near expiry and
    /// a refresh token exists. A stale token without a refresh token is
    /// returned as is and left for the server to reject.
    ///
    /// # Errors
    /// Returns `NotAuthenticated` if no access token is held, or the refresh
    /// error
    pub async fn ensure_valid_token(
        &self,
        cancel: &CancellationToken,
    ) -> Result<String, TokenManagerError> {
        let snapshot = self.store.read();

        if snapshot.is_empty() {
            return Err(TokenManagerError::NotAuthenticated);
        }

        if snapshot.is_expired(self.refresh_threshold_seconds) && snapshot.has_refresh_token() {
            debug!(
                seconds_until_expiry = snapshot.seconds_until_expiry(),
                "Access token within refresh window"
            );
            let refreshed = self.refresh(cancel).await?;
            return Ok(refreshed.access_token);
        }

        Ok(snapshot.access_token)
    }

    /// Check if an access token is held
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.store.read().is_empty()
    }

    /// Tenant identifiers from the last token response
    #[must_use]
    pub fn tenant_info(&self) -> (Option<String>, Option<String>) {
        let snapshot = self.store.read();
        (snapshot.tenant_id, snapshot.tenant_type)
    }

    /// Current token snapshot, e.g. for external persistence
    #[must_use]
    pub fn tokens(&self) -> TokenSet {
        self.store.read()
    }

    /// Replace the current tokens, e.g. with ones restored from persistence
    pub fn set_tokens(&self, tokens: TokenSet) {
        self.store.write(tokens);
        debug!("Token snapshot replaced");
    }

    /// Authorization URL for an external UI
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        self.oauth_client.authorization_url(state)
    }

    /// Get the token store
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    async fn refresh(&self, cancel: &CancellationToken) -> Result<TokenSet, TokenManagerError> {
        // Snapshot, then release before the network call
        let previous = self.store.read();
        let refresh_token = match previous.refresh_token.as_deref() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => return Err(TokenManagerError::NoRefreshToken),
        };

        let refreshed =
            match cancellable(cancel, self.oauth_client.refresh_access_token(&refresh_token)).await
            {
                Ok(tokens) => tokens.merged_over(&previous),
                Err(TokenManagerError::Cancelled) => return Err(TokenManagerError::Cancelled),
                Err(e) => {
                    error!(error = %e, "Token refresh failed");
                    return Err(e);
                }
            };

        self.store.write(refreshed.clone());
        info!(expires_in = refreshed.expires_in, "Successfully refreshed access token");

        Ok(refreshed)
    }
}

async fn cancellable<F>(cancel: &CancellationToken, fut: F) -> Result<TokenSet, TokenManagerError>
where
    F: Future<Output = Result<TokenSet, OAuthClientError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(TokenManagerError::Cancelled),
        result = fut => result.map_err(TokenManagerError::from),
    }
}
