//! Traits for token endpoint and token storage seams
//!
//! These traits enable dependency injection and testing by abstracting
//! the Bokio authorization server.

use async_trait::async_trait;

use super::client::OAuthClientError;
use super::types::TokenSet;

pub use super::token_store::TokenStoreTrait;

/// Trait for token endpoint operations
///
/// Every call is a single `POST {base}/token` with HTTP Basic client
/// authentication. Implementations do not touch any token store; storing
/// the result is the token manager's job.
#[async_trait]
pub trait OAuthClientTrait: Send + Sync {
    /// Exchange an authorization code (`grant_type=authorization_code`)
    ///
    /// # Errors
    /// Returns error if the request fails, the endpoint answers non-200, or
    /// the body is not a token response
    async fn exchange_code_for_tokens(&self, code: &str) -> Result<TokenSet, OAuthClientError>;

    /// Obtain a new access token (`grant_type=refresh_token`)
    ///
    /// # Errors
    /// Returns `NoRefreshToken` for an empty token, otherwise as above
    async fn refresh_access_token(&self, refresh_token: &str)
        -> Result<TokenSet, OAuthClientError>;

    /// Machine-to-machine grant (`grant_type=client_credentials`); the
    /// response carries no refresh token
    ///
    /// # Errors
    /// Same failure modes as the code exchange
    async fn client_credentials(&self) -> Result<TokenSet, OAuthClientError>;

    /// Authorization URL for an external UI to present; never fetched here
    fn authorization_url(&self, state: &str) -> String;
}
