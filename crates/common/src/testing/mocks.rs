//! Mock implementations for testing
//!
//! `MockOAuthClient` stands in for the Bokio token endpoint. It counts
//! calls per grant type so tests can assert how many round trips a code
//! path made.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::{OAuthClientError, OAuthClientTrait, TokenSet};

/// Mock OAuth client that simulates token grants without network calls.
#[derive(Clone, Debug, Default)]
pub struct MockOAuthClient {
    exchange_calls: Arc<AtomicUsize>,
    refresh_calls: Arc<AtomicUsize>,
    client_credentials_calls: Arc<AtomicUsize>,
    last_refresh_token: Arc<Mutex<Option<String>>>,
    refresh_response: Arc<Mutex<Option<TokenSet>>>,
    should_fail: Arc<AtomicBool>,
    delay: Arc<Mutex<Duration>>,
}

impl MockOAuthClient {
    /// Create a new mock OAuth client with default state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the response returned by `refresh_access_token`.
    pub fn set_refresh_response(&self, tokens: TokenSet) {
        *self.refresh_response.lock() = Some(tokens);
    }

    /// Force every grant to fail with a 401 from the endpoint.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Delay every grant, to widen race windows or test cancellation.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn client_credentials_calls(&self) -> usize {
        self.client_credentials_calls.load(Ordering::SeqCst)
    }

    /// Refresh token presented on the most recent refresh.
    #[must_use]
    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().clone()
    }

    async fn simulate(&self) -> Result<(), OAuthClientError> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(OAuthClientError::Endpoint {
                status: 401,
                body: r#"{"code":"invalid_grant","message":"Token rejected"}"#.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OAuthClientTrait for MockOAuthClient {
    async fn exchange_code_for_tokens(&self, _code: &str) -> Result<TokenSet, OAuthClientError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(TokenSet::new("mock-access-token".into(), Some("mock-refresh-token".into()), 3600)
            .with_tenant(Some("mock-tenant".into()), Some("company".into())))
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_token.lock() = Some(refresh_token.to_string());

        if refresh_token.is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }
        self.simulate().await?;

        let configured = self.refresh_response.lock().clone();
        Ok(configured
            .unwrap_or_else(|| TokenSet::new("refreshed-access-token".into(), None, 3600)))
    }

    async fn client_credentials(&self) -> Result<TokenSet, OAuthClientError> {
        self.client_credentials_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;
        Ok(TokenSet::new("mock-machine-token".into(), None, 3600)
            .with_tenant(Some("mock-tenant".into()), Some("company".into())))
    }

    fn authorization_url(&self, state: &str) -> String {
        format!("https://mock.bokio.se/authorize?response_type=code&state={state}")
    }
}
