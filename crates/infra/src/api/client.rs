//! Bokio API client
//!
//! Every resource call passes through [`BokioClient::execute`], which runs
//! the same pipeline for both authentication modes:
//!
//! 1. read-only gate (no I/O, no permit, no token check)
//! 2. rate limiter admission
//! 3. bearer token from the [`AccessTokenProvider`], refreshing if needed
//! 4. HTTP dispatch through the retrying [`HttpClient`]
//! 5. classification: `< 400` is success, anything else an [`ApiError::Api`]

use std::sync::Arc;
use std::time::Duration;

use bokio_common::auth::{OAuthClient, OAuthConfig, TokenSet};
use bokio_common::resilience::{RateLimitError, RateLimiter, RetryConfig};
use bokio_domain::{BokioError, ClientConfig, Credentials};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::auth::{AccessTokenProvider, OAuthTokenProvider, StaticTokenProvider, TenantInfo};
use super::errors::{ApiError, ApiErrorBody};
use super::response::ApiResponse;
use crate::http::HttpClient;

const JSON: &str = "application/json";

/// Authenticated, rate-limited, retrying client for the Bokio API
pub struct BokioClient {
    config: ClientConfig,
    http: HttpClient,
    auth: Arc<dyn AccessTokenProvider>,
    limiter: RateLimiter,
}

impl BokioClient {
    /// Create a new API client
    ///
    /// Must be called inside a Tokio runtime when rate limiting is enabled,
    /// since the limiter's replenishment task starts here.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` for invalid configuration or credentials
    pub fn new(config: ClientConfig, credentials: Credentials) -> Result<Self, ApiError> {
        Self::builder().config(config).credentials(credentials).build()
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> BokioClientBuilder {
        BokioClientBuilder::default()
    }

    /// Execute a request and return the buffered response
    ///
    /// `body` is serialized as JSON; `None` sends no body and no
    /// `Content-Type`.
    ///
    /// # Errors
    ///
    /// - `ReadOnly` for a mutating verb in read-only mode, before any I/O
    /// - `Cancelled` / `Timeout` if `cancel` fires or the HTTP timeout elapses
    /// - `NotAuthenticated` / `NoRefreshToken` / auth endpoint errors
    /// - `Api` for any status `>= 400` after retries
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn execute<B>(
        &self,
        cancel: &CancellationToken,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse, ApiError>
    where
        B: Serialize + ?Sized,
    {
        if !is_supported_method(&method) {
            return Err(ApiError::UnsupportedMethod(method.to_string()));
        }

        if self.config.read_only && is_mutating(&method) {
            let operation = format!("{method} {path}");
            debug!(operation = %operation, "Blocked mutating request in read-only mode");
            return Err(ApiError::ReadOnly { operation });
        }

        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| ApiError::Internal(format!("Failed to serialize body: {e}")))?;

        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        self.limiter.acquire(cancel).await.map_err(|e| match e {
            RateLimitError::Cancelled => ApiError::Cancelled,
            RateLimitError::Closed => ApiError::Closed,
            RateLimitError::InvalidConfiguration(msg) => ApiError::Config(msg),
        })?;

        let token = self.auth.access_token(cancel).await?;

        let url = self.url(path);
        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header(ACCEPT, JSON);
        if let Some(payload) = payload {
            request = request.header(CONTENT_TYPE, JSON).body(payload);
        }

        let response =
            self.http.send(cancel, request).await.map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ApiError::Cancelled),
            bytes = response.bytes() => bytes.map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout(self.config.timeout)
                } else {
                    ApiError::Network(format!("Failed to read response body: {e}"))
                }
            })?,
        };

        let response = ApiResponse::new(status, headers, bytes.to_vec());
        Self::classify(response)
    }

    /// Execute a GET request and decode the JSON response
    ///
    /// # Errors
    ///
    /// As [`Self::execute`], plus `Decode` if the body does not match `T`
    pub async fn get<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<T, ApiError> {
        self.execute(cancel, Method::GET, path, None::<&()>).await?.json()
    }

    /// Execute a POST request with a JSON body
    ///
    /// # Errors
    ///
    /// As [`Self::get`]
    pub async fn post<B, T>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(cancel, Method::POST, path, Some(body)).await?.json()
    }

    /// Execute a PUT request with a JSON body
    ///
    /// # Errors
    ///
    /// As [`Self::get`]
    pub async fn put<B, T>(&self, cancel: &CancellationToken, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(cancel, Method::PUT, path, Some(body)).await?.json()
    }

    /// Execute a PATCH request with a JSON body
    ///
    /// # Errors
    ///
    /// As [`Self::get`]
    pub async fn patch<B, T>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(cancel, Method::PATCH, path, Some(body)).await?.json()
    }

    /// Execute a DELETE request
    ///
    /// # Errors
    ///
    /// As [`Self::execute`]
    pub async fn delete(&self, cancel: &CancellationToken, path: &str) -> Result<ApiResponse, ApiError> {
        self.execute(cancel, Method::DELETE, path, None::<&()>).await
    }

    /// # Errors
    ///
    /// As [`Self::execute`]
    pub async fn head(&self, cancel: &CancellationToken, path: &str) -> Result<ApiResponse, ApiError> {
        self.execute(cancel, Method::HEAD, path, None::<&()>).await
    }

    /// # Errors
    ///
    /// As [`Self::execute`]
    pub async fn options(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<ApiResponse, ApiError> {
        self.execute(cancel, Method::OPTIONS, path, None::<&()>).await
    }

    /// Exchange an authorization code for tokens (OAuth mode)
    ///
    /// # Errors
    ///
    /// `Unsupported` in integration-token mode; otherwise the token
    /// endpoint or cancellation error
    #[instrument(skip_all)]
    pub async fn exchange_code_for_token(
        &self,
        cancel: &CancellationToken,
        code: &str,
    ) -> Result<(), ApiError> {
        self.auth.exchange_code(cancel, code).await
    }

    /// Authenticate with the client credentials grant (OAuth mode)
    ///
    /// # Errors
    ///
    /// As [`Self::exchange_code_for_token`]
    #[instrument(skip_all)]
    pub async fn authenticate_client_credentials(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        self.auth.authenticate_client_credentials(cancel).await
    }

    /// Force a token refresh
    ///
    /// # Errors
    ///
    /// `NoRefreshToken` if none is held (always, in integration-token mode)
    #[instrument(skip_all)]
    pub async fn refresh_access_token(&self, cancel: &CancellationToken) -> Result<(), ApiError> {
        self.auth.refresh(cancel).await
    }

    /// Authorization URL for an external UI to present
    ///
    /// # Errors
    ///
    /// `Unsupported` in integration-token mode
    pub fn authorization_url(&self, state: &str) -> Result<String, ApiError> {
        self.auth.authorization_url(state)
    }

    /// Whether a usable access token is currently held
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    /// Whether mutating methods are refused locally
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    /// Tenant identifiers from the last token response
    #[must_use]
    pub fn tenant_info(&self) -> TenantInfo {
        self.auth.tenant_info()
    }

    /// Import tokens persisted elsewhere (OAuth mode)
    ///
    /// # Errors
    ///
    /// `Unsupported` in integration-token mode
    pub fn set_tokens(&self, tokens: TokenSet) -> Result<(), ApiError> {
        self.auth.set_tokens(tokens)
    }

    /// Export the current tokens; `None` in integration-token mode
    #[must_use]
    pub fn tokens(&self) -> Option<TokenSet> {
        self.auth.tokens()
    }

    /// Configuration the client was built with
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// API base URL without a trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.config.normalized_base_url()
    }

    /// Stop the rate limiter's replenishment task
    pub async fn shutdown(&self) {
        self.limiter.shutdown().await;
        info!("Bokio client shut down");
    }

    fn url(&self, path: &str) -> String {
        let base = self.config.normalized_base_url();
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    fn classify(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.status().as_u16() < 400 {
            return Ok(response);
        }

        let body = ApiErrorBody::from_response(&response);
        error!(
            status = body.http_status,
            code = body.code.as_deref().unwrap_or(""),
            message = %body.message,
            "Bokio API returned an error"
        );
        Err(ApiError::Api { error: body, response: Box::new(response) })
    }

    fn map_transport_error(&self, err: BokioError) -> ApiError {
        match err {
            BokioError::Timeout(_) => ApiError::Timeout(self.config.timeout),
            other => other.into(),
        }
    }
}

impl std::fmt::Debug for BokioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BokioClient")
            .field("config", &self.config)
            .field("rate_limited", &self.limiter.is_enabled())
            .finish_non_exhaustive()
    }
}

fn is_supported_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET
            | Method::HEAD
            | Method::OPTIONS
            | Method::POST
            | Method::PUT
            | Method::PATCH
            | Method::DELETE
    )
}

fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Builder for API client
#[derive(Default)]
pub struct BokioClientBuilder {
    config: Option<ClientConfig>,
    credentials: Option<Credentials>,
    auth: Option<Arc<dyn AccessTokenProvider>>,
    retry: Option<RetryConfig>,
    base_backoff: Option<Duration>,
}

impl BokioClientBuilder {
    /// Set the client configuration
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the credentials the auth provider is built from
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Use a custom authentication provider instead of credentials
    #[must_use]
    pub fn auth(mut self, auth: Arc<dyn AccessTokenProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Replace the retry schedule entirely, attempt count included
    #[must_use]
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Fixed, unjittered delay between retries; the attempt count still
    /// follows `max_retries`
    #[must_use]
    pub const fn base_backoff(mut self, delay: Duration) -> Self {
        self.base_backoff = Some(delay);
        self
    }

    /// Build the API client
    ///
    /// # Errors
    ///
    /// Returns error if required fields are missing or client creation fails
    pub fn build(self) -> Result<BokioClient, ApiError> {
        let config = self.config.unwrap_or_default();
        config.validate().map_err(ApiError::from)?;

        let retry = match (self.retry, self.base_backoff) {
            (Some(retry), _) => retry,
            (None, Some(delay)) => RetryConfig::builder()
                .max_attempts(config.max_retries.saturating_add(1))
                .fixed_backoff(delay)
                .no_jitter()
                .build()
                .map_err(|e| ApiError::Config(e.to_string()))?,
            (None, None) => RetryConfig::from_max_retries(config.max_retries),
        };
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .retry_config(retry)
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build HttpClient: {e}")))?;

        let auth: Arc<dyn AccessTokenProvider> = match (self.auth, self.credentials) {
            (Some(auth), _) => auth,
            (None, Some(credentials)) => auth_from_credentials(&config, &http, credentials)?,
            (None, None) => {
                return Err(ApiError::Config("Credentials or auth provider not set".to_string()))
            }
        };

        let limiter = RateLimiter::per_second(config.rate_limit)
            .map_err(|e| ApiError::Config(format!("Failed to create rate limiter: {e}")))?;

        info!(
            base_url = %config.normalized_base_url(),
            read_only = config.read_only,
            rate_limit = config.rate_limit,
            max_retries = config.max_retries,
            "Bokio client created"
        );

        Ok(BokioClient { config, http, auth, limiter })
    }
}

fn auth_from_credentials(
    config: &ClientConfig,
    http: &HttpClient,
    credentials: Credentials,
) -> Result<Arc<dyn AccessTokenProvider>, ApiError> {
    credentials.validate().map_err(ApiError::from)?;

    match credentials {
        Credentials::IntegrationToken { token } => Ok(Arc::new(StaticTokenProvider::new(token))),
        Credentials::OAuth { client_id, client_secret } => {
            let oauth_config = OAuthConfig::new(
                config.normalized_base_url().to_string(),
                client_id,
                client_secret,
                config.redirect_uri.clone(),
                config.scopes.clone(),
            );
            let client = OAuthClient::with_http_client(oauth_config, http.inner().clone());
            Ok(Arc::new(OAuthTokenProvider::new(client, config.timeout)))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Clone)]
    struct MockAuthProvider {
        token: String,
        calls: Arc<AtomicUsize>,
    }

    impl MockAuthProvider {
        fn new(token: &str) -> Self {
            Self { token: token.to_string(), calls: Arc::new(AtomicUsize::new(0)) }
        }
    }

    #[async_trait]
    impl AccessTokenProvider for MockAuthProvider {
        async fn access_token(&self, _cancel: &CancellationToken) -> Result<String, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.token.clone())
        }

        fn is_authenticated(&self) -> bool {
            true
        }
    }

    struct UnauthenticatedProvider;

    #[async_trait]
    impl AccessTokenProvider for UnauthenticatedProvider {
        async fn access_token(&self, _cancel: &CancellationToken) -> Result<String, ApiError> {
            Err(ApiError::NotAuthenticated)
        }

        fn is_authenticated(&self) -> bool {
            false
        }
    }

    fn config(base_url: String) -> ClientConfig {
        ClientConfig { base_url, rate_limit: 0, ..ClientConfig::default() }
    }

    fn client(server: &MockServer, auth: Arc<dyn AccessTokenProvider>) -> BokioClient {
        BokioClient::builder()
            .config(config(server.uri()))
            .auth(auth)
            .base_backoff(Duration::from_millis(5))
            .build()
            .unwrap()
    }

    #[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq)]
    struct TestResponse {
        message: String,
    }

    #[tokio::test]
    async fn test_get_with_json_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test"))
            .and(header("Authorization", "Bearer test-token"))
            .and(header("Accept", "application/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(TestResponse { message: "success".to_string() }),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server, Arc::new(MockAuthProvider::new("test-token")));

        let result: TestResponse = client.get(&CancellationToken::new(), "/test").await.unwrap();
        assert_eq!(result.message, "success");
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/customers"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(json!({"name": "X"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "c-1"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server, Arc::new(MockAuthProvider::new("test-token")));

        let created: serde_json::Value = client
            .post(&CancellationToken::new(), "/customers", &json!({"name": "X"}))
            .await
            .unwrap();
        assert_eq!(created["id"], "c-1");
    }

    #[tokio::test]
    async fn test_get_with_204_no_content() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/no-content"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server, Arc::new(MockAuthProvider::new("test-token")));

        // () should deserialize from null successfully
        let result: Result<(), ApiError> = client.get(&CancellationToken::new(), "/no-content").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_path_without_leading_slash() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/companies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server, Arc::new(MockAuthProvider::new("test-token")));
        let result: Vec<serde_json::Value> =
            client.get(&CancellationToken::new(), "companies").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_not_found_is_classified_without_retry() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/journal-entries/42"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"code": "not_found", "message": "Journal entry not found"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server, Arc::new(MockAuthProvider::new("test-token")));

        let err = client
            .execute(&CancellationToken::new(), Method::GET, "/journal-entries/42", None::<&()>)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        let body = err.body().unwrap();
        assert_eq!(body.http_status, 404);
        assert_eq!(body.code.as_deref(), Some("not_found"));
        assert_eq!(body.message, "Journal entry not found");
    }

    #[tokio::test]
    async fn test_decode_error_keeps_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server, Arc::new(MockAuthProvider::new("test-token")));
        let err = client.get::<TestResponse>(&CancellationToken::new(), "/x").await.unwrap_err();

        match err {
            ApiError::Decode { body, .. } => assert_eq!(body, "not json"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_auth_failure_sends_nothing() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = client(&mock_server, Arc::new(UnauthenticatedProvider));
        let err = client
            .execute(&CancellationToken::new(), Method::GET, "/x", None::<&()>)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_read_only_skips_token_lookup() {
        let mock_server = MockServer::start().await;
        let auth = MockAuthProvider::new("test-token");
        let calls = Arc::clone(&auth.calls);

        let client = BokioClient::builder()
            .config(ClientConfig { read_only: true, ..config(mock_server.uri()) })
            .auth(Arc::new(auth))
            .build()
            .unwrap();

        let err = client.delete(&CancellationToken::new(), "/customers/1").await.unwrap_err();
        assert!(err.is_read_only());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(client.is_read_only());
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let mock_server = MockServer::start().await;
        let client = client(&mock_server, Arc::new(MockAuthProvider::new("test-token")));

        let err = client
            .execute(&CancellationToken::new(), Method::TRACE, "/x", None::<&()>)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMethod(m) if m == "TRACE"));
    }

    #[tokio::test]
    async fn test_builder_missing_auth() {
        let result = BokioClient::builder().config(ClientConfig::default()).build();
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[tokio::test]
    async fn test_empty_credentials_rejected() {
        let result = BokioClient::new(
            ClientConfig::default(),
            Credentials::OAuth { client_id: String::new(), client_secret: "s".into() },
        );
        assert!(matches!(result, Err(ApiError::Config(msg)) if msg.contains("client_id")));

        let result = BokioClient::new(
            ClientConfig::default(),
            Credentials::IntegrationToken { token: String::new() },
        );
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[tokio::test]
    async fn test_base_url_is_normalized() {
        let client = BokioClient::new(
            ClientConfig { base_url: "https://api.bokio.se/".into(), ..ClientConfig::default() },
            Credentials::IntegrationToken { token: "abc".into() },
        )
        .unwrap();

        assert_eq!(client.base_url(), "https://api.bokio.se");
        assert_eq!(client.url("/companies"), "https://api.bokio.se/companies");
        client.shutdown().await;
    }
}
