use std::time::Duration;

use bokio_common::resilience::{
    BackoffStrategy, RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryPolicy,
};
use bokio_domain::BokioError;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::InfraError;

/// HTTP client with built-in retry and timeout support.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    retry: RetryExecutor<StatusRetryPolicy>,
}

/// Why a single attempt did not produce a final response
#[derive(Debug)]
pub enum AttemptError {
    /// A response with a retryable status (5xx or 429)
    Status(Response),
    /// No response at all
    Transport(reqwest::Error),
    /// The request body cannot be replayed
    Unclonable,
}

/// Retry predicate for HTTP attempts
///
/// Status `>= 500` and `429` are transient. A numeric `Retry-After` on a 429
/// replaces the computed backoff. Connection failures are retried; timeouts
/// and every other transport failure are not.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusRetryPolicy;

impl RetryPolicy<AttemptError> for StatusRetryPolicy {
    fn should_retry(&self, error: &AttemptError, _attempt: u32) -> RetryDecision {
        match error {
            AttemptError::Status(response) => {
                if response.status() == StatusCode::TOO_MANY_REQUESTS {
                    if let Some(delay) = retry_after(response.headers()) {
                        return RetryDecision::RetryAfter(delay);
                    }
                }
                RetryDecision::Retry
            }
            AttemptError::Transport(err) if err.is_connect() && !err.is_timeout() => {
                RetryDecision::Retry
            }
            AttemptError::Transport(_) | AttemptError::Unclonable => RetryDecision::Stop,
        }
    }
}

/// Status codes the retry policy treats as transient
#[must_use]
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Underlying reqwest client, shared with the token endpoint client
    pub const fn inner(&self) -> &ReqwestClient {
        &self.client
    }

    /// Retry configuration applied by [`HttpClient::send`]
    pub const fn retry_config(&self) -> &RetryConfig {
        self.retry.config()
    }

    /// Execute the provided request builder with retry semantics.
    ///
    /// A response whose status stays retryable after the last attempt is
    /// returned as `Ok` so the caller can classify it.
    ///
    /// # Errors
    /// `Cancelled` when `cancel` fires, `Timeout` when the configured
    /// timeout elapses, `Network` for transport failures.
    pub async fn send(
        &self,
        cancel: &CancellationToken,
        builder: RequestBuilder,
    ) -> Result<Response, BokioError> {
        let request = builder.build().map_err(|err| BokioError::from(InfraError::from(err)))?;
        let method = request.method().clone();
        let url = request.url().clone();
        let client = &self.client;

        let result = self
            .retry
            .execute(cancel, |attempt| {
                let request = request.try_clone();
                let method = method.clone();
                let url = url.clone();
                async move {
                    let Some(request) = request else {
                        return Err(AttemptError::Unclonable);
                    };
                    debug!(attempt = attempt + 1, %method, %url, "sending HTTP request");

                    match client.execute(request).await {
                        Ok(response) => {
                            let status = response.status();
                            debug!(
                                attempt = attempt + 1,
                                %method,
                                %url,
                                %status,
                                "received HTTP response"
                            );
                            if is_retryable_status(status) {
                                Err(AttemptError::Status(response))
                            } else {
                                Ok(response)
                            }
                        }
                        Err(err) => {
                            debug!(
                                attempt = attempt + 1,
                                %method,
                                %url,
                                error = %err,
                                "HTTP request failed"
                            );
                            Err(AttemptError::Transport(err))
                        }
                    }
                }
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(RetryError::Exhausted { attempts, source: AttemptError::Status(response) }) => {
                warn!(
                    attempts,
                    %method,
                    %url,
                    status = %response.status(),
                    "HTTP retries exhausted, returning last response"
                );
                Ok(response)
            }
            Err(RetryError::NonRetryable { source: AttemptError::Status(response) }) => {
                Ok(response)
            }
            Err(
                RetryError::Exhausted { source: AttemptError::Transport(err), .. }
                | RetryError::NonRetryable { source: AttemptError::Transport(err) },
            ) => Err(InfraError::from(err).into()),
            Err(
                RetryError::Exhausted { source: AttemptError::Unclonable, .. }
                | RetryError::NonRetryable { source: AttemptError::Unclonable },
            ) => Err(BokioError::Internal(
                "request body cannot be cloned; buffer the body to enable retries".into(),
            )),
            Err(RetryError::Cancelled) => Err(BokioError::Cancelled),
            Err(RetryError::InvalidConfiguration { message }) => Err(BokioError::Config(message)),
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    retry: RetryConfig,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            user_agent: None,
        }
    }
}

impl HttpClientBuilder {
    /// Per-attempt request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the number of retries after the initial try.
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.retry.max_attempts = retries.saturating_add(1);
        self
    }

    /// First backoff delay; later delays grow exponentially from it.
    #[must_use]
    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        let (base, max_delay) = match self.retry.backoff {
            BackoffStrategy::Exponential { base, max_delay, .. } => {
                (base, max_delay)
            }
            _ => (2.0, self.retry.max_delay),
        };
        self.retry.backoff = BackoffStrategy::Exponential {
            initial_delay: backoff,
            base,
            max_delay,
        };
        self
    }

    /// Replace the whole retry configuration.
    #[must_use]
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// `User-Agent` header sent with every request
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    ///
    /// # Errors
    /// Returns `BokioError::Config` for an invalid retry configuration or if
    /// reqwest cannot build its client.
    pub fn build(self) -> Result<HttpClient, BokioError> {
        self.retry.validate().map_err(|e| BokioError::Config(e.to_string()))?;

        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            BokioError::from(infra)
        })?;

        Ok(HttpClient { client, retry: RetryExecutor::new(self.retry, StatusRetryPolicy) })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use reqwest::{Method, StatusCode};
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_with_defaults() -> HttpClient {
        HttpClient::builder()
            .base_backoff(Duration::from_millis(10))
            .max_retries(2)
            .build()
            .expect("http client")
    }

    #[tokio::test]
    async fn returns_successful_response_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let cancel = CancellationToken::new();
        let response = client
            .send(&cancel, client.request(Method::GET, server.uri()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                let current = attempts_clone.fetch_add(1, Ordering::SeqCst);
                if current < 2 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let cancel = CancellationToken::new();
        let response = client
            .send(&cancel, client.request(Method::GET, server.uri()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_response_after_exhaustion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let cancel = CancellationToken::new();
        let response = client
            .send(&cancel, client.request(Method::GET, server.uri()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let cancel = CancellationToken::new();
        let response = client
            .send(&cancel, client.request(Method::GET, server.uri()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn retries_rate_limited_responses() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(429).insert_header("Retry-After", "0")
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let cancel = CancellationToken::new();
        let response = client
            .send(&cancel, client.request(Method::GET, server.uri()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retries_on_network_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED
        let url = format!("http://{addr}");

        let client = HttpClient::builder()
            .base_backoff(Duration::from_millis(5))
            .max_retries(1)
            .build()
            .expect("http client");

        let cancel = CancellationToken::new();
        let result = client.send(&cancel, client.request(Method::GET, &url)).await;
        match result {
            Err(BokioError::Network(msg)) => {
                assert!(msg.to_lowercase().contains("http"));
            }
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeouts_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = HttpClient::builder()
            .timeout(Duration::from_millis(50))
            .base_backoff(Duration::from_millis(500))
            .max_retries(3)
            .build()
            .expect("http client");

        let cancel = CancellationToken::new();
        let started = Instant::now();
        let result = client.send(&cancel, client.request(Method::GET, server.uri())).await;

        assert!(matches!(result, Err(BokioError::Timeout(_))), "got {result:?}");
        assert!(started.elapsed() < Duration::from_millis(450));
    }

    #[tokio::test]
    async fn cancelled_token_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.send(&cancel, client.request(Method::GET, server.uri())).await;
        assert_eq!(result.unwrap_err(), BokioError::Cancelled);
    }

    #[tokio::test]
    async fn sends_configured_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "Bokio-Test/1.0"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::builder().user_agent("Bokio-Test/1.0").build().unwrap();
        let cancel = CancellationToken::new();
        let response =
            client.send(&cancel, client.request(Method::GET, server.uri())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn retry_after_parses_seconds_only() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "7".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert_eq!(retry_after(&headers), None);
    }
}
