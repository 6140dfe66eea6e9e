//! Shared fixtures for the client integration tests

#![allow(dead_code)]

use std::time::Duration;

use bokio_domain::{ClientConfig, Credentials};
use bokio_infra::BokioClient;
use serde_json::{json, Value};
use wiremock::MockServer;

/// Config pointed at the mock server, limiter off, fast retries
pub fn client_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
        rate_limit: 0,
        ..ClientConfig::default()
    }
}

pub fn integration_credentials(token: &str) -> Credentials {
    Credentials::IntegrationToken { token: token.to_string() }
}

pub fn oauth_credentials() -> Credentials {
    Credentials::OAuth { client_id: "client".to_string(), client_secret: "secret".to_string() }
}

/// Build a client with a 5ms fixed backoff so retry tests stay quick
pub fn build_client(config: ClientConfig, credentials: Credentials) -> BokioClient {
    BokioClient::builder()
        .config(config)
        .credentials(credentials)
        .base_backoff(Duration::from_millis(5))
        .build()
        .expect("client should build")
}

/// Token endpoint body in the shape Bokio returns
pub fn token_response(access: &str, refresh: Option<&str>, expires_in: i64) -> Value {
    json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": expires_in,
        "refresh_token": refresh,
        "tenant_id": "company-42",
        "tenant_type": "company"
    })
}
