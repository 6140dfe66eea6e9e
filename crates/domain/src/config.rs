//! Client configuration and credentials
//!
//! `ClientConfig` is immutable once a client has been constructed; every
//! component holds a read-only view of it. `Credentials` selects one of the
//! two mutually exclusive authentication modes.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT, DEFAULT_REDIRECT_URI,
    DEFAULT_SCOPES, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
use crate::errors::{BokioError, Result};

/// Tunables for the HTTP client core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// Per-attempt HTTP timeout
    #[serde(rename = "timeout_secs", with = "crate::utils::serde::duration_secs")]
    pub timeout: Duration,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    /// Requests per second; `0` disables the limiter
    pub rate_limit: u32,
    /// Block every verb except GET/HEAD/OPTIONS
    pub read_only: bool,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            rate_limit: DEFAULT_RATE_LIMIT,
            read_only: false,
            scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Base URL with any trailing slash removed, ready for `{base}{path}`
    #[must_use]
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Whether outbound requests are admission-controlled
    #[must_use]
    pub fn rate_limit_enabled(&self) -> bool {
        self.rate_limit > 0
    }

    /// Reject configurations no client could run with
    ///
    /// # Errors
    /// Returns `BokioError::Config` for an empty base URL or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(BokioError::Config("base_url must not be empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(BokioError::Config("timeout must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Authentication material supplied at construction
///
/// The two variants never mix: an OAuth client goes through the token
/// endpoint, an integration-token client never does.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum Credentials {
    #[serde(rename = "oauth")]
    OAuth { client_id: String, client_secret: String },
    #[serde(rename = "integration_token")]
    IntegrationToken { token: String },
}

impl Credentials {
    /// Check that the mode has everything it needs
    ///
    /// Integration tokens are taken verbatim: a whitespace-only token is
    /// non-empty and therefore accepted.
    ///
    /// # Errors
    /// Returns `BokioError::Config` naming the missing field.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::OAuth { client_id, client_secret } => {
                if client_id.is_empty() {
                    return Err(BokioError::Config("client_id is required".into()));
                }
                if client_secret.is_empty() {
                    return Err(BokioError::Config("client_secret is required".into()));
                }
                Ok(())
            }
            Self::IntegrationToken { token } => {
                if token.is_empty() {
                    return Err(BokioError::Config("integration token is required".into()));
                }
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn is_integration_token(&self) -> bool {
        matches!(self, Self::IntegrationToken { .. })
    }
}

// Secrets never reach logs through `{:?}`.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OAuth { client_id, .. } => f
                .debug_struct("OAuth")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Self::IntegrationToken { .. } => {
                f.debug_struct("IntegrationToken").field("token", &"<redacted>").finish()
            }
        }
    }
}

/// Everything needed to construct a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    pub credentials: Credentials,
}
