//! API-specific error types
//!
//! Provides the public error taxonomy of the client and the structured error
//! body Bokio returns for failed requests.

use std::fmt;
use std::time::Duration;

use bokio_domain::BokioError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::response::ApiResponse;

/// Categories of API errors for caller branching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// 401, 403 or no usable token
    Authentication,
    /// 429 that survived every retry
    RateLimit,
    /// 5xx that survived every retry
    Server,
    /// Other 4xx
    Client,
    /// Transport failures and timeouts
    Network,
    /// Configuration errors or misuse of the client
    Config,
    /// Caller cancellation
    Cancelled,
    /// Response body did not decode
    Decode,
}

/// Structured error data returned by the Bokio API
///
/// Bokio answers failures with `{"code": ..., "message": ..., "details": ...}`.
/// `code` is a string on most endpoints and a number on a few, so both are
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// HTTP status of the response, always the real one
    pub http_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Deserialize)]
struct RawErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

const FALLBACK_MESSAGE: &str = "API request failed";

impl ApiErrorBody {
    /// Parse an error response, falling back to the raw body
    #[must_use]
    pub fn from_response(response: &ApiResponse) -> Self {
        Self::parse(response.status().as_u16(), response.body())
    }

    /// Parse `body` as the Bokio error shape
    ///
    /// Anything that is not a JSON object with that shape becomes
    /// `{message: "API request failed", details: <raw body>}`.
    #[must_use]
    pub fn parse(http_status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<RawErrorBody>(body) {
            Ok(raw) => Self {
                http_status,
                code: raw.code.and_then(value_to_string),
                message: raw
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
                details: raw.details.and_then(value_to_string),
            },
            Err(_) => {
                let raw = String::from_utf8_lossy(body).into_owned();
                Self {
                    http_status,
                    code: None,
                    message: FALLBACK_MESSAGE.to_string(),
                    details: if raw.is_empty() { None } else { Some(raw) },
                }
            }
        }
    }
}

fn value_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bokio API error {}: {}", self.http_status, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(
        "operation '{operation}' not allowed in read-only mode. Set BOKIO_READ_ONLY=false to enable write operations"
    )]
    ReadOnly { operation: String },

    #[error("not authenticated: complete the OAuth authorization flow first")]
    NotAuthenticated,

    #[error("no refresh token available")]
    NoRefreshToken,

    /// Classified error response; the raw response rides along
    #[error("{error}")]
    Api { error: ApiErrorBody, response: Box<ApiResponse> },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("failed to decode response: {message}")]
    Decode { message: String, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("operation not supported with this authentication mode: {0}")]
    Unsupported(String),

    /// The client was shut down; no further requests are admitted
    #[error("client has been shut down")]
    Closed,

    /// Local failure outside the API contract, such as an unserializable body
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the error category for this error
    #[must_use]
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Api { error, .. } => match error.http_status {
                401 | 403 => ApiErrorCategory::Authentication,
                429 => ApiErrorCategory::RateLimit,
                500..=599 => ApiErrorCategory::Server,
                _ => ApiErrorCategory::Client,
            },
            Self::NotAuthenticated | Self::NoRefreshToken => ApiErrorCategory::Authentication,
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::Cancelled => ApiErrorCategory::Cancelled,
            Self::Decode { .. } => ApiErrorCategory::Decode,
            Self::Config(_)
            | Self::ReadOnly { .. }
            | Self::UnsupportedMethod(_)
            | Self::Unsupported(_)
            | Self::Closed
            | Self::Internal(_) => ApiErrorCategory::Config,
        }
    }

    /// HTTP status, when the error carries a response
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { response, .. } => Some(response.status()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly { .. })
    }

    /// Raw response behind an API error
    #[must_use]
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            Self::Api { response, .. } => Some(response.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn body(&self) -> Option<&ApiErrorBody> {
        match self {
            Self::Api { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<BokioError> for ApiError {
    fn from(err: BokioError) -> Self {
        match err {
            BokioError::Config(msg) => Self::Config(msg),
            BokioError::Network(msg) => Self::Network(msg),
            // The configured timeout is not known here; the client maps
            // timeouts itself when it is.
            BokioError::Timeout(_) => Self::Timeout(Duration::ZERO),
            BokioError::Cancelled => Self::Cancelled,
            BokioError::Decode(message) => Self::Decode { message, body: String::new() },
            BokioError::Internal(msg) => Self::Internal(msg),
        }
    }
}
