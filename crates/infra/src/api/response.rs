//! Buffered API response
//!
//! The body is read once inside the request path so that both the success
//! and the error path can hand the raw bytes back to the caller.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::errors::ApiError;

/// Status, headers and raw body of a completed request
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    #[must_use]
    pub const fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self { status, headers, body }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as UTF-8, lossily
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Decode the body as JSON
    ///
    /// An empty body decodes as JSON `null`, so `Option<T>` and `()` work
    /// for 204 responses.
    ///
    /// # Errors
    /// Returns `ApiError::Decode` with the raw body preserved.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let parsed = if self.body.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_slice(&self.body)
        };
        parsed.map_err(|e| ApiError::Decode { message: e.to_string(), body: self.text() })
    }

    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}
