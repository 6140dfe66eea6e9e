//! Conversions from external infrastructure errors into domain errors.

use bokio_domain::BokioError;
use reqwest::Error as HttpError;
use serde_json::Error as JsonError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub BokioError);

impl From<InfraError> for BokioError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<BokioError> for InfraError {
    fn from(value: BokioError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoBokioError {
    fn into_bokio(self) -> BokioError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → BokioError */
/* -------------------------------------------------------------------------- */

impl IntoBokioError for HttpError {
    fn into_bokio(self) -> BokioError {
        if self.is_timeout() {
            return BokioError::Timeout("HTTP request timed out".into());
        }

        if self.is_connect() {
            return BokioError::Network(format!("HTTP connection failure: {self}"));
        }

        if self.is_builder() {
            return BokioError::Config(format!("invalid HTTP request: {self}"));
        }

        if self.is_decode() || self.is_body() {
            return BokioError::Decode(self.to_string());
        }

        BokioError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_bokio())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → BokioError */
/* -------------------------------------------------------------------------- */

impl IntoBokioError for JsonError {
    fn into_bokio(self) -> BokioError {
        BokioError::Decode(format!("invalid JSON: {self}"))
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        Self(value.into_bokio())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
