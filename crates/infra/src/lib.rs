//! # Bokio Infrastructure
//!
//! I/O side of the Bokio client: the HTTP transport, the API façade and
//! configuration loading.
//!
//! This crate contains:
//! - The retrying HTTP client
//! - `BokioClient`, the authenticated request executor
//! - Configuration loading from the environment and TOML/JSON files
//!
//! ## Architecture
//! - Builds on the token lifecycle and resilience primitives in
//!   `bokio-common`
//! - Depends on `bokio-domain` for configuration and error types
//! - Contains all "impure" code (network, filesystem, environment)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;

// Re-export commonly used items
pub use api::{
    AccessTokenProvider, ApiError, ApiErrorBody, ApiErrorCategory, ApiResponse, BokioClient,
    BokioClientBuilder,
};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use reqwest::Method;
