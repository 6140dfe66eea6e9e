//! Bokio API façade
//!
//! The request executor and everything a caller touches directly: the
//! client and its builder, the authentication providers behind it, the
//! buffered response, and the public error taxonomy.
//!
//! # Architecture
//!
//! - Uses the retrying `HttpClient` (no direct reqwest sends)
//! - One `AccessTokenProvider` per client: OAuth or integration token
//! - Token-bucket admission ahead of every resource request
//! - Read-only mode rejects mutating verbs before any I/O

pub mod auth;
pub mod client;
pub mod errors;
pub mod response;

pub use auth::{AccessTokenProvider, OAuthTokenProvider, StaticTokenProvider, TenantInfo};
pub use client::{BokioClient, BokioClientBuilder};
pub use errors::{ApiError, ApiErrorBody, ApiErrorCategory};
pub use response::ApiResponse;
