//! HTTP transport with retry

pub mod client;

pub use client::{is_retryable_status, AttemptError, HttpClient, HttpClientBuilder, StatusRetryPolicy};
