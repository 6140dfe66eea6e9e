//! Reusable runtime primitives shared across the Bokio client crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `runtime`: async resilience (token-bucket rate limiting, retry)
//! - `platform`: OAuth 2.0 token lifecycle (token store, token endpoint
//!   client, token manager)
//! - `test-utils`: mock token endpoint client for downstream tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod auth;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(all(feature = "platform", any(feature = "test-utils", test)))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "platform")]
pub use auth::{
    MemoryTokenStore, OAuthClient, OAuthClientError, OAuthClientTrait, OAuthConfig, TokenManager,
    TokenManagerError, TokenSet, TokenStoreTrait,
};
#[cfg(feature = "runtime")]
pub use resilience::{
    BackoffStrategy, Jitter, RateLimitError, RateLimiter, RetryConfig, RetryConfigBuilder,
    RetryDecision, RetryError, RetryExecutor, RetryPolicy, RetryResult, TokenBucket,
    TokenBucketConfig,
};
