//! Resilience primitives for outbound HTTP traffic
//!
//! - **Rate limiting**: a token bucket that admits requests at a steady rate
//!   with a bounded burst
//! - **Retry logic**: configurable backoff with jitter, driven by a policy
//!   that classifies each failure
//!
//! Both are generic over the caller's error type and honour a
//! `CancellationToken` at every wait point.

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{RateLimitError, RateLimiter, TokenBucket, TokenBucketConfig};
pub use retry::{
    policies, BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder, RetryDecision,
    RetryError, RetryExecutor, RetryPolicy, RetryResult,
};
