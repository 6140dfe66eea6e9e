//! Integration tests for resilience module
//!
//! Exercises the rate limiter and retry executor together the way the HTTP
//! layer composes them: admission first, then a retried attempt.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bokio_common::resilience::{
    policies, RateLimitError, RateLimiter, RetryConfig, RetryError, RetryExecutor,
};
use tokio_util::sync::CancellationToken;

/// Custom error type for testing
#[derive(Debug, Clone)]
struct TestError {
    message: String,
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TestError {}

/// Validates that a burst beyond capacity is spread over time.
///
/// # Test Steps
/// 1. Create a limiter at 10 requests per second (100ms per permit)
/// 2. Acquire 15 permits sequentially
/// 3. The first 10 are immediate; the remaining 5 wait for refills
/// 4. Verify total time is at least ~5 intervals
#[tokio::test(flavor = "multi_thread")]
async fn test_rate_limiter_spreads_burst() -> anyhow::Result<()> {
    let limiter = RateLimiter::per_second(10)?;
    let cancel = CancellationToken::new();

    let started = Instant::now();
    for _ in 0..15 {
        limiter.acquire(&cancel).await?;
    }
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(400), "elapsed {elapsed:?}");
    limiter.shutdown().await;
    Ok(())
}

/// Validates that concurrent waiters are all admitted and none is lost.
///
/// # Test Steps
/// 1. Create a limiter with capacity 5
/// 2. Spawn 10 tasks that each acquire once
/// 3. Verify every task completes successfully
#[tokio::test(flavor = "multi_thread")]
async fn test_rate_limiter_concurrent_waiters() {
    let limiter = Arc::new(RateLimiter::per_second(5).expect("limiter"));
    let cancel = CancellationToken::new();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.acquire(&cancel).await })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        assert!(result.expect("join").is_ok());
    }
}

/// Validates that cancelling a blocked waiter returns promptly.
///
/// # Test Steps
/// 1. Drain a 1 request/second limiter
/// 2. Start a second acquire and cancel it after 20ms
/// 3. Verify `Cancelled` is returned well before the refill
#[tokio::test(flavor = "multi_thread")]
async fn test_rate_limiter_cancellation() {
    let limiter = RateLimiter::per_second(1).expect("limiter");
    let cancel = CancellationToken::new();
    limiter.acquire(&cancel).await.expect("first acquire");

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = limiter.acquire(&cancel).await;
    assert_eq!(result, Err(RateLimitError::Cancelled));
    assert!(started.elapsed() < Duration::from_millis(800));
}

/// Validates retry with exponential backoff recovering from transient
/// failures.
///
/// # Test Steps
/// 1. Configure 5 attempts with exponential backoff
/// 2. Fail the first 3 attempts
/// 3. Verify the 4th attempt's value is returned
#[tokio::test(flavor = "multi_thread")]
async fn test_retry_exponential_backoff_success() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let config = RetryConfig::builder()
        .max_attempts(5)
        .exponential_backoff(Duration::from_millis(10), 2.0, Duration::from_millis(100))
        .full_jitter()
        .build()
        .expect("Failed to build config");
    let executor = RetryExecutor::new(config, policies::AlwaysRetry);
    let cancel = CancellationToken::new();

    let result = executor
        .execute(&cancel, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(TestError { message: "Transient failure".to_string() })
                } else {
                    Ok("Success")
                }
            }
        })
        .await;

    assert_eq!(result.expect("Should succeed"), "Success");
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

/// Validates that exhaustion surfaces the last error.
///
/// # Test Steps
/// 1. Configure `from_max_retries(2)` with a fast fixed backoff
/// 2. Fail every attempt
/// 3. Verify three attempts ran and the error carries the last message
#[tokio::test(flavor = "multi_thread")]
async fn test_retry_exhaustion_reports_last_error() {
    let mut config = RetryConfig::from_max_retries(2);
    config.backoff = bokio_common::BackoffStrategy::Fixed(Duration::from_millis(1));
    let executor = RetryExecutor::new(config, policies::AlwaysRetry);
    let cancel = CancellationToken::new();

    let result: Result<(), _> = executor
        .execute(&cancel, |attempt| async move {
            Err(TestError { message: format!("attempt {attempt} failed") })
        })
        .await;

    match result {
        Err(RetryError::Exhausted { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert_eq!(source.message, "attempt 2 failed");
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

/// Validates admission and retry composed in sequence.
///
/// # Test Steps
/// 1. Each attempt first acquires from a 2 request/second limiter
/// 2. The operation fails once, then succeeds
/// 3. Verify both permits were consumed
#[tokio::test(flavor = "multi_thread")]
async fn test_rate_limited_retry_consumes_permit_per_attempt() {
    let limiter = Arc::new(RateLimiter::per_second(2).expect("limiter"));
    let config = RetryConfig::builder()
        .max_attempts(3)
        .fixed_backoff(Duration::from_millis(1))
        .no_jitter()
        .build()
        .expect("config");
    let executor = RetryExecutor::new(config, policies::AlwaysRetry);
    let cancel = CancellationToken::new();

    let result = executor
        .execute(&cancel, |attempt| {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            async move {
                limiter
                    .acquire(&cancel)
                    .await
                    .map_err(|e| TestError { message: e.to_string() })?;
                if attempt == 0 {
                    Err(TestError { message: "first attempt".to_string() })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

    assert_eq!(result.expect("second attempt succeeds"), 1);
    let available = limiter.bucket().map(|b| b.available());
    assert_eq!(available, Some(0));
}
