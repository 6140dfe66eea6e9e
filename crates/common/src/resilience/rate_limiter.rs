//! Token bucket rate limiting for outbound requests
//!
//! The bucket is a semaphore pre-filled to capacity. Acquiring takes one
//! permit for good (`forget`); a background replenishment task puts one back
//! every `refill_interval` unless the bucket is already full. Callers wait
//! in the semaphore's FIFO queue, so there is no unbounded buffering beyond
//! the waiters themselves.
//!
//! The replenishment task is owned by the bucket: `shutdown` (or dropping
//! the bucket) cancels it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors surfaced by the rate limiter
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// The caller's cancellation token fired while waiting for a permit
    #[error("rate limit wait cancelled")]
    Cancelled,

    /// The bucket was shut down while waiting
    #[error("rate limiter is shut down")]
    Closed,

    #[error("invalid rate limiter configuration: {0}")]
    InvalidConfiguration(String),
}

/// Configuration for token bucket rate limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBucketConfig {
    /// Maximum number of permits the bucket can hold
    pub capacity: usize,
    /// One permit is returned per interval
    pub refill_interval: Duration,
}

impl TokenBucketConfig {
    /// `rate` permits per second with a burst capacity of `rate`
    #[must_use]
    pub fn per_second(rate: u32) -> Self {
        let refill_interval =
            if rate == 0 { Duration::ZERO } else { Duration::from_secs(1) / rate };
        Self { capacity: rate as usize, refill_interval }
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` for a zero capacity or interval
    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.capacity == 0 {
            return Err(RateLimitError::InvalidConfiguration(
                "capacity must be greater than 0".to_string(),
            ));
        }
        if self.capacity > Semaphore::MAX_PERMITS {
            return Err(RateLimitError::InvalidConfiguration(format!(
                "capacity must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.refill_interval.is_zero() {
            return Err(RateLimitError::InvalidConfiguration(
                "refill_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Token bucket rate limiter with an owned replenishment task
///
/// Must be created from within a Tokio runtime.
pub struct TokenBucket {
    config: TokenBucketConfig,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TokenBucket {
    /// Create a full bucket and start replenishment
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` if the config is invalid or no Tokio
    /// runtime is running
    pub fn new(config: TokenBucketConfig) -> Result<Self, RateLimitError> {
        config.validate()?;

        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            RateLimitError::InvalidConfiguration(
                "token bucket must be created inside a Tokio runtime".to_string(),
            )
        })?;

        let permits = Arc::new(Semaphore::new(config.capacity));
        let cancel = CancellationToken::new();

        let task = handle.spawn(refill_loop(
            Arc::clone(&permits),
            config.capacity,
            config.refill_interval,
            cancel.clone(),
        ));

        info!(
            capacity = config.capacity,
            refill_interval_ms = u64::try_from(config.refill_interval.as_millis()).unwrap_or(u64::MAX),
            "Rate limiter started"
        );

        Ok(Self { config, permits, cancel, task: Mutex::new(Some(task)) })
    }

    /// Wait for a permit
    ///
    /// # Errors
    /// Returns `Cancelled` if `cancel` fires first (including when it is
    /// already cancelled), `Closed` after shutdown
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), RateLimitError> {
        if cancel.is_cancelled() {
            return Err(RateLimitError::Cancelled);
        }

        if self.permits.available_permits() == 0 {
            debug!("Rate limit bucket empty, waiting for permit");
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(RateLimitError::Cancelled),
            permit = self.permits.acquire() => match permit {
                Ok(permit) => {
                    permit.forget();
                    Ok(())
                }
                Err(_) => Err(RateLimitError::Closed),
            },
        }
    }

    /// Take a permit if one is available right now
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        match self.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Permits currently in the bucket
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Configuration the bucket was built with
    #[must_use]
    pub fn config(&self) -> &TokenBucketConfig {
        &self.config
    }

    /// Stop replenishment and wake all waiters with `Closed`
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.permits.close();

        let task = self.task.lock().take();
        if let Some(task) = task {
            match tokio::time::timeout(Duration::from_secs(5), task).await {
                Ok(Ok(())) => info!("Rate limiter stopped"),
                Ok(Err(e)) => warn!("Rate limiter task failed: {}", e),
                Err(_) => warn!("Rate limiter task did not complete within timeout"),
            }
        }
    }

    /// Whether the replenishment task has been asked to stop
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for TokenBucket {
    fn drop(&mut self) {
        // Best-effort: the task exits on its next poll
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("config", &self.config)
            .field("available", &self.available())
            .finish_non_exhaustive()
    }
}

/// Background replenishment loop
///
/// Only this task adds permits, so the check-then-add below cannot push the
/// bucket past capacity. A tick that finds the bucket full is dropped.
async fn refill_loop(
    permits: Arc<Semaphore>,
    capacity: usize,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("Rate limiter refill loop cancelled");
                break;
            }
            _ = ticker.tick() => {
                if permits.available_permits() < capacity {
                    permits.add_permits(1);
                }
            }
        }
    }
}

/// Rate limiter that is either a token bucket or a pass-through
///
/// A rate of zero is a valid configuration meaning "no limiting".
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Option<TokenBucket>,
}

impl RateLimiter {
    /// Limit to `rate` requests per second; `0` disables limiting
    ///
    /// # Errors
    /// See [`TokenBucket::new`]
    pub fn per_second(rate: u32) -> Result<Self, RateLimitError> {
        if rate == 0 {
            return Ok(Self::disabled());
        }
        let bucket = TokenBucket::new(TokenBucketConfig::per_second(rate))?;
        Ok(Self { bucket: Some(bucket) })
    }

    /// Unconditional pass-through
    #[must_use]
    pub fn disabled() -> Self {
        Self { bucket: None }
    }

    /// Whether requests are actually throttled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.bucket.is_some()
    }

    /// Wait for admission
    ///
    /// A disabled limiter still honours an already-cancelled token so the
    /// request path behaves the same either way.
    ///
    /// # Errors
    /// See [`TokenBucket::acquire`]
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), RateLimitError> {
        match &self.bucket {
            Some(bucket) => bucket.acquire(cancel).await,
            None if cancel.is_cancelled() => Err(RateLimitError::Cancelled),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn bucket(&self) -> Option<&TokenBucket> {
        self.bucket.as_ref()
    }

    /// Stop the replenishment task, if any
    pub async fn shutdown(&self) {
        if let Some(bucket) = &self.bucket {
            bucket.shutdown().await;
        }
    }
}
