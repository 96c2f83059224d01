//! Retry logic with bounded attempts and configurable backoff
//!
//! This module consolidates the pipeline's retry handling into a single
//! utility. Every stage call goes through [`run_with_retry`], parameterized by
//! a [`RetryBudget`] that is shared across both stages of an item — retries are
//! budgeted per item, not per stage.
//!
//! # Example
//!
//! ```no_run
//! use clip_relay::retry::{IsRetryable, RetryBudget, run_with_retry};
//! use clip_relay::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let mut budget = RetryBudget::new(&RetryConfig::default());
//! let result = run_with_retry(
//!     &mut budget,
//!     || async {
//!         // Your operation here
//!         Ok::<_, MyError>(())
//!     },
//!     |_attempt, _delay, _error| {},
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{BackoffKind, RetryConfig};
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, upstream 5xx, malformed responses)
/// should return `true`. Permanent failures (validation, configuration,
/// cancellation) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Transport failures are transient; a timeout is not distinguished
            // from any other transport error. Builder errors are programming
            // errors and retrying them cannot help.
            Error::Network(e) => !e.is_builder(),
            // Upstream server trouble and rate limiting are transient;
            // client-side rejections (4xx) are not
            Error::Upstream { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            // An undecodable body is treated as a transient upstream glitch
            Error::Malformed(_) => true,
            // Input is wrong; retrying the same input cannot succeed
            Error::Validation(_) => false,
            // Config errors are permanent
            Error::Config { .. } => false,
            // Not found is permanent
            Error::NotFound(_) => false,
            // Serialization errors are permanent
            Error::Serialization(_) => false,
            // Cancellation must not trigger retries
            Error::Cancelled => false,
        }
    }
}

/// Bounded attempt budget for one item, shared across its stages
///
/// The budget counts failed attempts. Once `attempts() == max_retries` the
/// item is out of calls: [`register_failure`](Self::register_failure) returns
/// `None` and the caller marks the item failed. Total stage calls per item are
/// therefore bounded by `max_retries` (a first call is always made, so a
/// zero-retry budget still permits one call).
#[derive(Debug, Clone)]
pub struct RetryBudget {
    attempts: u32,
    max_retries: u32,
    base_delay: Duration,
    backoff: BackoffKind,
    jitter: bool,
}

impl RetryBudget {
    /// Create a fresh budget from the retry configuration
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            attempts: 0,
            max_retries: config.max_retries,
            base_delay: config.base_delay,
            backoff: config.backoff,
            jitter: config.jitter,
        }
    }

    /// Number of failed attempts registered so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Configured attempt cap
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Record a failed attempt.
    ///
    /// Returns the backoff delay to sleep before the next call, or `None` when
    /// the budget is exhausted and the item must be marked failed.
    pub fn register_failure(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.max_retries {
            None
        } else {
            Some(self.backoff.delay_for(self.base_delay, self.attempts))
        }
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter { add_jitter(delay) } else { delay }
    }
}

/// Execute an async operation under a shared retry budget
///
/// # Arguments
///
/// * `budget` - Mutable attempt budget; pass the same budget to every stage
///   call of an item so retries are bounded per item
/// * `operation` - Async closure returning `Result<T, E>` where `E` implements
///   [`IsRetryable`]
/// * `on_retry` - Called once per scheduled retry with the failed-attempt
///   count, the backoff delay, and the error message, before the sleep.
///   The driver uses this to flip the item into its waiting state and emit a
///   retry event.
///
/// # Returns
///
/// The successful result, or the last error once the budget is exhausted or a
/// non-retryable error occurs.
pub async fn run_with_retry<F, Fut, T, E, N>(
    budget: &mut RetryBudget,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    N: FnMut(u32, Duration, &E),
{
    loop {
        match operation().await {
            Ok(result) => {
                if budget.attempts() > 0 {
                    tracing::info!(
                        failed_attempts = budget.attempts(),
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() => match budget.register_failure() {
                Some(delay) => {
                    tracing::warn!(
                        error = %e,
                        attempt = budget.attempts(),
                        max_retries = budget.max_retries(),
                        delay_ms = delay.as_millis(),
                        "Operation failed, retrying"
                    );

                    on_retry(budget.attempts(), delay, &e);

                    tokio::time::sleep(budget.apply_jitter(delay)).await;
                }
                None => {
                    tracing::error!(
                        error = %e,
                        attempts = budget.attempts(),
                        "Operation failed, attempt budget exhausted"
                    );
                    return Err(e);
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Operation failed with non-retryable error");
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay lands between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}
