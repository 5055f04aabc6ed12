//! Retry logic with exponential backoff for transient remote errors.
//!
//! Every retry loop is bounded twice: by a fixed attempt count and by the
//! caller's [`Deadline`]. A backoff sleep never runs past the deadline.

use crate::context::Deadline;
use crate::transport::{RemoteError, RemoteErrorKind};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included)
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(20),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(20),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        // A negative or NaN factor yields no delay instead of a panic.
        let capped = delay.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Why a retried operation did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// Failure the retry predicate rejected; surfaced immediately
    Fatal(RemoteError),
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last: RemoteError },
    /// The deadline passed before the operation succeeded
    DeadlineExceeded { attempts: u32 },
}

/// Callback trait for retry progress notifications.
pub trait RetryCallback: Sync {
    /// Called when an operation is being retried.
    ///
    /// # Arguments
    /// * `attempt` - Attempt that just failed (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - The error that triggered the retry
    /// * `delay` - Time until the next attempt
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &RemoteError, delay: Duration);
}

/// No-op callback that does nothing.
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&self, _attempt: u32, _max_attempts: u32, _error: &RemoteError, _delay: Duration) {}
}

/// Callback that reports retries through the `log` facade.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &RemoteError, delay: Duration) {
        log::warn!(
            "Attempt {}/{} failed: {}. Retrying in {}ms...",
            attempt,
            max_attempts,
            error,
            delay.as_millis()
        );
    }
}

/// Execute an operation, retrying transient remote errors.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    deadline: Deadline,
    callback: Option<&dyn RetryCallback>,
    operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Result<T, RemoteError>,
{
    with_retry_if(config, deadline, callback, RemoteError::is_transient, operation)
}

/// Execute an operation, retrying errors accepted by `should_retry`.
///
/// # Returns
/// The result of the operation, or why it did not succeed.
pub fn with_retry_if<T, F, P>(
    config: &RetryConfig,
    deadline: Deadline,
    callback: Option<&dyn RetryCallback>,
    should_retry: P,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Result<T, RemoteError>,
    P: Fn(&RemoteError) -> bool,
{
    let max_attempts = config.max_attempts.max(1);

    for attempt in 0..max_attempts {
        if deadline.is_expired() {
            return Err(RetryError::DeadlineExceeded { attempts: attempt });
        }

        let e = match operation() {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if e.kind == RemoteErrorKind::Timeout && deadline.is_expired() {
            return Err(RetryError::DeadlineExceeded {
                attempts: attempt + 1,
            });
        }

        if !should_retry(&e) {
            return Err(RetryError::Fatal(e));
        }

        if attempt + 1 >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt + 1,
                last: e,
            });
        }

        let delay = config.delay_for_attempt(attempt);
        if delay >= deadline.remaining() {
            return Err(RetryError::DeadlineExceeded {
                attempts: attempt + 1,
            });
        }

        if let Some(cb) = callback {
            cb.on_retry(attempt + 1, max_attempts, &e, delay);
        }

        thread::sleep(delay);
    }

    unreachable!("retry loop returns on its last attempt")
}
