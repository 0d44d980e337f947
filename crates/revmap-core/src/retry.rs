//! Conflict retry with doubling backoff.
//!
//! A commit that loses its conditional write to a concurrent writer is
//! repeated from the top: re-read, re-decide, re-write. The caller decides
//! which errors are worth another pass.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// How many extra passes to make and how long to wait between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Passes allowed after the first one. Zero makes the call single shot.
    pub max_retries: u32,
    /// Wait before the first retry. Doubles on each later retry.
    pub initial_delay: Duration,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
}

impl RetryConfig {
    /// A policy with the given limits.
    #[must_use]
    pub const fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
        }
    }

    /// Give up on the first failure.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Millisecond waits, for in-process maps and tests.
    #[must_use]
    pub const fn fast() -> Self {
        Self::new(3, Duration::from_millis(1), Duration::from_millis(10))
    }

    /// Wait before pass `attempt` (0 is the first pass and never waits).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let Some(doublings) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let factor = 1u32.checked_shl(doublings).unwrap_or(u32::MAX);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Total passes the policy allows, the first one included.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(10), Duration::from_millis(200))
    }
}

/// How a retried operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// A pass succeeded.
    Success(T),
    /// The last error, which was either not retryable or hit the limit.
    Exhausted {
        /// Error of the last pass.
        error: E,
        /// Passes made.
        attempts: u32,
    },
}

/// Run `operation` until it succeeds, fails with an error `retryable`
/// rejects, or the policy runs out of passes.
///
/// `operation` gets the 0-based pass number.
///
/// # Example
///
/// ```rust,no_run
/// use revmap_core::retry::{RetryConfig, RetryOutcome, retry};
///
/// # async fn example() {
/// let outcome = retry(&RetryConfig::fast(), |attempt| async move {
///     if attempt == 0 { Err("conflict") } else { Ok(attempt) }
/// }, |err| *err == "conflict").await;
/// assert_eq!(outcome, RetryOutcome::Success(1));
/// # }
/// ```
pub async fn retry<T, E, Fut, F, P>(
    config: &RetryConfig,
    mut operation: F,
    retryable: P,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        let error = match operation(attempt).await {
            Ok(value) => return RetryOutcome::Success(value),
            Err(error) => error,
        };

        let attempts = attempt.saturating_add(1);
        if attempts >= config.max_attempts() || !retryable(&error) {
            return RetryOutcome::Exhausted { error, attempts };
        }

        attempt = attempts;
        let wait = config.backoff(attempt);
        debug!(attempt, wait_ms = wait.as_millis(), "retrying after conflict");
        tokio::time::sleep(wait).await;
    }
}
