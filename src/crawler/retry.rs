//! Bounded retry with exponential backoff

use crate::crawler::fetcher::FetchError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backoff never grows past this
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How many times to try and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Wait after the first failed attempt; doubles after each further failure
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Backoff to apply after failed attempt number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Runs `op` until it succeeds, fails permanently, or attempts run out
///
/// `op` receives the 1-based attempt number. Only errors for which
/// [`FetchError::is_retryable`] holds are retried. Cancellation during a
/// backoff sleep ends the loop with [`FetchError::Cancelled`].
///
/// Returns the final outcome together with the number of attempts made.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> (Result<T, FetchError>, u32)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match op(attempt).await {
            Ok(value) => return (Ok(value), attempt),
            Err(error) => error,
        };

        if !error.is_retryable() || attempt >= policy.max_attempts {
            return (Err(error), attempt);
        }

        let delay = policy.backoff_for(attempt);
        tracing::warn!(
            "Attempt {}/{} failed ({}), retrying in {:?}",
            attempt,
            policy.max_attempts,
            error,
            delay
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return (Err(FetchError::Cancelled), attempt),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
