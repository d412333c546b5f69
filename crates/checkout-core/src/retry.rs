//! # Fixed-Delay Retry
//!
//! Bounded retry with a constant pause between attempts. Errors are not
//! classified: every failure is retried until attempts run out.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Run `operation` until it succeeds or `policy.max_attempts` is reached.
///
/// `on_failure` sees every failed attempt (1-based) before the pause. There
/// is no pause after the final attempt; its error is returned.
pub async fn retry_with_fixed_delay<F, Fut, T, E, N>(
    policy: &RetryPolicy,
    mut on_failure: N,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    N: FnMut(u32, &E),
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("Operation succeeded after {} attempts", attempt);
                }
                return Ok(value);
            }
            Err(error) => {
                on_failure(attempt, &error);

                if attempt >= policy.max_attempts {
                    warn!("Operation failed after {} attempts: {}", attempt, error);
                    return Err(error);
                }

                warn!(
                    "Attempt {} failed: {}. Retrying in {:?}...",
                    attempt, error, policy.delay
                );
                sleep(policy.delay).await;
            }
        }
    }
}
