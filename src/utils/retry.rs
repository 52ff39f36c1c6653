//! Bounded retry of storage calls

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::types::{HeraclionError, HeraclionResult};

/// Retry policy for transient storage failures: fixed delay, bounded attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one (minimum 1)
    pub max_attempts: u32,
    /// Pause between two attempts, in milliseconds
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with fixed delays.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// Create a policy with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay_ms: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `op`, retrying it while it fails with a transient storage error.
///
/// Any other error is returned as-is on its first occurrence. Once the
/// attempts are spent the last transient error is surfaced as
/// [`HeraclionError::FatalStorage`].
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> HeraclionResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HeraclionResult<T>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match op().await {
            Err(error) if error.is_retryable() => {
                if attempt >= attempts {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        error = %error,
                        "storage retries exhausted"
                    );
                    return Err(HeraclionError::FatalStorage(format!(
                        "{} failed after {} attempts: {}",
                        operation, attempt, error
                    )));
                }

                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = attempts,
                    error = %error,
                    "transient storage failure, retrying"
                );
                tokio::time::sleep(policy.delay()).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
