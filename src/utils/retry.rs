use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Bounded Exponential Backoff
// ============================================================================
//
// Used for compensating refunds, inventory releases and notification
// delivery. Only transient collaborator errors are retried; a permanent
// error stops the loop immediately.
//
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    #[serde(with = "super::serde_millis")]
    pub initial_delay: Duration,
    #[serde(with = "super::serde_millis")]
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// More attempts, for money-moving compensation
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// Fewer attempts, for best-effort work
    pub fn conservative() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }

    /// No waiting between attempts; tests use this to keep runs fast
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay slept after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

/// Check if an error is transient (should retry) or permanent (should not retry)
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success { value: T, attempts: u32 },
    /// Every attempt failed with a transient error
    Exhausted { error: E, attempts: u32 },
    /// Stopped early on a permanent error
    Permanent { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. }
            | RetryResult::Exhausted { attempts, .. }
            | RetryResult::Permanent { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success { .. })
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success { value, .. } => Ok(value),
            RetryResult::Exhausted { error, .. } | RetryResult::Permanent { error, .. } => Err(error),
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts
pub async fn retry_on_transient<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return RetryResult::Success {
                    value,
                    attempts: attempt,
                };
            }
            Err(error) if !error.is_transient() => {
                tracing::error!(
                    operation = operation_name,
                    error = %error,
                    "Permanent failure detected, not retrying"
                );
                return RetryResult::Permanent {
                    error,
                    attempts: attempt,
                };
            }
            Err(error) if attempt >= max_attempts => {
                tracing::error!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %error,
                    "Operation failed after all retries"
                );
                return RetryResult::Exhausted {
                    error,
                    attempts: attempt,
                };
            }
            Err(error) => {
                let delay = config.delay_after(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying after delay"
                );
                sleep(delay).await;
            }
        }
    }
}
