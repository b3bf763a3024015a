//! Retry logic with exponential backoff

use crate::{CinephageError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Quick retries for cheap idempotent calls
    pub fn quick() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            ..Default::default()
        }
    }
}

/// Retry policy determines which errors should be retried
#[derive(Debug, Clone, Copy)]
pub enum RetryPolicy {
    /// Retry all errors
    All,
    /// Retry only transient errors (network, timeout, 5xx, rate-limit)
    Transient,
    /// Never retry
    Never,
}

/// Execute an async operation with retry logic
pub async fn retry_with_backoff<F, Fut, T>(
    config: RetryConfig,
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if !should_retry(&err, policy) {
                    debug!(
                        operation = operation_name,
                        error = %err,
                        "non-retryable error"
                    );
                    return Err(err);
                }

                if attempt >= config.max_attempts {
                    error!(
                        operation = operation_name,
                        attempts = config.max_attempts,
                        error = %err,
                        "retries exhausted"
                    );
                    return Err(CinephageError::RetryExhausted {
                        operation: operation_name.to_string(),
                        attempts: config.max_attempts,
                        last_error: Box::new(err),
                    });
                }

                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = config.max_attempts,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after failure"
                );

                sleep(delay).await;
                delay = next_delay(delay, &config);
            }
        }
    }
}

fn should_retry(error: &CinephageError, policy: RetryPolicy) -> bool {
    match policy {
        RetryPolicy::Never => false,
        RetryPolicy::All => true,
        RetryPolicy::Transient => error.is_transient(),
    }
}

fn next_delay(current: Duration, config: &RetryConfig) -> Duration {
    let mut next = current.mul_f64(config.backoff_multiplier);

    if next > config.max_delay {
        next = config.max_delay;
    }

    if config.jitter {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let jitter_factor = rng.gen_range(0.5..1.5);
        next = next.mul_f64(jitter_factor);
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn retry_succeeds_on_second_attempt() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let attempt = Arc::new(AtomicU32::new(0));
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            ..Default::default()
        };

        let attempt_clone = attempt.clone();
        let result = retry_with_backoff(config, RetryPolicy::All, "test_operation", move || {
            let attempt = attempt_clone.clone();
            async move {
                let current = attempt.fetch_add(1, Ordering::SeqCst) + 1;
                if current == 2 {
                    Ok(42)
                } else {
                    Err(CinephageError::Timeout {
                        operation: "simulated".to_string(),
                    })
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retry_exhausted_wraps_last_error() {
        let config = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(5),
            ..Default::default()
        };

        let result: Result<()> =
            retry_with_backoff(config, RetryPolicy::All, "test_operation", || async {
                Err(CinephageError::Timeout {
                    operation: "always fails".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(CinephageError::RetryExhausted { .. })));
    }

    #[tokio::test]
    async fn non_retryable_error_returned_immediately() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<()> = retry_with_backoff(
            RetryConfig::default(),
            RetryPolicy::Transient,
            "test_operation",
            move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CinephageError::ValidationError {
                        field: "title".to_string(),
                        message: "empty".to_string(),
                    })
                }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
