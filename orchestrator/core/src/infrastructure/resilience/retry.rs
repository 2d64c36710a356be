// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::domain::coordinator_config::RetryConfig;
use crate::domain::error::{Classify, ErrorKind};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Error kinds worth another attempt; everything else propagates immediately
    pub retryable: Vec<ErrorKind>,
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`: `base_delay * 2^(attempt-1)`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable.contains(&kind)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay,
            retryable: ErrorKind::DEFAULT_TRANSIENT.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the first success, or the last failure once attempts are exhausted
    pub async fn run<F, Fut, T, E>(&self, operation: &str, mut call: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.policy.max_attempts && self.policy.is_retryable(e.kind()) => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    metrics::counter!("hcoord_retry_attempts_total", "operation" => operation.to_string())
                        .increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::CoordinatorError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            retryable: ErrorKind::DEFAULT_TRANSIENT.to_vec(),
        }
    }

    fn transient() -> CoordinatorError {
        CoordinatorError::TransientDependency {
            dependency: "vector_store".to_string(),
            kind: ErrorKind::Connection,
            message: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            retryable: vec![],
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let executor = RetryExecutor::new(policy(3));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = executor
            .run("search", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok("found")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "found");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_last_failure_when_exhausted() {
        let executor = RetryExecutor::new(policy(3));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = executor
            .run("search", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            })
            .await;

        assert!(matches!(result, Err(CoordinatorError::TransientDependency { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_open_circuit_is_not_retried() {
        let executor = RetryExecutor::new(policy(5));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = executor
            .run("search", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CoordinatorError::DependencyUnavailable("vector_store".to_string()))
            })
            .await;

        assert!(matches!(result, Err(CoordinatorError::DependencyUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_configuration_errors_propagate_immediately() {
        let executor = RetryExecutor::new(policy(5));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = executor
            .run("search", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CoordinatorError::Configuration("unknown collection".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
