// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Resilience
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`circuit_breaker`] | Per-dependency CLOSED/OPEN/HALF_OPEN state machine and registry |
//! | [`retry`] | Exponential backoff over a configured set of transient error kinds |
//!
//! [`DependencyGuard`] composes the two with a per-call timeout: every attempt
//! passes through the breaker, so an OPEN circuit stops the retry loop at once.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitBreakerRegistry, CircuitState};
pub use retry::{RetryExecutor, RetryPolicy};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::error::{Classify, CoordinatorError};

/// Breaker + retry + call timeout for one dependency
#[derive(Clone)]
pub struct DependencyGuard {
    breaker: Arc<CircuitBreaker>,
    retry: RetryExecutor,
    call_timeout: Duration,
}

impl DependencyGuard {
    pub fn new(breaker: Arc<CircuitBreaker>, retry: RetryExecutor, call_timeout: Duration) -> Self {
        Self {
            breaker,
            retry,
            call_timeout,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn run<F, Fut, T, E>(&self, operation: &str, mut call: F) -> Result<T, CoordinatorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + std::fmt::Display,
    {
        self.retry
            .run(operation, || self.breaker.call(self.call_timeout, call()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Refused;

    impl std::fmt::Display for Refused {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("connection refused")
        }
    }

    impl Classify for Refused {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Connection
        }
    }

    #[tokio::test]
    async fn test_retry_stops_once_circuit_opens() {
        let breaker = Arc::new(CircuitBreaker::new(
            "vector_store",
            BreakerSettings {
                failure_threshold: 2,
                recovery_timeout: Duration::from_secs(60),
            },
        ));
        let guard = DependencyGuard::new(
            breaker.clone(),
            RetryExecutor::new(RetryPolicy {
                max_attempts: 5,
                base_delay: Duration::from_millis(1),
                retryable: ErrorKind::DEFAULT_TRANSIENT.to_vec(),
            }),
            Duration::from_secs(1),
        );

        let counter = AtomicU32::new(0);
        let invocations = &counter;
        let result: Result<(), _> = guard
            .run("search", move || async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                Err(Refused)
            })
            .await;

        // Two real failures open the circuit, the third attempt fails fast
        assert!(matches!(result, Err(CoordinatorError::DependencyUnavailable(_))));
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
