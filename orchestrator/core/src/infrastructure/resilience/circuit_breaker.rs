// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Circuit breaker guarding calls to external dependencies
//!
//! # States
//! - **Closed**: calls pass through; consecutive failures are counted
//! - **Open**: calls fail fast with `DependencyUnavailable` until
//!   `opened_at + recovery_timeout`
//! - **HalfOpen**: exactly one trial call is admitted; success closes the
//!   circuit, failure re-opens it with a fresh `opened_at`
//!
//! Only transient failures (timeouts, refused connections, 5xx, rate limits)
//! count against the dependency. A dependency that answers with a rejection
//! is reachable and resets the failure count.
//!
//! State is held behind a `parking_lot::Mutex` per dependency; lifetime
//! counters are lock-free atomics read by `/healing/statistics`.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::domain::coordinator_config::CircuitBreakerConfig;
use crate::domain::error::{Classify, CoordinatorError, ErrorKind};
use crate::domain::events::ResilienceEvent;
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    opened_at_utc: Option<DateTime<Utc>>,
    trial_in_flight: bool,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            opened_at_utc: None,
            trial_in_flight: false,
        }
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.opened_at_utc = Some(Utc::now());
        self.trial_in_flight = false;
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub dependency_id: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
}

pub struct CircuitBreaker {
    dependency: String,
    settings: BreakerSettings,
    state: Mutex<BreakerState>,
    event_bus: Option<EventBus>,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    total_rejections: AtomicU64,
}

/// Admission to call the dependency. A trial permit dropped without an
/// outcome (caller cancelled) hands the trial slot back.
struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CallPermit<'_> {
    fn success(mut self) {
        self.settled = true;
        self.breaker.on_success();
    }

    fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.state.lock().trial_in_flight = false;
            debug!(dependency = %self.breaker.dependency, "Half-open trial abandoned");
        }
    }
}

impl CircuitBreaker {
    pub fn new(dependency: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            dependency: dependency.into(),
            settings,
            state: Mutex::new(BreakerState::new()),
            event_bus: None,
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_rejections: AtomicU64::new(0),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.lock();
        BreakerSnapshot {
            dependency_id: self.dependency.clone(),
            state: state.state,
            failure_count: state.failure_count,
            opened_at: state.opened_at_utc,
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
        }
    }

    /// Run `call` under the breaker with a per-call timeout.
    ///
    /// Fails fast with `DependencyUnavailable` while the circuit is open or a
    /// half-open trial is already in flight. The future is never polled in
    /// that case.
    pub async fn call<Fut, T, E>(&self, call_timeout: Duration, call: Fut) -> Result<T, CoordinatorError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Classify + std::fmt::Display,
    {
        let permit = self.acquire()?;
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        match tokio::time::timeout(call_timeout, call).await {
            Ok(Ok(value)) => {
                permit.success();
                Ok(value)
            }
            Ok(Err(e)) => {
                let kind = e.kind();
                if counts_as_failure(kind) {
                    permit.failure();
                } else {
                    permit.success();
                }
                Err(CoordinatorError::from_dependency(&self.dependency, &e))
            }
            Err(_) => {
                permit.failure();
                Err(CoordinatorError::TransientDependency {
                    dependency: self.dependency.clone(),
                    kind: ErrorKind::Timeout,
                    message: format!("call exceeded {}ms", call_timeout.as_millis()),
                })
            }
        }
    }

    fn acquire(&self) -> Result<CallPermit<'_>, CoordinatorError> {
        let mut half_opened = false;
        let admitted = {
            let mut state = self.state.lock();
            let current = state.state;
            match current {
                CircuitState::Closed => Some(false),
                CircuitState::Open => {
                    let elapsed = state.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                    if elapsed >= self.settings.recovery_timeout {
                        state.state = CircuitState::HalfOpen;
                        state.trial_in_flight = true;
                        half_opened = true;
                        Some(true)
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen if !state.trial_in_flight => {
                    state.trial_in_flight = true;
                    Some(true)
                }
                CircuitState::HalfOpen => None,
            }
        };

        if half_opened {
            info!(
                dependency = %self.dependency,
                recovery_timeout_ms = self.settings.recovery_timeout.as_millis() as u64,
                "Circuit breaker half-open, admitting one trial call"
            );
            self.transitioned(CircuitState::HalfOpen, 0);
        }

        match admitted {
            Some(trial) => Ok(CallPermit {
                breaker: self,
                trial,
                settled: false,
            }),
            None => {
                self.total_rejections.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("hcoord_breaker_rejections_total", "dependency" => self.dependency.clone())
                    .increment(1);
                debug!(dependency = %self.dependency, "Circuit open, failing fast");
                Err(CoordinatorError::DependencyUnavailable(self.dependency.clone()))
            }
        }
    }

    fn on_success(&self) {
        let closed = {
            let mut state = self.state.lock();
            state.failure_count = 0;
            if state.state == CircuitState::HalfOpen {
                state.state = CircuitState::Closed;
                state.trial_in_flight = false;
                state.opened_at = None;
                state.opened_at_utc = None;
                true
            } else {
                false
            }
        };

        if closed {
            info!(dependency = %self.dependency, "Circuit breaker closed after successful trial");
            self.transitioned(CircuitState::Closed, 0);
        }
    }

    fn on_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let opened = {
            let mut state = self.state.lock();
            state.failure_count = state.failure_count.saturating_add(1);
            let current = state.state;
            match current {
                CircuitState::Closed if state.failure_count >= self.settings.failure_threshold => {
                    state.open();
                    Some(state.failure_count)
                }
                CircuitState::HalfOpen => {
                    state.open();
                    Some(state.failure_count)
                }
                _ => None,
            }
        };

        if let Some(failure_count) = opened {
            warn!(
                dependency = %self.dependency,
                failure_count,
                "Circuit breaker opened"
            );
            self.transitioned(CircuitState::Open, failure_count);
        }
    }

    fn transitioned(&self, to: CircuitState, failure_count: u32) {
        metrics::counter!(
            "hcoord_breaker_transitions_total",
            "dependency" => self.dependency.clone(),
            "state" => to.to_string()
        )
        .increment(1);

        if let Some(bus) = &self.event_bus {
            let dependency = self.dependency.clone();
            let event = match to {
                CircuitState::Open => ResilienceEvent::CircuitOpened {
                    dependency,
                    failure_count,
                    opened_at: Utc::now(),
                },
                CircuitState::HalfOpen => ResilienceEvent::CircuitHalfOpened { dependency, at: Utc::now() },
                CircuitState::Closed => ResilienceEvent::CircuitClosed {
                    dependency,
                    closed_at: Utc::now(),
                },
            };
            bus.publish_resilience_event(event);
        }
    }
}

fn counts_as_failure(kind: ErrorKind) -> bool {
    ErrorKind::DEFAULT_TRANSIENT.contains(&kind)
}

/// Process-wide breakers keyed by dependency id
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    event_bus: Option<EventBus>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig, event_bus: Option<EventBus>) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
            event_bus,
        }
    }

    /// Breaker for `dependency`, created on first use with its configured settings
    pub fn get(&self, dependency: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(dependency) {
            return existing.clone();
        }

        self.breakers
            .entry(dependency.to_string())
            .or_insert_with(|| {
                let (failure_threshold, recovery_timeout) = self.config.settings_for(dependency);
                let mut breaker = CircuitBreaker::new(
                    dependency,
                    BreakerSettings {
                        failure_threshold,
                        recovery_timeout,
                    },
                );
                if let Some(bus) = &self.event_bus {
                    breaker = breaker.with_event_bus(bus.clone());
                }
                Arc::new(breaker)
            })
            .clone()
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|b| b.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.dependency_id.cmp(&b.dependency_id));
        snapshots
    }
}
