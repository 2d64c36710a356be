// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Coordinator Error Taxonomy
//!
//! | Variant | Origin | Handling |
//! |---------|--------|----------|
//! | `TransientDependency` | timeouts, refused connections, 5xx | retried by `RetryExecutor` |
//! | `DependencyUnavailable` | circuit breaker OPEN | fail fast, never retried |
//! | `ContextUnavailable` | every selected collection failed | surfaced as HTTP 503 |
//! | `Configuration` | invalid request or collection mapping | surfaced as HTTP 400 |
//! | `RemediationSkipped` | cooldown or unknown fault category | logged only |
//!
//! Dependency adapters keep their own error enums and expose an [`ErrorKind`]
//! through [`Classify`] so the retry policy can decide without string matching.

use serde::{Deserialize, Serialize};

/// Coarse classification of a dependency failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Connection,
    RateLimited,
    Server,
    Rejected,
    Unavailable,
    Invalid,
}

impl ErrorKind {
    /// Kinds retried when no explicit policy is configured
    pub const DEFAULT_TRANSIENT: [ErrorKind; 4] = [
        ErrorKind::Timeout,
        ErrorKind::Connection,
        ErrorKind::RateLimited,
        ErrorKind::Server,
    ];
}

/// Errors that can report their [`ErrorKind`]
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Transient failure in {dependency}: {message}")]
    TransientDependency {
        dependency: String,
        kind: ErrorKind,
        message: String,
    },

    #[error("Dependency unavailable (circuit open): {0}")]
    DependencyUnavailable(String),

    #[error("Dependency {dependency} failed: {message}")]
    Dependency { dependency: String, message: String },

    #[error("Context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Remediation skipped for {service_id}: {reason}")]
    RemediationSkipped { service_id: String, reason: String },
}

impl CoordinatorError {
    /// Wrap a classified dependency error, keeping transient kinds retryable
    pub fn from_dependency<E>(dependency: &str, error: &E) -> Self
    where
        E: Classify + std::fmt::Display,
    {
        match error.kind() {
            ErrorKind::Unavailable => Self::DependencyUnavailable(dependency.to_string()),
            kind if ErrorKind::DEFAULT_TRANSIENT.contains(&kind) => Self::TransientDependency {
                dependency: dependency.to_string(),
                kind,
                message: error.to_string(),
            },
            _ => Self::Dependency {
                dependency: dependency.to_string(),
                message: error.to_string(),
            },
        }
    }

    /// Stable machine-readable name used in HTTP error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::TransientDependency { .. } => "transient_dependency_error",
            Self::DependencyUnavailable(_) => "dependency_unavailable",
            Self::Dependency { .. } => "dependency_error",
            Self::ContextUnavailable(_) => "context_unavailable",
            Self::Configuration(_) => "configuration_error",
            Self::RemediationSkipped { .. } => "remediation_skipped",
        }
    }
}

impl Classify for CoordinatorError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::TransientDependency { kind, .. } => *kind,
            Self::DependencyUnavailable(_) | Self::ContextUnavailable(_) => ErrorKind::Unavailable,
            Self::Dependency { .. } => ErrorKind::Rejected,
            Self::Configuration(_) | Self::RemediationSkipped { .. } => ErrorKind::Invalid,
        }
    }
}
