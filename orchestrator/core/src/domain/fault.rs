// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Fault Classification
//!
//! Abnormal service signals are reduced to a closed [`FaultCategory`] once, by
//! the [`ErrorPatternMatcher`]. Everything downstream dispatches on the enum
//! through [`FaultCategory::remediation`], never on log text.
//!
//! Signatures are evaluated in table order and the first match wins, so
//! `open /data: permission denied` is classified as permission-denied before
//! the missing-resource entry gets a chance to match it.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::domain::error::CoordinatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultCategory {
    PortConflict,
    OutOfMemory,
    ConnectionRefused,
    MissingResource,
    ResourceLocked,
    PermissionDenied,
    ContainerExited,
    Unknown,
}

impl FaultCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultCategory::PortConflict => "port-conflict",
            FaultCategory::OutOfMemory => "out-of-memory",
            FaultCategory::ConnectionRefused => "connection-refused",
            FaultCategory::MissingResource => "missing-resource",
            FaultCategory::ResourceLocked => "resource-locked",
            FaultCategory::PermissionDenied => "permission-denied",
            FaultCategory::ContainerExited => "container-exited",
            FaultCategory::Unknown => "unknown",
        }
    }

    /// The remediation table
    pub fn remediation(&self) -> Remediation {
        match self {
            FaultCategory::PortConflict
            | FaultCategory::OutOfMemory
            | FaultCategory::ResourceLocked
            | FaultCategory::ContainerExited => Remediation::RestartService,
            FaultCategory::ConnectionRefused | FaultCategory::MissingResource => {
                Remediation::RestartWithDependencies
            }
            FaultCategory::PermissionDenied => Remediation::AlertOnly,
            FaultCategory::Unknown => Remediation::None,
        }
    }
}

impl std::fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remediation {
    RestartService,
    /// Restart declared dependencies first, then the service
    RestartWithDependencies,
    /// No safe automated action, log and alert only
    AlertOnly,
    None,
}

impl Remediation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Remediation::RestartService => "restart_service",
            Remediation::RestartWithDependencies => "restart_with_dependencies",
            Remediation::AlertOnly => "alert_only",
            Remediation::None => "none",
        }
    }

    pub fn is_automated(&self) -> bool {
        matches!(self, Remediation::RestartService | Remediation::RestartWithDependencies)
    }
}

/// Signals collected from one failed probe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaultEvidence {
    /// Free-form text: runtime error message, failing health check output, recent logs
    pub messages: Vec<String>,
    pub exit_code: Option<i64>,
    pub oom_killed: bool,
    /// Container is exited or dead
    pub exited: bool,
}

impl FaultEvidence {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            messages: vec![text.into()],
            ..Default::default()
        }
    }
}

struct Signature {
    matcher: Regex,
    category: FaultCategory,
}

/// Ordered signature table mapping evidence to a [`FaultCategory`]
pub struct ErrorPatternMatcher {
    signatures: Vec<Signature>,
}

// Alert-only categories come first so no restart signature can shadow them
const SIGNATURES: &[(&str, FaultCategory)] = &[
    (r"permission denied|\beacces\b|operation not permitted", FaultCategory::PermissionDenied),
    (r"address already in use|port is already allocated", FaultCategory::PortConflict),
    (r"out of memory|\boom\b|oomkilled|killed process", FaultCategory::OutOfMemory),
    (r"connection refused|\beconnrefused\b|could not connect", FaultCategory::ConnectionRefused),
    (r"no such file|not found|no such container|\bmissing\b", FaultCategory::MissingResource),
    (
        r"resource temporarily unavailable|database is locked|\block(ed)?\b|in use by",
        FaultCategory::ResourceLocked,
    ),
];

impl ErrorPatternMatcher {
    pub fn new() -> Result<Self, CoordinatorError> {
        let signatures = SIGNATURES
            .iter()
            .map(|(pattern, category)| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|matcher| Signature {
                        matcher,
                        category: *category,
                    })
                    .map_err(|e| {
                        CoordinatorError::Configuration(format!("invalid fault signature '{}': {}", pattern, e))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { signatures })
    }

    /// First matching category, or [`FaultCategory::Unknown`]
    pub fn classify(&self, evidence: &FaultEvidence) -> FaultCategory {
        if evidence.oom_killed || evidence.exit_code == Some(137) {
            return FaultCategory::OutOfMemory;
        }

        for signature in &self.signatures {
            if evidence.messages.iter().any(|m| signature.matcher.is_match(m)) {
                return signature.category;
            }
        }

        if evidence.exited {
            return FaultCategory::ContainerExited;
        }
        FaultCategory::Unknown
    }
}
