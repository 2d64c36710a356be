// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::error::{Classify, ErrorKind};
use crate::domain::health::ServiceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

/// Result of the container's own health check, when it declares one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerHealth {
    Starting,
    Healthy,
    Unhealthy,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub service_id: ServiceId,
    pub state: ContainerState,
    pub health: ContainerHealth,
    pub exit_code: Option<i64>,
    pub oom_killed: bool,
    /// Runtime-reported error string, if any
    pub error: Option<String>,
    /// Output of the most recent failing health checks
    #[serde(default)]
    pub health_log: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl ContainerStatus {
    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }

    pub fn has_exited(&self) -> bool {
        matches!(self.state, ContainerState::Exited | ContainerState::Dead)
    }
}

#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("Container not found: {0}")]
    NotFound(String),
    #[error("Container runtime connection failed: {0}")]
    Connection(String),
    #[error("Failed to inspect container: {0}")]
    InspectFailed(String),
    #[error("Failed to restart container: {0}")]
    RestartFailed(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl Classify for RuntimeError {
    fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Connection(_) => ErrorKind::Connection,
            RuntimeError::InspectFailed(_) | RuntimeError::RestartFailed(_) => ErrorKind::Server,
            RuntimeError::NotFound(_) => ErrorKind::Invalid,
            RuntimeError::PermissionDenied(_) => ErrorKind::Rejected,
        }
    }
}

/// The consumed container-runtime interface
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Services whose containers carry `label_selector` (`key` or `key=value`)
    async fn list(&self, label_selector: &str) -> Result<Vec<ServiceId>, RuntimeError>;
    async fn inspect(&self, id: &ServiceId) -> Result<ContainerStatus, RuntimeError>;
    async fn restart(&self, id: &ServiceId) -> Result<(), RuntimeError>;
}
