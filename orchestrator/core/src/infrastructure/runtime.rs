// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use bollard::errors::Error as DockerError;
use bollard::models::{ContainerStateStatusEnum, HealthStatusEnum};
use bollard::query_parameters::ListContainersOptions;
use bollard::Docker;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::info;

use crate::domain::health::ServiceId;
use crate::domain::runtime::{ContainerHealth, ContainerRuntime, ContainerState, ContainerStatus, RuntimeError};

/// Number of health check log entries surfaced as fault evidence
const HEALTH_LOG_TAIL: usize = 3;

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(socket_path: Option<String>) -> Result<Self, RuntimeError> {
        // Connect to Docker daemon (custom socket or auto-detect)
        let docker = if let Some(path) = socket_path {
            Docker::connect_with_unix(&path, 120, bollard::API_DEFAULT_VERSION).map_err(|e| {
                RuntimeError::Connection(format!(
                    "Failed to connect to Docker at {}: {}\n\n\
                     Ensure Docker is running and the socket path is correct.",
                    path, e
                ))
            })?
        } else {
            Docker::connect_with_local_defaults().map_err(|e| {
                RuntimeError::Connection(format!(
                    "Failed to connect to Docker: {}\n\n\
                     Common causes:\n\
                     - Docker daemon not running (check: docker ps)\n\
                     - Permission denied accessing Docker socket\n\
                     - Current user not in 'docker' group",
                    e
                ))
            })?
        };

        Ok(Self { docker })
    }

    /// Verify Docker daemon is accessible
    pub async fn healthcheck(&self) -> Result<(), RuntimeError> {
        self.docker
            .ping()
            .await
            .map_err(|e| RuntimeError::Connection(format!("Cannot connect to Docker daemon: {}", e)))?;
        Ok(())
    }
}

fn map_docker_error(id: &str, error: DockerError, fallback: fn(String) -> RuntimeError) -> RuntimeError {
    match error {
        DockerError::DockerResponseServerError { status_code: 404, .. } => RuntimeError::NotFound(id.to_string()),
        DockerError::DockerResponseServerError { status_code: 403, message } => {
            RuntimeError::PermissionDenied(message)
        }
        DockerError::DockerResponseServerError { status_code, message } => {
            fallback(format!("{} (HTTP {}): {}", id, status_code, message))
        }
        other => RuntimeError::Connection(other.to_string()),
    }
}

fn map_state(status: Option<ContainerStateStatusEnum>) -> ContainerState {
    match status {
        Some(ContainerStateStatusEnum::CREATED) => ContainerState::Created,
        Some(ContainerStateStatusEnum::RUNNING) => ContainerState::Running,
        Some(ContainerStateStatusEnum::PAUSED) => ContainerState::Paused,
        Some(ContainerStateStatusEnum::RESTARTING) => ContainerState::Restarting,
        Some(ContainerStateStatusEnum::REMOVING) => ContainerState::Removing,
        Some(ContainerStateStatusEnum::EXITED) => ContainerState::Exited,
        Some(ContainerStateStatusEnum::DEAD) => ContainerState::Dead,
        _ => ContainerState::Unknown,
    }
}

fn map_health(status: Option<HealthStatusEnum>) -> ContainerHealth {
    match status {
        Some(HealthStatusEnum::STARTING) => ContainerHealth::Starting,
        Some(HealthStatusEnum::HEALTHY) => ContainerHealth::Healthy,
        Some(HealthStatusEnum::UNHEALTHY) => ContainerHealth::Unhealthy,
        _ => ContainerHealth::None,
    }
}

/// Label filter in Docker's `key` / `key=value` syntax
fn label_filters(label_selector: &str) -> HashMap<String, Vec<String>> {
    HashMap::from([("label".to_string(), vec![label_selector.to_string()])])
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list(&self, label_selector: &str) -> Result<Vec<ServiceId>, RuntimeError> {
        let options = ListContainersOptions {
            all: true,
            filters: Some(label_filters(label_selector)),
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| map_docker_error(label_selector, e, RuntimeError::InspectFailed))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let name = c
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|n| n.trim_start_matches('/').to_string());
                name.or(c.id).map(ServiceId::new)
            })
            .collect())
    }

    async fn inspect(&self, id: &ServiceId) -> Result<ContainerStatus, RuntimeError> {
        let inspect = self
            .docker
            .inspect_container(id.as_str(), None)
            .await
            .map_err(|e| map_docker_error(id.as_str(), e, RuntimeError::InspectFailed))?;

        let state = inspect.state.unwrap_or_default();
        let health = state.health.clone().unwrap_or_default();
        let health_log = health
            .log
            .unwrap_or_default()
            .into_iter()
            .rev()
            .filter(|entry| entry.exit_code.unwrap_or(0) != 0)
            .filter_map(|entry| entry.output)
            .map(|output| output.trim().to_string())
            .filter(|output| !output.is_empty())
            .take(HEALTH_LOG_TAIL)
            .collect();

        Ok(ContainerStatus {
            service_id: id.clone(),
            state: map_state(state.status),
            health: map_health(health.status),
            exit_code: state.exit_code,
            oom_killed: state.oom_killed.unwrap_or(false),
            error: state.error.filter(|e| !e.is_empty()),
            health_log,
            started_at: state
                .started_at
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|t| t.with_timezone(&Utc)),
        })
    }

    async fn restart(&self, id: &ServiceId) -> Result<(), RuntimeError> {
        self.docker
            .restart_container(id.as_str(), None)
            .await
            .map_err(|e| map_docker_error(id.as_str(), e, RuntimeError::RestartFailed))?;

        info!(service_id = %id, "Restarted container");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mapping() {
        assert_eq!(map_state(Some(ContainerStateStatusEnum::RUNNING)), ContainerState::Running);
        assert_eq!(map_state(Some(ContainerStateStatusEnum::DEAD)), ContainerState::Dead);
        assert_eq!(map_state(None), ContainerState::Unknown);
        assert_eq!(map_health(Some(HealthStatusEnum::STARTING)), ContainerHealth::Starting);
        assert_eq!(map_health(None), ContainerHealth::None);
    }

    #[test]
    fn test_error_mapping() {
        let not_found = DockerError::DockerResponseServerError {
            status_code: 404,
            message: "No such container: qdrant".to_string(),
        };
        assert!(matches!(
            map_docker_error("qdrant", not_found, RuntimeError::InspectFailed),
            RuntimeError::NotFound(_)
        ));

        let server = DockerError::DockerResponseServerError {
            status_code: 500,
            message: "driver failed".to_string(),
        };
        assert!(matches!(
            map_docker_error("qdrant", server, RuntimeError::RestartFailed),
            RuntimeError::RestartFailed(_)
        ));
    }

    #[test]
    fn test_label_filters() {
        let filters = label_filters("hcoord.monitor=true");
        assert_eq!(filters["label"], vec!["hcoord.monitor=true".to_string()]);
    }
}
