// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Healing Orchestrator - Background monitor for the service fleet
//!
//! Every cycle probes each monitored service in parallel. A failing probe
//! increments the service's failure count, is classified by the
//! [`ErrorPatternMatcher`], and triggers the category's remediation unless
//! the service is still inside the cooldown of its previous action.
//!
//! Checks and remediation of one service are serialized by a per-service
//! mutex; a cycle that finds the mutex held skips that service. Statistics
//! are served from a snapshot, so reading them never waits on a restart.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Autonomous detection and bounded repair of service failures

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::interaction_recorder::InteractionRecorder;
use crate::domain::coordinator_config::{HealingConfig, MonitoredServiceConfig};
use crate::domain::error::CoordinatorError;
use crate::domain::events::HealingEvent;
use crate::domain::fault::{ErrorPatternMatcher, FaultCategory, FaultEvidence, Remediation};
use crate::domain::health::{
    ActionOutcome, HealingAction, HealingStatistics, HealthStatus, ServiceHealthRecord, ServiceId,
};
use crate::domain::interaction::{Feedback, Interaction, Outcome};
use crate::domain::runtime::{ContainerHealth, ContainerRuntime, ContainerState, ContainerStatus};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone)]
pub struct HealingSettings {
    pub enabled: bool,
    pub interval: Duration,
    pub cooldown: Duration,
    pub label_selector: Option<String>,
    pub history_limit: usize,
    /// Timeout of HTTP liveness probes
    pub probe_timeout: Duration,
}

impl HealingSettings {
    pub fn from_config(config: &HealingConfig, probe_timeout: Duration) -> Self {
        Self {
            enabled: config.enabled,
            interval: config.interval,
            cooldown: config.cooldown,
            label_selector: config.label_selector.clone(),
            history_limit: config.history_limit.max(1),
            probe_timeout,
        }
    }
}

/// Result of one liveness probe
#[derive(Debug, Clone)]
enum Probe {
    Passed(HealthStatus),
    Failed(FaultEvidence),
}

struct ServiceState {
    record: ServiceHealthRecord,
    last_action: Option<HealingAction>,
}

struct ServiceSlot {
    health_url: Option<String>,
    state: Mutex<ServiceState>,
    snapshot: RwLock<ServiceHealthRecord>,
}

impl ServiceSlot {
    fn new(service_id: ServiceId, dependencies: Vec<ServiceId>, health_url: Option<String>) -> Self {
        let record = ServiceHealthRecord::new(service_id, dependencies);
        Self {
            health_url,
            snapshot: RwLock::new(record.clone()),
            state: Mutex::new(ServiceState {
                record,
                last_action: None,
            }),
        }
    }
}

pub struct HealingOrchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    matcher: ErrorPatternMatcher,
    services: DashMap<ServiceId, Arc<ServiceSlot>>,
    history: RwLock<VecDeque<HealingAction>>,
    total_actions: AtomicU64,
    skipped_remediations: AtomicU64,
    recorder: Option<Arc<InteractionRecorder>>,
    event_bus: EventBus,
    http: reqwest::Client,
    settings: HealingSettings,
    shutdown_token: CancellationToken,
}

impl HealingOrchestrator {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        matcher: ErrorPatternMatcher,
        event_bus: EventBus,
        settings: HealingSettings,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            runtime,
            matcher,
            services: DashMap::new(),
            history: RwLock::new(VecDeque::new()),
            total_actions: AtomicU64::new(0),
            skipped_remediations: AtomicU64::new(0),
            recorder: None,
            event_bus,
            http: reqwest::Client::new(),
            settings,
            shutdown_token,
        }
    }

    /// Record recoveries as interactions through the learning path
    pub fn with_recorder(mut self, recorder: Arc<InteractionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Monitor a service; registering an already-known id is a no-op
    pub fn register(&self, service_id: ServiceId, dependencies: Vec<ServiceId>, health_url: Option<String>) {
        self.services
            .entry(service_id.clone())
            .or_insert_with(|| {
                info!(service_id = %service_id, "Monitoring service");
                Arc::new(ServiceSlot::new(service_id, dependencies, health_url))
            });
    }

    pub fn register_all(&self, services: &[MonitoredServiceConfig]) {
        for service in services {
            self.register(
                ServiceId::new(service.id.clone()),
                service.dependencies.iter().cloned().map(ServiceId::new).collect(),
                service.health_url.clone(),
            );
        }
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if !self.settings.enabled {
            info!("Healing orchestrator is disabled");
            return;
        }

        info!(
            interval_secs = self.settings.interval.as_secs(),
            cooldown_secs = self.settings.cooldown.as_secs(),
            services = self.services.len(),
            "Starting healing orchestrator"
        );

        let mut tick = interval(self.settings.interval);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let actions = self.run_cycle().await;
                    debug!(actions, "Healing cycle completed");
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping healing orchestrator");
                    break;
                }
            }
        }

        info!("Healing orchestrator stopped");
    }

    /// One probe of every monitored service. Returns the number of actions issued.
    pub async fn run_cycle(&self) -> usize {
        if let Some(selector) = &self.settings.label_selector {
            match self.runtime.list(selector).await {
                Ok(discovered) => {
                    for service_id in discovered {
                        self.register(service_id, Vec::new(), None);
                    }
                }
                Err(e) => warn!(label_selector = %selector, error = %e, "Service discovery failed"),
            }
        }

        let slots: Vec<Arc<ServiceSlot>> = self.services.iter().map(|entry| entry.value().clone()).collect();
        let checks = slots.iter().map(|slot| self.check_service(slot));
        futures::future::join_all(checks)
            .await
            .into_iter()
            .filter(Option::is_some)
            .count()
    }

    async fn check_service(&self, slot: &ServiceSlot) -> Option<HealingAction> {
        let Ok(mut state) = slot.state.try_lock() else {
            debug!("Previous check still in progress, skipping");
            return None;
        };
        let service_id = state.record.service_id.clone();
        let probe = self.probe(&service_id, slot.health_url.as_deref()).await;
        let now = Utc::now();

        let action = match probe {
            Probe::Passed(status) => {
                if let Some(category) = state.record.mark_passed(status, now) {
                    self.on_recovered(&service_id, category, state.last_action.as_ref()).await;
                }
                None
            }
            Probe::Failed(evidence) => {
                state.record.mark_failed(now);
                let category = self.matcher.classify(&evidence);
                warn!(
                    service_id = %service_id,
                    category = %category,
                    consecutive_failures = state.record.consecutive_failures,
                    "Service failed liveness probe"
                );
                self.event_bus.publish_healing_event(HealingEvent::ServiceUnhealthy {
                    service_id: service_id.clone(),
                    category,
                    consecutive_failures: state.record.consecutive_failures,
                    detected_at: now,
                });

                match self.remediate(&mut state, category, &evidence).await {
                    Ok(action) => Some(action),
                    Err(skipped) => {
                        debug!(error = %skipped, "No remediation issued");
                        None
                    }
                }
            }
        };

        *slot.snapshot.write() = state.record.clone();
        action
    }

    async fn probe(&self, service_id: &ServiceId, health_url: Option<&str>) -> Probe {
        let status = match self.runtime.inspect(service_id).await {
            Ok(status) => status,
            Err(e) => return Probe::Failed(FaultEvidence::message(e.to_string())),
        };

        if status.has_exited() || status.health == ContainerHealth::Unhealthy {
            return Probe::Failed(evidence_from(&status));
        }

        match status.state {
            ContainerState::Running => {}
            ContainerState::Restarting | ContainerState::Created | ContainerState::Paused => {
                return Probe::Passed(HealthStatus::Degraded)
            }
            _ => return Probe::Failed(evidence_from(&status)),
        }

        if let Some(url) = health_url {
            if let Err(message) = self.probe_http(url).await {
                let mut evidence = evidence_from(&status);
                evidence.messages.push(message);
                return Probe::Failed(evidence);
            }
        }

        if status.health == ContainerHealth::Starting {
            Probe::Passed(HealthStatus::Degraded)
        } else {
            Probe::Passed(HealthStatus::Healthy)
        }
    }

    async fn probe_http(&self, url: &str) -> Result<(), String> {
        let response = self
            .http
            .get(url)
            .timeout(self.settings.probe_timeout)
            .send()
            .await
            .map_err(|e| error_chain(&e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("health endpoint {} returned HTTP {}", url, response.status().as_u16()))
        }
    }

    /// Issue the category's remediation, or explain why none was issued
    async fn remediate(
        &self,
        state: &mut ServiceState,
        category: FaultCategory,
        evidence: &FaultEvidence,
    ) -> Result<HealingAction, CoordinatorError> {
        let service_id = state.record.service_id.clone();
        let now = Utc::now();

        if let Some(previous) = state.last_action.as_ref().filter(|a| a.blocks(now)) {
            let reason = format!("cooldown active until {}", previous.cooldown_until.to_rfc3339());
            return Err(self.skip(&service_id, category, reason));
        }

        let remediation = category.remediation();
        let mut restarted = Vec::new();
        let (outcome, detail) = match remediation {
            Remediation::None => {
                return Err(self.skip(&service_id, category, "no remediation for unknown fault".to_string()));
            }
            Remediation::AlertOnly => {
                error!(
                    service_id = %service_id,
                    category = %category,
                    evidence = ?evidence.messages,
                    "Fault requires manual intervention, not acting automatically"
                );
                (ActionOutcome::Alerted, evidence.messages.first().cloned())
            }
            Remediation::RestartService => self.restart_in_order(&[service_id.clone()], &mut restarted).await,
            Remediation::RestartWithDependencies => {
                let mut targets = state.record.dependency_ids.clone();
                targets.push(service_id.clone());
                self.restart_in_order(&targets, &mut restarted).await
            }
        };

        let action = HealingAction {
            service_id: service_id.clone(),
            pattern_matched: category,
            action_taken: remediation,
            restarted,
            issued_at: now,
            outcome,
            detail,
            cooldown_until: now
                + chrono::Duration::from_std(self.settings.cooldown).unwrap_or_else(|_| chrono::Duration::days(365)),
        };

        if remediation.is_automated() && outcome == ActionOutcome::Succeeded {
            state.record.awaiting_recovery = Some(category);
        }
        state.last_action = Some(action.clone());
        self.append_history(action.clone());

        info!(
            service_id = %service_id,
            category = %category,
            remediation = ?remediation,
            outcome = outcome.as_str(),
            "Healing action issued"
        );
        metrics::counter!(
            "hcoord_healing_actions_total",
            "category" => category.as_str(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
        self.event_bus.publish_healing_event(HealingEvent::RemediationIssued {
            service_id,
            category,
            remediation,
            outcome,
            issued_at: now,
        });

        Ok(action)
    }

    /// Restart each target in order, stopping at the first failure
    async fn restart_in_order(
        &self,
        targets: &[ServiceId],
        restarted: &mut Vec<ServiceId>,
    ) -> (ActionOutcome, Option<String>) {
        for target in targets {
            // A dependency under its own check is left to that check
            let dependency = if Some(target) == targets.last() {
                None
            } else {
                self.services.get(target).map(|slot| slot.value().clone())
            };
            let _dependency_guard = match &dependency {
                Some(slot) => match slot.state.try_lock() {
                    Ok(guard) => Some(guard),
                    Err(_) => {
                        debug!(service_id = %target, "Dependency busy, not restarting it");
                        continue;
                    }
                },
                None => None,
            };

            match self.runtime.restart(target).await {
                Ok(()) => restarted.push(target.clone()),
                Err(e) => {
                    warn!(service_id = %target, error = %e, "Restart failed");
                    return (ActionOutcome::Failed, Some(format!("restart of {} failed: {}", target, e)));
                }
            }
        }
        (ActionOutcome::Succeeded, None)
    }

    fn skip(&self, service_id: &ServiceId, category: FaultCategory, reason: String) -> CoordinatorError {
        self.skipped_remediations.fetch_add(1, Ordering::Relaxed);
        self.event_bus.publish_healing_event(HealingEvent::RemediationSkipped {
            service_id: service_id.clone(),
            category,
            reason: reason.clone(),
            skipped_at: Utc::now(),
        });
        CoordinatorError::RemediationSkipped {
            service_id: service_id.to_string(),
            reason,
        }
    }

    fn append_history(&self, action: HealingAction) {
        self.total_actions.fetch_add(1, Ordering::Relaxed);
        let mut history = self.history.write();
        history.push_back(action);
        while history.len() > self.settings.history_limit {
            history.pop_front();
        }
    }

    async fn on_recovered(&self, service_id: &ServiceId, category: FaultCategory, action: Option<&HealingAction>) {
        info!(service_id = %service_id, after = %category, "Service recovered");
        self.event_bus.publish_healing_event(HealingEvent::ServiceRecovered {
            service_id: service_id.clone(),
            after: category,
            recovered_at: Utc::now(),
        });

        let Some(recorder) = &self.recorder else {
            return;
        };
        let restarted: Vec<String> = action
            .map(|a| a.restarted.iter().map(ServiceId::to_string).collect())
            .unwrap_or_default();
        let response = format!(
            "Service {} recovered from {} after {}. Restarted in order: {}",
            service_id,
            category,
            category.remediation().as_str(),
            if restarted.is_empty() { "none".to_string() } else { restarted.join(", ") },
        );
        let interaction = Interaction::new(
            format!("healing:{}", service_id),
            vec![format!("{} {}", service_id, category)],
            response,
            Outcome::Success,
            Feedback::Neutral,
            None,
        );
        let mut metadata = serde_json::Map::new();
        metadata.insert("service_id".to_string(), json!(service_id));
        metadata.insert("category".to_string(), json!(category));
        if let Err(e) = recorder.record_interaction(interaction, metadata).await {
            warn!(service_id = %service_id, error = %e, "Failed to record recovery pattern");
        }
    }

    pub fn statistics(&self) -> HealingStatistics {
        let mut services: Vec<ServiceHealthRecord> = self
            .services
            .iter()
            .map(|entry| entry.value().snapshot.read().clone())
            .collect();
        services.sort_by(|a, b| a.service_id.cmp(&b.service_id));

        HealingStatistics {
            services,
            recent_actions: self.history.read().iter().cloned().collect(),
            total_actions: self.total_actions.load(Ordering::Relaxed),
            skipped_remediations: self.skipped_remediations.load(Ordering::Relaxed),
        }
    }
}

fn evidence_from(status: &ContainerStatus) -> FaultEvidence {
    let mut messages: Vec<String> = status.error.iter().cloned().collect();
    messages.extend(status.health_log.iter().cloned());
    FaultEvidence {
        messages,
        exit_code: status.exit_code,
        oom_killed: status.oom_killed,
        exited: status.has_exited(),
    }
}

/// Error with its sources, e.g. `error sending request: connection refused`
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::runtime::RuntimeError;
    use async_trait::async_trait;

    /// Container runtime whose inspect results are set per service
    #[derive(Default)]
    struct ScriptedRuntime {
        statuses: parking_lot::Mutex<std::collections::HashMap<ServiceId, ContainerStatus>>,
        restarts: parking_lot::Mutex<Vec<ServiceId>>,
        listed: Vec<ServiceId>,
    }

    impl ScriptedRuntime {
        fn set(&self, status: ContainerStatus) {
            self.statuses.lock().insert(status.service_id.clone(), status);
        }

        fn restarts(&self) -> Vec<ServiceId> {
            self.restarts.lock().clone()
        }
    }

    #[async_trait]
    impl ContainerRuntime for ScriptedRuntime {
        async fn list(&self, _label_selector: &str) -> Result<Vec<ServiceId>, RuntimeError> {
            Ok(self.listed.clone())
        }

        async fn inspect(&self, id: &ServiceId) -> Result<ContainerStatus, RuntimeError> {
            self.statuses
                .lock()
                .get(id)
                .cloned()
                .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
        }

        async fn restart(&self, id: &ServiceId) -> Result<(), RuntimeError> {
            self.restarts.lock().push(id.clone());
            Ok(())
        }
    }

    fn running(id: &str) -> ContainerStatus {
        ContainerStatus {
            service_id: ServiceId::new(id),
            state: ContainerState::Running,
            health: ContainerHealth::Healthy,
            exit_code: None,
            oom_killed: false,
            error: None,
            health_log: vec![],
            started_at: None,
        }
    }

    fn failing(id: &str, message: &str) -> ContainerStatus {
        ContainerStatus {
            health: ContainerHealth::Unhealthy,
            health_log: vec![message.to_string()],
            ..running(id)
        }
    }

    fn settings(cooldown: Duration) -> HealingSettings {
        HealingSettings {
            enabled: true,
            interval: Duration::from_millis(10),
            cooldown,
            label_selector: None,
            history_limit: 10,
            probe_timeout: Duration::from_secs(1),
        }
    }

    fn orchestrator(runtime: Arc<ScriptedRuntime>, cooldown: Duration) -> HealingOrchestrator {
        HealingOrchestrator::new(
            runtime,
            ErrorPatternMatcher::new().unwrap(),
            EventBus::new(64),
            settings(cooldown),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_healthy_service_is_left_alone() {
        let runtime = Arc::new(ScriptedRuntime::default());
        runtime.set(running("qdrant"));
        let healer = orchestrator(runtime.clone(), Duration::from_secs(60));
        healer.register(ServiceId::new("qdrant"), vec![], None);

        assert_eq!(healer.run_cycle().await, 0);
        let stats = healer.statistics();
        assert_eq!(stats.services[0].status, HealthStatus::Healthy);
        assert!(stats.services[0].last_check_at.is_some());
        assert!(runtime.restarts().is_empty());
    }

    #[tokio::test]
    async fn test_cooldown_blocks_second_action() {
        let runtime = Arc::new(ScriptedRuntime::default());
        runtime.set(failing("qdrant", "bind: address already in use"));
        let healer = orchestrator(runtime.clone(), Duration::from_secs(60));
        healer.register(ServiceId::new("qdrant"), vec![], None);

        assert_eq!(healer.run_cycle().await, 1);
        assert_eq!(healer.run_cycle().await, 0);

        let stats = healer.statistics();
        assert_eq!(stats.total_actions, 1);
        assert_eq!(stats.skipped_remediations, 1);
        assert_eq!(stats.services[0].consecutive_failures, 2);
        assert_eq!(stats.recent_actions[0].pattern_matched, FaultCategory::PortConflict);
        assert_eq!(runtime.restarts(), vec![ServiceId::new("qdrant")]);
    }

    #[tokio::test]
    async fn test_action_after_cooldown_expiry() {
        let runtime = Arc::new(ScriptedRuntime::default());
        runtime.set(failing("qdrant", "Out of memory: Killed process 4242"));
        let healer = orchestrator(runtime.clone(), Duration::from_millis(30));
        healer.register(ServiceId::new("qdrant"), vec![], None);

        assert_eq!(healer.run_cycle().await, 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(healer.run_cycle().await, 1);
        assert_eq!(healer.statistics().total_actions, 2);
    }

    #[tokio::test]
    async fn test_dependencies_restart_first() {
        let runtime = Arc::new(ScriptedRuntime::default());
        runtime.set(failing("api", "dial tcp 10.0.0.3:6333: connect: connection refused"));
        runtime.set(running("qdrant"));
        runtime.set(running("redis"));
        let healer = orchestrator(runtime.clone(), Duration::from_secs(60));
        healer.register(
            ServiceId::new("api"),
            vec![ServiceId::new("qdrant"), ServiceId::new("redis")],
            None,
        );

        healer.run_cycle().await;
        assert_eq!(
            runtime.restarts(),
            vec![ServiceId::new("qdrant"), ServiceId::new("redis"), ServiceId::new("api")]
        );
        let action = &healer.statistics().recent_actions[0];
        assert_eq!(action.action_taken, Remediation::RestartWithDependencies);
        assert_eq!(action.outcome, ActionOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_permission_denied_is_alert_only() {
        let runtime = Arc::new(ScriptedRuntime::default());
        runtime.set(failing("postgres", "open /var/lib/postgresql/data: permission denied"));
        let healer = orchestrator(runtime.clone(), Duration::from_secs(60));
        healer.register(ServiceId::new("postgres"), vec![], None);

        healer.run_cycle().await;
        assert!(runtime.restarts().is_empty());
        let action = &healer.statistics().recent_actions[0];
        assert_eq!(action.outcome, ActionOutcome::Alerted);
        assert_eq!(action.pattern_matched, FaultCategory::PermissionDenied);
    }

    #[tokio::test]
    async fn test_unknown_fault_is_skipped() {
        let runtime = Arc::new(ScriptedRuntime::default());
        runtime.set(failing("worker", "something odd happened"));
        let healer = orchestrator(runtime.clone(), Duration::from_secs(60));
        healer.register(ServiceId::new("worker"), vec![], None);

        assert_eq!(healer.run_cycle().await, 0);
        let stats = healer.statistics();
        assert_eq!(stats.skipped_remediations, 1);
        assert_eq!(stats.services[0].status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_recovery_resets_failures() {
        let runtime = Arc::new(ScriptedRuntime::default());
        runtime.set(failing("qdrant", "database is locked"));
        let healer = orchestrator(runtime.clone(), Duration::from_secs(60));
        let mut events = healer.event_bus.subscribe();
        healer.register(ServiceId::new("qdrant"), vec![], None);

        healer.run_cycle().await;
        runtime.set(running("qdrant"));
        healer.run_cycle().await;

        let record = &healer.statistics().services[0];
        assert_eq!(record.consecutive_failures, 0);
        assert_eq!(record.status, HealthStatus::Healthy);
        assert!(record.awaiting_recovery.is_none());

        let mut recovered = false;
        while let Ok(event) = events.try_recv() {
            if let crate::infrastructure::event_bus::DomainEvent::Healing(HealingEvent::ServiceRecovered {
                after, ..
            }) = event
            {
                assert_eq!(after, FaultCategory::ResourceLocked);
                recovered = true;
            }
        }
        assert!(recovered);
    }

    #[tokio::test]
    async fn test_exited_container_with_oom_flag() {
        let runtime = Arc::new(ScriptedRuntime::default());
        runtime.set(ContainerStatus {
            state: ContainerState::Exited,
            exit_code: Some(137),
            oom_killed: true,
            ..running("ollama")
        });
        let healer = orchestrator(runtime.clone(), Duration::from_secs(60));
        healer.register(ServiceId::new("ollama"), vec![], None);

        healer.run_cycle().await;
        assert_eq!(
            healer.statistics().recent_actions[0].pattern_matched,
            FaultCategory::OutOfMemory
        );
    }

    #[tokio::test]
    async fn test_discovery_by_label() {
        let runtime = Arc::new(ScriptedRuntime {
            listed: vec![ServiceId::new("redis")],
            ..Default::default()
        });
        runtime.set(running("redis"));
        let mut s = settings(Duration::from_secs(60));
        s.label_selector = Some("hcoord.monitor=true".to_string());
        let healer = HealingOrchestrator::new(
            runtime.clone(),
            ErrorPatternMatcher::new().unwrap(),
            EventBus::new(16),
            s,
            CancellationToken::new(),
        );

        healer.run_cycle().await;
        assert_eq!(healer.statistics().services[0].service_id, ServiceId::new("redis"));
    }

    #[tokio::test]
    async fn test_http_probe_failure_is_classified() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let runtime = Arc::new(ScriptedRuntime::default());
        runtime.set(running("api"));
        let healer = orchestrator(runtime.clone(), Duration::from_secs(60));
        healer.register(ServiceId::new("api"), vec![], Some(format!("{}/healthz", server.url())));

        healer.run_cycle().await;
        mock.assert_async().await;
        let stats = healer.statistics();
        assert_eq!(stats.services[0].status, HealthStatus::Unhealthy);
        assert_eq!(stats.skipped_remediations, 1);
    }

    #[tokio::test]
    async fn test_start_stops_on_cancel() {
        let runtime = Arc::new(ScriptedRuntime::default());
        let healer = Arc::new(orchestrator(runtime, Duration::from_secs(60)));
        let token = healer.shutdown_token();
        let handle = healer.start();
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
