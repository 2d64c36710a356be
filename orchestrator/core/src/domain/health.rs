// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service health records and the healing action log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::fault::{FaultCategory, Remediation};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(pub String);

impl ServiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// One per monitored service. Mutated only by the healing orchestrator,
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealthRecord {
    pub service_id: ServiceId,
    pub last_check_at: Option<DateTime<Utc>>,
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub dependency_ids: Vec<ServiceId>,
    /// Set once a remediation was issued and cleared on recovery
    #[serde(default)]
    pub awaiting_recovery: Option<FaultCategory>,
}

impl ServiceHealthRecord {
    pub fn new(service_id: ServiceId, dependency_ids: Vec<ServiceId>) -> Self {
        Self {
            service_id,
            last_check_at: None,
            status: HealthStatus::Healthy,
            consecutive_failures: 0,
            dependency_ids,
            awaiting_recovery: None,
        }
    }

    pub fn mark_failed(&mut self, at: DateTime<Utc>) {
        self.last_check_at = Some(at);
        self.status = HealthStatus::Unhealthy;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Returns the fault that was being remediated, if this check is a recovery
    pub fn mark_passed(&mut self, status: HealthStatus, at: DateTime<Utc>) -> Option<FaultCategory> {
        self.last_check_at = Some(at);
        self.status = status;
        self.consecutive_failures = 0;
        self.awaiting_recovery.take()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Succeeded,
    Failed,
    Alerted,
}

impl ActionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOutcome::Succeeded => "succeeded",
            ActionOutcome::Failed => "failed",
            ActionOutcome::Alerted => "alerted",
        }
    }
}

/// Append-only record of a remediation attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingAction {
    pub service_id: ServiceId,
    pub pattern_matched: FaultCategory,
    pub action_taken: Remediation,
    /// Services restarted, in order
    #[serde(default)]
    pub restarted: Vec<ServiceId>,
    pub issued_at: DateTime<Utc>,
    pub outcome: ActionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub cooldown_until: DateTime<Utc>,
}

impl HealingAction {
    /// A new action for the same service is rejected while this returns true
    pub fn blocks(&self, now: DateTime<Utc>) -> bool {
        now < self.cooldown_until
    }
}

/// Per-service view returned by `GET /healing/statistics`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingStatistics {
    pub services: Vec<ServiceHealthRecord>,
    pub recent_actions: Vec<HealingAction>,
    pub total_actions: u64,
    pub skipped_remediations: u64,
}
