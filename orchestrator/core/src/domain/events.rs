// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::context::ContextItemId;
use crate::domain::fault::{FaultCategory, Remediation};
use crate::domain::health::{ActionOutcome, ServiceId};
use crate::domain::interaction::{Outcome, ValueScore};

/// Knowledge-side events emitted by the interaction recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LearningEvent {
    InteractionRecorded {
        session_id: String,
        outcome: Outcome,
        value_score: ValueScore,
        recorded_at: DateTime<Utc>,
    },
    PatternPromoted {
        session_id: String,
        item_id: ContextItemId,
        composite: f64,
        promoted_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HealingEvent {
    ServiceUnhealthy {
        service_id: ServiceId,
        category: FaultCategory,
        consecutive_failures: u32,
        detected_at: DateTime<Utc>,
    },
    RemediationIssued {
        service_id: ServiceId,
        category: FaultCategory,
        remediation: Remediation,
        outcome: ActionOutcome,
        issued_at: DateTime<Utc>,
    },
    RemediationSkipped {
        service_id: ServiceId,
        category: FaultCategory,
        reason: String,
        skipped_at: DateTime<Utc>,
    },
    ServiceRecovered {
        service_id: ServiceId,
        after: FaultCategory,
        recovered_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResilienceEvent {
    CircuitOpened {
        dependency: String,
        failure_count: u32,
        opened_at: DateTime<Utc>,
    },
    CircuitHalfOpened {
        dependency: String,
        at: DateTime<Utc>,
    },
    CircuitClosed {
        dependency: String,
        closed_at: DateTime<Utc>,
    },
}

impl LearningEvent {
    pub fn session_id(&self) -> &str {
        match self {
            LearningEvent::InteractionRecorded { session_id, .. }
            | LearningEvent::PatternPromoted { session_id, .. } => session_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LearningEvent::InteractionRecorded { .. } => "interaction_recorded",
            LearningEvent::PatternPromoted { .. } => "pattern_promoted",
        }
    }
}

impl HealingEvent {
    pub fn service_id(&self) -> &ServiceId {
        match self {
            HealingEvent::ServiceUnhealthy { service_id, .. }
            | HealingEvent::RemediationIssued { service_id, .. }
            | HealingEvent::RemediationSkipped { service_id, .. }
            | HealingEvent::ServiceRecovered { service_id, .. } => service_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HealingEvent::ServiceUnhealthy { .. } => "service_unhealthy",
            HealingEvent::RemediationIssued { .. } => "healing_action",
            HealingEvent::RemediationSkipped { .. } => "remediation_skipped",
            HealingEvent::ServiceRecovered { .. } => "service_recovered",
        }
    }
}

impl ResilienceEvent {
    pub fn dependency(&self) -> &str {
        match self {
            ResilienceEvent::CircuitOpened { dependency, .. }
            | ResilienceEvent::CircuitHalfOpened { dependency, .. }
            | ResilienceEvent::CircuitClosed { dependency, .. } => dependency,
        }
    }
}
