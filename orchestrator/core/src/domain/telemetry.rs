// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Telemetry log records and the append-only log port

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of the telemetry log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    /// e.g. `interaction`, `pattern_promoted`, `healing_action`, `breaker_transition`
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    pub payload: serde_json::Value,
}

impl TelemetryRecord {
    pub fn for_session(kind: impl Into<String>, session_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: kind.into(),
            session_id: Some(session_id.into()),
            service_id: None,
            payload,
        }
    }

    pub fn for_service(kind: impl Into<String>, service_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: kind.into(),
            session_id: None,
            service_id: Some(service_id.into()),
            payload,
        }
    }

    pub fn system(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: kind.into(),
            session_id: None,
            service_id: None,
            payload,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Telemetry log IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Telemetry record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Append-only, one JSON object per line. Readers ignore lines that fail to parse.
#[async_trait]
pub trait TelemetryLog: Send + Sync {
    async fn append(&self, record: &TelemetryRecord) -> Result<(), TelemetryError>;

    async fn read_all(&self) -> Result<Vec<TelemetryRecord>, TelemetryError>;

    /// Last `limit` records, oldest first
    async fn read_recent(&self, limit: usize) -> Result<Vec<TelemetryRecord>, TelemetryError> {
        let mut records = self.read_all().await?;
        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }
}
