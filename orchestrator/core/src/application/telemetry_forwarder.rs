// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Telemetry Forwarder Application Service
//!
//! Subscribes to the event bus and appends every learning, healing and
//! resilience event to the telemetry log as one JSON line.
//!
//! Never takes the coordinator down: append failures are logged and the
//! event is dropped.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::telemetry::{TelemetryLog, TelemetryRecord};
use crate::infrastructure::event_bus::{DomainEvent, EventBus, EventBusError};

pub struct TelemetryForwarder {
    telemetry: Arc<dyn TelemetryLog>,
    event_bus: EventBus,
    shutdown_token: CancellationToken,
}

impl TelemetryForwarder {
    pub fn new(telemetry: Arc<dyn TelemetryLog>, event_bus: EventBus, shutdown_token: CancellationToken) -> Self {
        Self {
            telemetry,
            event_bus,
            shutdown_token,
        }
    }

    /// Spawn the forwarding task. It subscribes before returning, so no event
    /// published after `start` is missed.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        info!("Starting telemetry forwarder background task");
        let mut receiver = self.event_bus.subscribe();

        tokio::spawn(async move {
            let mut forwarded = 0u64;
            let mut errors = 0u64;

            loop {
                let received = tokio::select! {
                    received = receiver.recv() => received,
                    _ = self.shutdown_token.cancelled() => {
                        info!(forwarded, errors, "Shutdown signal received, stopping telemetry forwarder");
                        break;
                    }
                };

                match received {
                    Ok(event) => {
                        let result = match to_record(&event) {
                            Ok(record) => self.telemetry.append(&record).await.map_err(|e| e.to_string()),
                            Err(e) => Err(e.to_string()),
                        };
                        match result {
                            Ok(()) => {
                                forwarded += 1;
                                if forwarded % 100 == 0 {
                                    debug!(forwarded, errors, "Telemetry forwarder progress");
                                }
                            }
                            Err(e) => {
                                errors += 1;
                                error!(event = ?event, error = %e, "Failed to append event to telemetry log");
                            }
                        }
                    }
                    Err(EventBusError::Closed) => {
                        info!(forwarded, errors, "Event bus closed, stopping telemetry forwarder");
                        break;
                    }
                    Err(EventBusError::Lagged(n)) => {
                        warn!(skipped = n, "Telemetry forwarder lagged, events were dropped");
                    }
                    Err(e) => {
                        error!(error = ?e, "Unexpected error receiving event from bus");
                    }
                }
            }
        })
    }
}

pub fn to_record(event: &DomainEvent) -> Result<TelemetryRecord, serde_json::Error> {
    Ok(match event {
        DomainEvent::Learning(e) => TelemetryRecord::for_session(e.kind(), e.session_id(), serde_json::to_value(e)?),
        DomainEvent::Healing(e) => {
            TelemetryRecord::for_service(e.kind(), e.service_id().as_str(), serde_json::to_value(e)?)
        }
        DomainEvent::Resilience(e) => TelemetryRecord::system("breaker_transition", serde_json::to_value(e)?),
    })
}
