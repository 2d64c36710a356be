// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// In-memory event streaming over a tokio broadcast channel. The telemetry
// forwarder is the main subscriber; events are lost on restart, the durable
// record is the telemetry log it writes.

use crate::domain::events::{HealingEvent, LearningEvent, ResilienceEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Learning(LearningEvent),
    Healing(HealingEvent),
    Resilience(ResilienceEvent),
}

/// Event bus for publishing and subscribing to domain events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Capacity is the number of events buffered before slow receivers lag
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_learning_event(&self, event: LearningEvent) {
        self.publish(DomainEvent::Learning(event));
    }

    pub fn publish_healing_event(&self, event: HealingEvent) {
        self.publish(DomainEvent::Healing(event));
    }

    pub fn publish_resilience_event(&self, event: ResilienceEvent) {
        self.publish(DomainEvent::Resilience(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when nobody is subscribed
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish_resilience_event(ResilienceEvent::CircuitOpened {
            dependency: "vector_store".to_string(),
            failure_count: 5,
            opened_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            DomainEvent::Resilience(ResilienceEvent::CircuitOpened { dependency, failure_count, .. }) => {
                assert_eq!(dependency, "vector_store");
                assert_eq!(failure_count, 5);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish_resilience_event(ResilienceEvent::CircuitClosed {
            dependency: "embedding".to_string(),
            closed_at: Utc::now(),
        });

        assert!(receiver1.recv().await.is_ok());
        assert!(receiver2.recv().await.is_ok());
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let event_bus = EventBus::default();
        event_bus.publish_resilience_event(ResilienceEvent::CircuitHalfOpened {
            dependency: "embedding".to_string(),
            at: Utc::now(),
        });
        assert_eq!(event_bus.subscriber_count(), 0);
    }

    #[test]
    fn test_try_recv_empty() {
        let event_bus = EventBus::new(4);
        let mut receiver = event_bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}
