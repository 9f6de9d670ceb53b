//! Domain event system — decoupled telemetry for the coordination loop.
//!
//! Events are published when something interesting happens during a turn.
//! The bus is an explicit dependency passed into the coordinator's
//! constructor; there is no process-wide static hook.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A strategy (or the continuity heuristic) picked the next agent
    AgentSelected {
        session_id: String,
        agent: String,
        strategy: String,
        timestamp: DateTime<Utc>,
    },

    /// A variable write was applied to the store
    VariableWritten {
        session_id: String,
        variable: String,
        agent: String,
        confidence: f64,
        timestamp: DateTime<Utc>,
    },

    /// A full turn (select → prompt → invoke → record) finished
    TurnCompleted {
        session_id: String,
        agent: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A turn failed; store and message log were left unmodified
    TurnFailed {
        session_id: String,
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::AgentSelected {
            session_id: "sess-1".into(),
            agent: "planner".into(),
            strategy: "rotating".into(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::AgentSelected { agent, strategy, .. } => {
                assert_eq!(agent, "planner");
                assert_eq!(strategy, "rotating");
            }
            _ => panic!("Expected AgentSelected event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        // Publishing with no subscribers should not panic
        bus.publish(DomainEvent::TurnFailed {
            session_id: "sess-1".into(),
            context: "test".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
