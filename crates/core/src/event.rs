//! Domain event system: decoupled observation of a research session.
//!
//! Events are published when something interesting happens in the session.
//! Observers (the CLI, tests, future telemetry) subscribe without the
//! orchestration loop knowing who is listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A tool call went through the dispatcher
    ToolDispatched {
        call_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A finding was persisted to the knowledge store
    KnowledgeSaved {
        id: u64,
        bytes: usize,
        timestamp: DateTime<Utc>,
    },

    /// A round ended and control returned to the caller
    RoundCompleted {
        conversation_id: String,
        round: u32,
        model_turns: u32,
        total_tokens: u64,
        timestamp: DateTime<Utc>,
    },

    /// The orchestration state machine moved
    SessionStateChanged {
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
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
        // No subscribers is fine
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
