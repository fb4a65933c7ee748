//! Session event types and the EventBus used to fan them out
//!
//! Every session transition function returns the events it produced; the
//! owner of the session re-publishes them on an [`EventBus`] for UI,
//! logging and persistence listeners.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::rep_machine::RepState;
use crate::session::{SessionPhase, SessionSummary};
use crate::time::Timestamp;

/// Events emitted by a workout session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Session lifecycle phase changed
    PhaseChanged {
        from: SessionPhase,
        to: SessionPhase,
    },

    /// Tracked joint moved between Up and Down
    ///
    /// Emitted for both directions; a Down change is always followed by
    /// `RepCompleted`.
    RepStateChanged {
        state: RepState,
        /// Representative angle of the frame that caused the change
        angle: f64,
        timestamp: Timestamp,
    },

    /// A repetition was counted
    RepCompleted {
        count: u32,
        target: u32,
        timestamp: Timestamp,
    },

    /// Session ended by reaching the target or being stopped
    SessionCompleted { summary: SessionSummary },
}

impl SessionEvent {
    /// Event type name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::PhaseChanged { .. } => "PhaseChanged",
            SessionEvent::RepStateChanged { .. } => "RepStateChanged",
            SessionEvent::RepCompleted { .. } => "RepCompleted",
            SessionEvent::SessionCompleted { .. } => "SessionCompleted",
        }
    }
}

/// Broadcast fan-out for session events
///
/// Subscribers only receive events emitted after they subscribe. Slow
/// subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SessionEvent,
    ) -> Result<usize, broadcast::error::SendError<SessionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
