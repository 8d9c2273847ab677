//! Event types for the engine event system
//!
//! Provides shared event definitions and EventBus for engine components.
//! Events are observability plumbing only; no engine decision reads them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Engine event types
///
/// Events are broadcast via EventBus and can be serialized for transports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// A new version was appended to a blog
    VersionAppended {
        blog_id: Uuid,
        version_id: Uuid,
        version_number: i64,
        source: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An evaluation run was created and handed to the workflow runner
    EvaluationStarted {
        run_id: Uuid,
        version_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An evaluation run reached a terminal status
    EvaluationFinalized {
        run_id: Uuid,
        version_id: Uuid,
        status: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A rewrite cycle reached completed or terminal status
    RewriteCycleFinished {
        cycle_id: Uuid,
        parent_version_id: Uuid,
        status: String,
        stop_reason: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An approval was recorded for a blog version
    ApprovalRecorded {
        blog_id: Uuid,
        version_id: Uuid,
        approver_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The current approval of a blog was revoked
    ApprovalRevoked {
        blog_id: Uuid,
        revoked_by: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A review state machine transition happened
    ReviewStateChanged {
        version_id: Uuid,
        old_state: String,
        new_state: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An escalation was opened (automation hard-stop)
    EscalationOpened {
        blog_id: Uuid,
        version_id: Uuid,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Broadcast bus for engine events
///
/// Cloning is cheap; all clones share the same channel. Send never blocks;
/// if no subscriber is listening the event is dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the number of subscribers that received the event.
    pub fn emit(&self, event: EngineEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
