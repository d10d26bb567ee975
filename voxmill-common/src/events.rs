//! Event types for the Voxmill event system
//!
//! Provides shared event definitions and the EventBus used to fan batch
//! progress out to SSE clients and other in-process listeners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Outcome of a single batch item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOutcome {
    Completed,
    Failed,
}

/// Voxmill event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VoxEvent {
    /// Batch job accepted and stored in `pending`
    BatchJobCreated {
        job_id: Uuid,
        total_items: usize,
        timestamp: DateTime<Utc>,
    },

    /// Batch job dispatch began (`processing`)
    BatchJobStarted {
        job_id: Uuid,
        total_items: usize,
        timestamp: DateTime<Utc>,
    },

    /// One batch item resolved, successfully or not
    ///
    /// Emitted after the job record has been updated, so `completed_items`
    /// matches what a poller reading the job would see.
    BatchItemFinished {
        job_id: Uuid,
        index: usize,
        outcome: ItemOutcome,
        completed_items: usize,
        total_items: usize,
        timestamp: DateTime<Utc>,
    },

    /// Every item was attempted
    ///
    /// `failed_items > 0` signals a partial batch failure.
    BatchJobCompleted {
        job_id: Uuid,
        total_items: usize,
        failed_items: usize,
        timestamp: DateTime<Utc>,
    },

    /// Orchestration-level failure (items were not dispatched)
    BatchJobFailed {
        job_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl VoxEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            VoxEvent::BatchJobCreated { .. } => "BatchJobCreated",
            VoxEvent::BatchJobStarted { .. } => "BatchJobStarted",
            VoxEvent::BatchItemFinished { .. } => "BatchItemFinished",
            VoxEvent::BatchJobCompleted { .. } => "BatchJobCompleted",
            VoxEvent::BatchJobFailed { .. } => "BatchJobFailed",
        }
    }

    /// Job the event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            VoxEvent::BatchJobCreated { job_id, .. }
            | VoxEvent::BatchJobStarted { job_id, .. }
            | VoxEvent::BatchItemFinished { job_id, .. }
            | VoxEvent::BatchJobCompleted { job_id, .. }
            | VoxEvent::BatchJobFailed { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast channel wrapper shared by all components of a service
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VoxEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<VoxEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: VoxEvent) -> Result<usize, broadcast::error::SendError<VoxEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: VoxEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
