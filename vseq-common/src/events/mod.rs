//! Event types for the sequence event system
//!
//! Provides shared event definitions and the EventBus used by the sequence
//! controller to notify the presentation layer.

mod playback_types;

pub use playback_types::{PlaybackState, SequencePhase};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Sequence event types
///
/// Every event carries the `session_id` of the mount that produced it, so a
/// subscriber that outlives a `replace_sequence` can drop events for the
/// previous list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SequenceEvent {
    /// Controller phase changed
    PhaseChanged {
        session_id: Uuid,
        old_phase: SequencePhase,
        new_phase: SequencePhase,
        timestamp: DateTime<Utc>,
    },

    /// A pre-flight duration probe settled (success or degraded zero)
    DurationProgress {
        session_id: Uuid,
        settled: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// Active segment changed (after a completed handle swap, or the first
    /// segment becoming active)
    SegmentChanged {
        session_id: Uuid,
        index: usize,
        segment_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A segment will not be played (its preload failed)
    SegmentSkipped {
        session_id: Uuid,
        index: usize,
        segment_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Play/pause state of the active handle changed
    PlaybackStateChanged {
        session_id: Uuid,
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// Final segment finished
    SequenceCompleted {
        session_id: Uuid,
        total_duration: f64,
        timestamp: DateTime<Utc>,
    },

    /// Sequence entered the error state
    SequenceFailed {
        session_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl SequenceEvent {
    /// Mount session this event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            SequenceEvent::PhaseChanged { session_id, .. }
            | SequenceEvent::DurationProgress { session_id, .. }
            | SequenceEvent::SegmentChanged { session_id, .. }
            | SequenceEvent::SegmentSkipped { session_id, .. }
            | SequenceEvent::PlaybackStateChanged { session_id, .. }
            | SequenceEvent::SequenceCompleted { session_id, .. }
            | SequenceEvent::SequenceFailed { session_id, .. } => *session_id,
        }
    }

    /// Event type name (matches the serde tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            SequenceEvent::PhaseChanged { .. } => "PhaseChanged",
            SequenceEvent::DurationProgress { .. } => "DurationProgress",
            SequenceEvent::SegmentChanged { .. } => "SegmentChanged",
            SequenceEvent::SegmentSkipped { .. } => "SegmentSkipped",
            SequenceEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            SequenceEvent::SequenceCompleted { .. } => "SequenceCompleted",
            SequenceEvent::SequenceFailed { .. } => "SequenceFailed",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the controller)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SequenceEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SequenceEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SequenceEvent,
    ) -> Result<usize, broadcast::error::SendError<SequenceEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SequenceEvent) {
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
