//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the admission service
//! and the worker pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use veostudio_core::types::DbId;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub const GENERATION_QUEUED: &str = "generation.queued";
pub const GENERATION_PROCESSING: &str = "generation.processing";
pub const GENERATION_ATTEMPT_FAILED: &str = "generation.attempt_failed";
pub const GENERATION_COMPLETED: &str = "generation.completed";
pub const GENERATION_FAILED: &str = "generation.failed";

// ---------------------------------------------------------------------------
// GenerationEvent
// ---------------------------------------------------------------------------

/// Something that happened to a generation.
///
/// Constructed via [`GenerationEvent::new`] and enriched with
/// [`for_generation`](GenerationEvent::for_generation),
/// [`with_user`](GenerationEvent::with_user) and
/// [`with_payload`](GenerationEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationEvent {
    /// Dot-separated event name, e.g. `"generation.completed"`.
    pub event_type: String,
    pub generation_id: Option<DbId>,
    pub user_id: Option<DbId>,
    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl GenerationEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            generation_id: None,
            user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn for_generation(mut self, generation_id: DbId) -> Self {
        self.generation_id = Some(generation_id);
        self
    }

    pub fn with_user(mut self, user_id: DbId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use veostudio_events::bus::{EventBus, GenerationEvent, GENERATION_QUEUED};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(GenerationEvent::new(GENERATION_QUEUED).for_generation(1));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<GenerationEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped if nobody
    /// is subscribed.
    pub fn publish(&self, event: GenerationEvent) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
