//! Container lifecycle events.
//!
//! Workers emit events fire-and-forget; whoever consumes them (state
//! reconciliation, notification fan-out) is outside this crate.

use chrono::{DateTime, Utc};
use corral_common::types::ContainerId;
use crossbeam_channel::Sender;
use serde::Serialize;

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum EventType {
    /// The container's on-disk state should be removed.
    Delete,
}

/// A container lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: EventType,
    /// Container the event concerns.
    pub id: ContainerId,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(kind: EventType, id: ContainerId) -> Self {
        Self {
            kind,
            id,
            timestamp: Utc::now(),
        }
    }
}

/// Receives lifecycle events. Delivery is best effort with no acknowledgment.
pub trait EventSink: Send + Sync {
    /// Hands an event to the sink.
    fn emit(&self, event: Event);
}

impl EventSink for Sender<Event> {
    fn emit(&self, event: Event) {
        if let Err(e) = Self::send(self, event) {
            tracing::debug!(id = %e.0.id, kind = ?e.0.kind, "event dropped: no receiver");
        }
    }
}
