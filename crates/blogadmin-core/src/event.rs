//! Change notifications using tokio::broadcast
//!
//! The single channel the presentation layer subscribes to. Every initiated
//! load ends in exactly one of `Loaded`, `LoadFailed` or `LoadDiscarded`.

use crate::error::ApiError;
use crate::models::ResourceKind;
use tokio::sync::broadcast;

/// Why a completed load was not applied to the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// A newer load for the same kind was initiated meanwhile
    Superseded,
    /// Login, logout or expiry happened while the load was in flight
    SessionChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    Logout,
    /// The server rejected the token (HTTP 401)
    Expired,
}

/// Events emitted by the synchronization layer
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    LoadStarted {
        kind: ResourceKind,
        ticket: u64,
    },
    /// Snapshot for `kind` replaced; `count` is the number of records (1 for stats)
    Loaded {
        kind: ResourceKind,
        ticket: u64,
        count: usize,
    },
    /// Previous snapshot for `kind` kept
    LoadFailed {
        kind: ResourceKind,
        ticket: u64,
        error: ApiError,
    },
    LoadDiscarded {
        kind: ResourceKind,
        ticket: u64,
        reason: DiscardReason,
    },
    SessionStarted {
        username: String,
    },
    SessionEnded {
        reason: SessionEndReason,
    },
}

impl SyncEvent {
    /// True for the events that close a load
    pub fn is_load_outcome(&self) -> bool {
        matches!(
            self,
            SyncEvent::Loaded { .. } | SyncEvent::LoadFailed { .. } | SyncEvent::LoadDiscarded { .. }
        )
    }
}

/// Event bus for broadcasting sync events
///
/// Multi-consumer: the CLI watch loop and any UI can subscribe side by side.
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create with default capacity (256 events)
    pub fn default_capacity() -> Self {
        Self::new(256)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SyncEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
