//! # Event Bus System
//!
//! Broadcasts progress of sync and embedding passes using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`SyncEvent`] for catalog sync passes, [`IndexEvent`] for
//!   embedding passes and index rebuilds, both wrapped in [`CoreEvent`]
//! - **EventBus**: central broadcast channel for publishing events
//!
//! Emission is best effort. A pass never fails because nobody is listening, so
//! callers emit with `.ok()`.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::Started {
//!         pass_id: "pass-1".to_string(),
//!     }))
//!     .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events and may keep reading.
//! - **`RecvError::Closed`**: all senders were dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Catalog sync pass events
    Sync(SyncEvent),
    /// Embedding and index rebuild events
    Index(IndexEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Index(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Index(IndexEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Index(IndexEvent::RebuildSkipped { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Index(IndexEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events emitted by a catalog sync pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Sync pass initiated.
    Started { pass_id: String },
    /// Progress update between phases.
    Progress {
        pass_id: String,
        /// Current phase (e.g., "diff", "enrich", "persist").
        phase: String,
        items_processed: u64,
        total_items: Option<u64>,
    },
    /// Sync pass finished and state was persisted.
    Completed {
        pass_id: String,
        new: u64,
        changed: u64,
        unchanged: u64,
        removed: u64,
        /// Items whose enrichment resolved to absent this pass
        enrichment_failed: u64,
        needs_index_rebuild: bool,
        duration_ms: u64,
    },
    /// Sync pass aborted before persisting.
    Failed { pass_id: String, message: String },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::Progress { .. } => "Sync in progress",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { .. } => "Sync failed",
        }
    }
}

// ============================================================================
// Index Events
// ============================================================================

/// Events emitted by an embedding pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum IndexEvent {
    /// Embedding pass initiated.
    Started {
        pass_id: String,
        /// Records waiting for an embedding
        pending: u64,
    },
    /// Progress update between phases.
    Progress {
        pass_id: String,
        phase: String,
        items_processed: u64,
        total_items: Option<u64>,
    },
    /// Rebuild was needed but could not run.
    RebuildSkipped { pass_id: String, reason: String },
    /// Embedding pass finished.
    Completed {
        pass_id: String,
        embedded: u64,
        skipped: u64,
        rebuilt: bool,
        /// Rows in the index after this pass, when it was rebuilt
        index_rows: Option<u64>,
    },
    /// Embedding pass aborted.
    Failed { pass_id: String, message: String },
}

impl IndexEvent {
    fn description(&self) -> &str {
        match self {
            IndexEvent::Started { .. } => "Embedding pass started",
            IndexEvent::Progress { .. } => "Embedding pass in progress",
            IndexEvent::RebuildSkipped { .. } => "Index rebuild skipped",
            IndexEvent::Completed { .. } => "Embedding pass completed",
            IndexEvent::Failed { .. } => "Embedding pass failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        let event = CoreEvent::Sync(SyncEvent::Started {
            pass_id: "pass-1".to_string(),
        });

        assert!(bus.emit(event).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Index(IndexEvent::Completed {
            pass_id: "pass-1".to_string(),
            embedded: 3,
            skipped: 1,
            rebuilt: true,
            index_rows: Some(3),
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(CoreEvent::Sync(SyncEvent::Progress {
                pass_id: "pass-1".to_string(),
                phase: "enrich".to_string(),
                items_processed: i,
                total_items: Some(5),
            }))
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Sync(SyncEvent::Failed {
            pass_id: "p".to_string(),
            message: "state file corrupt".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let skipped = CoreEvent::Index(IndexEvent::RebuildSkipped {
            pass_id: "p".to_string(),
            reason: "no embedded records".to_string(),
        });
        assert_eq!(skipped.severity(), EventSeverity::Warning);
        assert_eq!(skipped.description(), "Index rebuild skipped");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Sync(SyncEvent::Completed {
            pass_id: "pass-7".to_string(),
            new: 1,
            changed: 2,
            unchanged: 3,
            removed: 0,
            enrichment_failed: 0,
            needs_index_rebuild: true,
            duration_ms: 12,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Sync");
        assert_eq!(json["payload"]["event"], "Completed");
        assert_eq!(json["payload"]["changed"], 2);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
