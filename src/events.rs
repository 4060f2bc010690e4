//! Change-notification events
//!
//! Every mutation of the document store, registry, or configuration emits
//! one event, batched per logical operation. Subscribers receive them over
//! a broadcast channel, optionally narrowed by a [`SubscriptionFilter`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{DocumentId, LocationId, SyncStatus};

/// Types of backup events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DocumentCreated,
    DocumentUpdated,
    DocumentDeleted,
    SyncStarted,
    SyncCompleted,
    SyncFailed,
    LocationStatusChanged,
    ConfigUpdated,
    ConnectivityChanged,
}

/// A backup status event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEvent {
    /// Event type
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Related document (if applicable)
    pub document_id: Option<DocumentId>,
    /// Related location (if applicable)
    pub location_id: Option<LocationId>,
    /// Additional data
    pub data: Option<serde_json::Value>,
}

impl BackupEvent {
    fn base(event_type: EventType) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            document_id: None,
            location_id: None,
            data: None,
        }
    }

    pub fn document_created(id: &str) -> Self {
        Self {
            document_id: Some(id.to_string()),
            ..Self::base(EventType::DocumentCreated)
        }
    }

    pub fn document_updated(id: &str, version: i64) -> Self {
        Self {
            document_id: Some(id.to_string()),
            data: Some(serde_json::json!({ "version": version })),
            ..Self::base(EventType::DocumentUpdated)
        }
    }

    pub fn document_deleted(id: &str) -> Self {
        Self {
            document_id: Some(id.to_string()),
            ..Self::base(EventType::DocumentDeleted)
        }
    }

    pub fn sync_started(id: &str) -> Self {
        Self {
            document_id: Some(id.to_string()),
            ..Self::base(EventType::SyncStarted)
        }
    }

    pub fn sync_completed(id: &str, status: SyncStatus) -> Self {
        Self {
            document_id: Some(id.to_string()),
            data: Some(serde_json::json!({ "status": status.to_string() })),
            ..Self::base(EventType::SyncCompleted)
        }
    }

    pub fn sync_failed(id: &str, error: &str) -> Self {
        Self {
            document_id: Some(id.to_string()),
            data: Some(serde_json::json!({ "error": error })),
            ..Self::base(EventType::SyncFailed)
        }
    }

    pub fn snapshot_completed(kind: &str, name: &str) -> Self {
        Self {
            data: Some(serde_json::json!({ "kind": kind, "name": name })),
            ..Self::base(EventType::SyncCompleted)
        }
    }

    pub fn snapshot_failed(kind: &str, name: &str, error: &str) -> Self {
        Self {
            data: Some(serde_json::json!({ "kind": kind, "name": name, "error": error })),
            ..Self::base(EventType::SyncFailed)
        }
    }

    pub fn location_status_changed(id: &str, status: &str) -> Self {
        Self {
            location_id: Some(id.to_string()),
            data: Some(serde_json::json!({ "status": status })),
            ..Self::base(EventType::LocationStatusChanged)
        }
    }

    pub fn config_updated() -> Self {
        Self::base(EventType::ConfigUpdated)
    }

    pub fn connectivity_changed(online: bool, requeued: usize) -> Self {
        Self {
            data: Some(serde_json::json!({ "online": online, "requeued": requeued })),
            ..Self::base(EventType::ConnectivityChanged)
        }
    }
}

/// Subscription filter for events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    /// Only events for specific documents
    pub document_ids: Option<Vec<DocumentId>>,
    /// Only events for specific locations
    pub location_ids: Option<Vec<LocationId>>,
    /// Only specific event types
    pub event_types: Option<Vec<EventType>>,
}

impl SubscriptionFilter {
    /// Check if an event matches this filter
    pub fn matches(&self, event: &BackupEvent) -> bool {
        if let Some(ref types) = self.event_types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }

        if let Some(ref ids) = self.document_ids {
            if let Some(ref event_id) = event.document_id {
                if !ids.contains(event_id) {
                    return false;
                }
            }
        }

        if let Some(ref ids) = self.location_ids {
            if let Some(ref event_id) = event.location_id {
                if !ids.contains(event_id) {
                    return false;
                }
            }
        }

        true
    }
}

/// Fans events out to all subscribers
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<BackupEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Emit an event. Delivery is best-effort; no subscribers is fine.
    pub fn emit(&self, event: BackupEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackupEvent> {
        self.tx.subscribe()
    }

    /// Subscribe with a filter applied on the receiving side
    pub fn subscribe_filtered(&self, filter: SubscriptionFilter) -> EventStream {
        EventStream {
            rx: self.tx.subscribe(),
            filter,
        }
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// A filtered event subscription
pub struct EventStream {
    rx: broadcast::Receiver<BackupEvent>,
    filter: SubscriptionFilter,
}

impl EventStream {
    /// Next matching event, or `None` once the broadcaster is gone.
    /// Lagged receivers skip ahead rather than erroring out.
    pub async fn next(&mut self) -> Option<BackupEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event subscriber lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
