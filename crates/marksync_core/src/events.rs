//! Sync lifecycle events and the subscriber registry.
//!
//! Every externally observable state change flows through [`SyncEvent`] so
//! hosts (UI layers, loggers, the browser extension bridge) can follow a
//! cycle without polling. Events are serialized with an `event` tag for
//! transport across process boundaries.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::sync::SyncPhase;

/// One observable sync lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum SyncEvent {
    /// A service moved to a new phase; merge progress rides on the
    /// `merging` phase.
    #[serde(rename_all = "camelCase")]
    StatusChange {
        /// The phase entered.
        #[serde(rename = "type")]
        status: SyncPhase,
        /// Service this applies to; absent for engine-wide changes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service_id: Option<String>,
        /// Merge progress numerator, during `merging`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        processed: Option<usize>,
        /// Merge progress denominator, during `merging`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<usize>,
    },
    /// A cycle began for a service.
    #[serde(rename_all = "camelCase")]
    SyncStart {
        /// Service the cycle runs for.
        service_id: String,
    },
    /// A cycle finished and both sides converged.
    #[serde(rename_all = "camelCase")]
    SyncSuccess {
        /// Service the cycle ran for.
        service_id: String,
        /// Entries the local store adopted.
        local_updates: usize,
        /// Entries pushed to the remote.
        remote_updates: usize,
        /// Local tombstones applied.
        local_deletions: usize,
        /// Remote tombstones applied.
        remote_deletions: usize,
        /// Whether an upload was performed (false when nothing changed
        /// remotely).
        uploaded: bool,
    },
    /// A concurrent-modification conflict stopped the cycle before upload.
    #[serde(rename_all = "camelCase")]
    SyncConflict {
        /// Service the cycle ran for.
        service_id: String,
        /// Human-readable description of the conflicting revisions.
        message: String,
    },
    /// A cycle ended, in any terminal phase.
    #[serde(rename_all = "camelCase")]
    SyncEnd {
        /// Service the cycle ran for.
        service_id: String,
        /// Terminal phase: `success`, `conflict` or `error`.
        status: SyncPhase,
        /// Error description when `status` is `error`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A failure outside the strict cycle sequence.
    #[serde(rename_all = "camelCase")]
    Error {
        /// What failed.
        message: String,
        /// Service involved, when attributable.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service_id: Option<String>,
        /// Underlying cause, when it adds detail beyond `message`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Advisory notice (sync skipped, service disabled, ...).
    #[serde(rename_all = "camelCase")]
    Info {
        /// The notice text.
        message: String,
        /// Service involved, when attributable.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service_id: Option<String>,
    },
}

impl SyncEvent {
    /// Phase change without progress payload.
    pub fn status_change(status: SyncPhase, service_id: Option<&str>) -> Self {
        SyncEvent::StatusChange {
            status,
            service_id: service_id.map(String::from),
            processed: None,
            total: None,
        }
    }

    /// Merge progress riding on a `merging` phase change.
    pub fn merge_progress(service_id: &str, processed: usize, total: usize) -> Self {
        SyncEvent::StatusChange {
            status: SyncPhase::Merging,
            service_id: Some(service_id.to_string()),
            processed: Some(processed),
            total: Some(total),
        }
    }

    /// Cycle start marker.
    pub fn sync_start(service_id: &str) -> Self {
        SyncEvent::SyncStart {
            service_id: service_id.to_string(),
        }
    }

    /// Conflict notice.
    pub fn sync_conflict(service_id: &str, message: impl Into<String>) -> Self {
        SyncEvent::SyncConflict {
            service_id: service_id.to_string(),
            message: message.into(),
        }
    }

    /// Cycle end marker.
    pub fn sync_end(service_id: &str, status: SyncPhase, error: Option<String>) -> Self {
        SyncEvent::SyncEnd {
            service_id: service_id.to_string(),
            status,
            error,
        }
    }

    /// Failure notice.
    pub fn error(message: impl Into<String>, service_id: Option<&str>) -> Self {
        SyncEvent::Error {
            message: message.into(),
            service_id: service_id.map(String::from),
            error: None,
        }
    }

    /// Advisory notice.
    pub fn info(message: impl Into<String>, service_id: Option<&str>) -> Self {
        SyncEvent::Info {
            message: message.into(),
            service_id: service_id.map(String::from),
        }
    }

    /// The service this event concerns, if any.
    pub fn service_id(&self) -> Option<&str> {
        match self {
            SyncEvent::StatusChange { service_id, .. }
            | SyncEvent::Error { service_id, .. }
            | SyncEvent::Info { service_id, .. } => service_id.as_deref(),
            SyncEvent::SyncStart { service_id }
            | SyncEvent::SyncSuccess { service_id, .. }
            | SyncEvent::SyncConflict { service_id, .. }
            | SyncEvent::SyncEnd { service_id, .. } => Some(service_id),
        }
    }
}

/// Subscriber callback invoked for every emitted event.
#[cfg(not(target_arch = "wasm32"))]
pub type SyncEventCallback = std::sync::Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Subscriber callback invoked for every emitted event (wasm form).
#[cfg(target_arch = "wasm32")]
pub type SyncEventCallback = std::sync::Arc<dyn Fn(&SyncEvent)>;

/// Handle returned by [`EventRegistry::subscribe`].
pub type SubscriptionId = u64;

/// Fan-out registry for [`SyncEvent`] subscribers.
///
/// Emission is synchronous and ordered by subscription. A panicking
/// subscriber is isolated so it cannot poison the sync cycle or starve other
/// subscribers.
#[derive(Default)]
pub struct EventRegistry {
    subscribers: Mutex<IndexMap<SubscriptionId, SyncEventCallback>>,
    next_id: AtomicU64,
}

impl EventRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; the returned id unsubscribes it later.
    pub fn subscribe(&self, callback: SyncEventCallback) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().unwrap().insert(id, callback);
        id
    }

    /// Remove a subscriber. Returns false if the id was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.lock().unwrap().shift_remove(&id).is_some()
    }

    /// Deliver `event` to every subscriber in subscription order.
    pub fn emit(&self, event: &SyncEvent) {
        let subscribers: Vec<SyncEventCallback> =
            self.subscribers.lock().unwrap().values().cloned().collect();
        for callback in subscribers {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                log::error!("sync event subscriber panicked; event {event:?} dropped for it");
            }
        }
    }

    /// Drop every subscriber.
    pub fn clear(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_event_wire_format() {
        let event = SyncEvent::merge_progress("gh", 200, 1000);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "statusChange");
        assert_eq!(json["type"], "merging");
        assert_eq!(json["serviceId"], "gh");
        assert_eq!(json["processed"], 200);
        assert_eq!(json["total"], 1000);

        let back: SyncEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_sync_end_omits_absent_error() {
        let event = SyncEvent::sync_end("gh", SyncPhase::Success, None);
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("error"));
        assert!(json.contains(r#""status":"success""#));
    }

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let registry = EventRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        let seen = count.clone();
        let id = registry.subscribe(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(registry.subscriber_count(), 1);

        registry.emit(&SyncEvent::sync_start("gh"));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.emit(&SyncEvent::sync_start("gh"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let registry = EventRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        registry.subscribe(Arc::new(|_| panic!("bad subscriber")));
        let seen = count.clone();
        registry.subscribe(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        registry.emit(&SyncEvent::info("still delivered", None));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
