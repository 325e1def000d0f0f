//! Serialized snapshot wire format.
//!
//! Adapters exchange one JSON document per backend:
//!
//! ```json
//! { "data": { "<url>": { ... } }, "meta": { "databaseVersion": 3, ... } }
//! ```
//!
//! An empty or whitespace-only document is treated as "no remote bookmarks",
//! not as a parse error, so a freshly created remote object is a valid
//! starting point.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::bookmark::{BookmarkCollection, Timestamp};
use crate::error::Result;

/// Current version of the snapshot document format.
pub const DATABASE_VERSION: u32 = 3;

/// Store-level metadata carried alongside the bookmark data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    /// Document format version.
    pub database_version: u32,

    /// When the collection was first created.
    #[serde(default)]
    pub created: Timestamp,

    /// When the collection was last written.
    #[serde(default)]
    pub updated: Timestamp,

    /// When the collection was exported, for export-produced documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported: Option<Timestamp>,

    /// Aggregate statistics, refreshed on upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<SnapshotStats>,

    /// Name of the device that produced the last upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_upload_device: Option<String>,
}

/// Aggregate statistics over a bookmark collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    /// Number of bookmark entries, soft-deleted ones included.
    pub total_bookmarks: usize,
    /// Number of distinct tags across all entries.
    pub total_tags: usize,
}

/// One serialized snapshot: bookmark data plus store-level metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct SyncedSnapshot {
    /// Bookmark entries keyed by URL.
    #[serde(default)]
    pub data: BookmarkCollection,

    /// Store-level metadata. Absent in hand-written or partial documents;
    /// the orchestrator requires it on every sync after the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SnapshotMeta>,
}

impl SnapshotMeta {
    /// Create metadata for a collection created and updated at `now`.
    pub fn new(now: Timestamp) -> Self {
        Self {
            database_version: DATABASE_VERSION,
            created: now,
            updated: now,
            exported: None,
            stats: None,
            last_upload_device: None,
        }
    }
}

impl SnapshotStats {
    /// Compute statistics over a collection.
    pub fn of(data: &BookmarkCollection) -> Self {
        let mut tags = indexmap::IndexSet::new();
        for entry in data.values() {
            for tag in &entry.tags {
                tags.insert(tag.as_str());
            }
        }
        Self {
            total_bookmarks: data.len(),
            total_tags: tags.len(),
        }
    }
}

impl SyncedSnapshot {
    /// Parse a serialized snapshot.
    ///
    /// Returns `Ok(None)` for an empty or whitespace-only document; any other
    /// malformed input is a JSON error for the caller to report verbatim.
    pub fn parse(text: &str) -> Result<Option<Self>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(text)?))
    }

    /// Serialize for upload.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
