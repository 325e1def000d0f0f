//! Bookmark data model.
//!
//! One [`BookmarkEntry`] exists per URL. Entries are never physically removed
//! except by an explicit local hard delete; soft deletion is represented by a
//! reserved sentinel tag plus a [`DeletedMeta`] block, and participates in
//! merging like any other edit.
//!
//! Timestamps are epoch milliseconds. Three "updated" channels are tracked so
//! the merge engine can tell real content changes apart from bookkeeping:
//!
//! - `updated`: last user-authored edit
//! - `updated2`: last batch-operation edit (e.g. programmatic tag changes)
//! - `updated3`: last touch by a merge/sync cycle

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Epoch-millisecond timestamp used throughout the data model.
pub type Timestamp = i64;

/// Reserved sentinel tag marking an entry as soft-deleted.
pub const DELETED_TAG: &str = "._DELETED_";

/// Mapping from URL to bookmark entry. Insertion order is preserved for
/// deterministic output but carries no meaning.
pub type BookmarkCollection = IndexMap<String, BookmarkEntry>;

/// One bookmark record, keyed externally by its URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct BookmarkEntry {
    /// Ordered set of tags. Order is not semantically meaningful but is
    /// preserved for determinism; may contain [`DELETED_TAG`].
    pub tags: IndexSet<String>,

    /// Entry metadata (timestamps, title, freeform fields).
    pub meta: BookmarkMeta,

    /// Present exactly when the entry is soft-deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_meta: Option<DeletedMeta>,
}

/// Metadata attached to one bookmark entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct BookmarkMeta {
    /// Page title, if captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// First-seen time.
    #[serde(default)]
    pub created: Timestamp,

    /// Last user-authored edit time.
    #[serde(default)]
    pub updated: Timestamp,

    /// Last batch-operation edit time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated2: Option<Timestamp>,

    /// Last time this record was touched by a merge/sync cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated3: Option<Timestamp>,

    /// Freeform fields carried verbatim on the wire.
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: IndexMap<String, serde_json::Value>,
}

/// Provenance of a soft delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub enum DeleteActionType {
    /// Deleted directly by the user.
    Delete,
    /// Deleted by a batch operation.
    BatchDelete,
    /// Deleted while importing another collection.
    Import,
    /// Deleted by a merge/sync cycle.
    Sync,
}

/// Soft-delete bookkeeping; coexists with the [`DELETED_TAG`] sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct DeletedMeta {
    /// When the entry was soft-deleted.
    pub deleted: Timestamp,
    /// What kind of operation deleted it.
    pub action_type: DeleteActionType,
}

impl BookmarkMeta {
    /// Create metadata with `created` and `updated` both set to `created`.
    pub fn new(created: Timestamp) -> Self {
        Self {
            title: None,
            description: None,
            created,
            updated: created,
            updated2: None,
            updated3: None,
            extra: IndexMap::new(),
        }
    }

    /// Compare visible content, ignoring the sync-bookkeeping channels
    /// `updated2` and `updated3`.
    pub fn content_eq(&self, other: &Self) -> bool {
        self.title == other.title
            && self.description == other.description
            && self.created == other.created
            && self.updated == other.updated
            && self.extra == other.extra
    }
}

impl BookmarkEntry {
    /// Create a new entry with the given tags, first seen at `created`.
    pub fn new<I, S>(tags: I, created: Timestamp) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            meta: BookmarkMeta::new(created),
            deleted_meta: None,
        }
    }

    /// Normalize `created`/`updated` in place.
    ///
    /// An invalid `created` (zero or negative) becomes `default_date` with
    /// `updated` mirroring it; an `updated` before `created` is snapped to
    /// `created`.
    pub fn normalize(&mut self, default_date: Timestamp) {
        if self.meta.created <= 0 {
            self.meta.created = default_date;
            self.meta.updated = default_date;
        }
        if self.meta.updated < self.meta.created {
            self.meta.updated = self.meta.created;
        }
    }

    /// The latest of all timestamp channels on this entry.
    pub fn latest_touch(&self) -> Timestamp {
        let mut latest = self.meta.created.max(self.meta.updated);
        if let Some(t) = self.meta.updated2 {
            latest = latest.max(t);
        }
        if let Some(t) = self.meta.updated3 {
            latest = latest.max(t);
        }
        latest
    }

    /// True if the entry has been touched since `last_sync_time` on any
    /// timestamp channel. This is the validity gate for merge decisions.
    pub fn touched_since(&self, last_sync_time: Timestamp) -> bool {
        self.latest_touch() > last_sync_time
    }

    /// Compare visible content: tags, metadata (excluding `updated2`/`updated3`)
    /// and soft-delete state.
    pub fn content_eq(&self, other: &Self) -> bool {
        self.tags == other.tags
            && self.deleted_meta == other.deleted_meta
            && self.meta.content_eq(&other.meta)
    }

    /// True if the sentinel tag is present.
    pub fn is_soft_deleted(&self) -> bool {
        self.tags.contains(DELETED_TAG)
    }

    /// Soft-delete this entry: add the sentinel tag and record provenance.
    pub fn soft_delete(&mut self, deleted: Timestamp, action_type: DeleteActionType) {
        self.tags.insert(DELETED_TAG.to_string());
        self.deleted_meta = Some(DeletedMeta {
            deleted,
            action_type,
        });
        self.meta.updated = self.meta.updated.max(deleted);
    }

    /// Reverse a soft delete: drop the sentinel tag and its bookkeeping.
    pub fn revive(&mut self, updated: Timestamp) {
        self.tags.shift_remove(DELETED_TAG);
        self.deleted_meta = None;
        self.meta.updated = self.meta.updated.max(updated);
    }

    /// Enforce the sentinel/`deletedMeta` agreement.
    ///
    /// Sentinel present without bookkeeping synthesizes a [`DeletedMeta`]
    /// stamped at `now`; orphan bookkeeping without the sentinel is dropped.
    pub fn enforce_deleted_consistency(&mut self, now: Timestamp) {
        if self.is_soft_deleted() {
            if self.deleted_meta.is_none() {
                self.deleted_meta = Some(DeletedMeta {
                    deleted: now,
                    action_type: DeleteActionType::Sync,
                });
            }
        } else {
            self.deleted_meta = None;
        }
    }
}
