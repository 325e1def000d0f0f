//! Local bookmark store abstraction.
//!
//! The orchestrator reads the full collection at the start of a merge and
//! writes it back at most once per cycle. Embedders implement
//! [`BookmarkStore`] over whatever actually holds the data (browser storage,
//! a database, a file); [`MemoryStore`] is the in-process implementation used
//! in tests and simple hosts.

use std::sync::Mutex;

use chrono::Utc;

use crate::adapter::BoxFuture;
use crate::bookmark::BookmarkCollection;
use crate::error::Result;
use crate::snapshot::SnapshotMeta;

/// The local collection plus its snapshot-level metadata.
#[derive(Debug, Clone)]
pub struct StoreState {
    /// All bookmarks, keyed by URL.
    pub data: BookmarkCollection,
    /// Snapshot metadata kept alongside the data.
    pub meta: SnapshotMeta,
}

impl StoreState {
    /// An empty store created now.
    pub fn empty() -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            data: BookmarkCollection::new(),
            meta: SnapshotMeta::new(now),
        }
    }
}

/// Read/replace access to the local bookmark collection.
#[cfg(not(target_arch = "wasm32"))]
pub trait BookmarkStore: Send + Sync {
    /// Read the whole collection and its metadata.
    fn read(&self) -> BoxFuture<'_, Result<StoreState>>;

    /// Replace the whole collection. Implementations refresh their
    /// modification metadata as part of the write.
    fn write<'a>(&'a self, data: &'a BookmarkCollection) -> BoxFuture<'a, Result<()>>;
}

/// Read/replace access to the local bookmark collection (wasm form).
#[cfg(target_arch = "wasm32")]
pub trait BookmarkStore {
    /// Read the whole collection and its metadata.
    fn read(&self) -> BoxFuture<'_, Result<StoreState>>;

    /// Replace the whole collection.
    fn write<'a>(&'a self, data: &'a BookmarkCollection) -> BoxFuture<'a, Result<()>>;
}

/// Mutex-guarded in-process store.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::empty()),
        }
    }

    /// A store preloaded with `data`.
    pub fn with_data(data: BookmarkCollection) -> Self {
        let store = Self::new();
        store.state.lock().unwrap().data = data;
        store
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> StoreState {
        self.state.lock().unwrap().clone()
    }
}

impl BookmarkStore for MemoryStore {
    fn read(&self) -> BoxFuture<'_, Result<StoreState>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().clone()) })
    }

    fn write<'a>(&'a self, data: &'a BookmarkCollection) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.data = data.clone();
            state.meta.updated = Utc::now().timestamp_millis();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::block_on_test;
    use crate::bookmark::BookmarkEntry;

    #[test]
    fn test_write_replaces_data_and_touches_meta() {
        let store = MemoryStore::new();
        let before = store.state().meta;

        let mut data = BookmarkCollection::new();
        data.insert(
            "https://example.com/".to_string(),
            BookmarkEntry::new(["tag"], 100),
        );
        block_on_test(store.write(&data)).unwrap();

        let state = block_on_test(store.read()).unwrap();
        assert_eq!(state.data.len(), 1);
        assert!(state.meta.updated >= before.updated);
        assert_eq!(state.meta.created, before.created);
    }
}
