//! Three-way, field-level merge engine.
//!
//! [`merge`] is a pure function over two bookmark snapshots, a strategy
//! descriptor and the sync time window. It produces a merged view plus
//! directional update/deletion sets, which the orchestrator turns into a
//! store write and an upload.
//!
//! The central gate is **validity**: an entry is valid iff it has been touched
//! on any timestamp channel since the last successful sync. Entries untouched
//! on both sides are never candidates for deletion inference or re-upload.
//!
//! Policy choices preserved as literal contract:
//! - equal timestamps favor the local side in every `newer` tie-break;
//! - tag union is case-sensitive and exact-match;
//! - malformed URLs are dropped from processing with a warning, not merged.

use indexmap::IndexSet;
use url::Url;

use crate::bookmark::{
    BookmarkCollection, BookmarkEntry, BookmarkMeta, DELETED_TAG, Timestamp,
};
use crate::strategy::{MergeStrategy, MetaStrategy, TagStrategy};

/// Default number of URLs processed between progress callbacks.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// The sync time window a merge runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    /// Time of the last successful sync; validity is measured against this.
    pub last_sync_time: Timestamp,
    /// Time of the current cycle; `updated3` stamps never fall below this.
    pub current_sync_time: Timestamp,
}

/// Which side(s) a merged entry must be written back to.
///
/// The decision is a pure content comparison (tags, metadata excluding
/// `updated2`/`updated3`, soft-delete state) of the merged result against
/// each original side, independent of which strategy produced the timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeTarget {
    /// Neither side's visible content changed.
    None,
    /// Only the local side differs from the merged result.
    Local,
    /// Only the remote side differs from the merged result.
    Remote,
    /// Both sides differ from the merged result.
    Both,
}

impl MergeTarget {
    /// Numeric code used on the wire and in logs (0..=3).
    pub fn as_code(&self) -> u8 {
        match self {
            MergeTarget::None => 0,
            MergeTarget::Local => 1,
            MergeTarget::Remote => 2,
            MergeTarget::Both => 3,
        }
    }

    /// The target with the local/remote roles swapped.
    pub fn mirrored(&self) -> Self {
        match self {
            MergeTarget::Local => MergeTarget::Remote,
            MergeTarget::Remote => MergeTarget::Local,
            other => *other,
        }
    }
}

/// Progress notification emitted after each processed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeProgress {
    /// URLs processed so far.
    pub processed: usize,
    /// Total URLs across both sides.
    pub total: usize,
}

/// Result of merging two snapshots.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Entries the local side must adopt.
    pub updates_for_local: BookmarkCollection,
    /// Entries the remote side must adopt.
    pub updates_for_remote: BookmarkCollection,
    /// URLs tombstoned on the local side (inferred deletions).
    pub local_deletions: Vec<String>,
    /// URLs tombstoned on the remote side (inferred deletions).
    pub remote_deletions: Vec<String>,
    /// The local snapshot after deletions and updates are applied.
    pub final_local: BookmarkCollection,
    /// The remote snapshot after deletions and updates are applied.
    pub final_remote: BookmarkCollection,
}

impl MergeOutcome {
    /// True if the local side must be rewritten.
    pub fn has_local_changes(&self) -> bool {
        !self.updates_for_local.is_empty() || !self.local_deletions.is_empty()
    }

    /// True if the remote side must be rewritten.
    pub fn has_remote_changes(&self) -> bool {
        !self.updates_for_remote.is_empty() || !self.remote_deletions.is_empty()
    }
}

/// Merge two snapshots without progress reporting.
pub fn merge(
    local: &BookmarkCollection,
    remote: &BookmarkCollection,
    strategy: &MergeStrategy,
    window: SyncWindow,
) -> MergeOutcome {
    merge_with_progress(local, remote, strategy, window, DEFAULT_BATCH_SIZE, &|_| {})
}

/// Merge two snapshots, invoking `on_progress` after every `batch_size` URLs
/// so large collections can report progress without blocking the caller.
pub fn merge_with_progress(
    local: &BookmarkCollection,
    remote: &BookmarkCollection,
    strategy: &MergeStrategy,
    window: SyncWindow,
    batch_size: usize,
    on_progress: &dyn Fn(MergeProgress),
) -> MergeOutcome {
    let batch_size = batch_size.max(1);

    let mut urls: IndexSet<String> = local.keys().cloned().collect();
    urls.extend(remote.keys().cloned());
    let total = urls.len();

    let mut outcome = MergeOutcome::default();
    for (index, url) in urls.iter().enumerate() {
        if Url::parse(url).is_err() {
            log::warn!("skipping malformed bookmark URL during merge: {url}");
        } else {
            merge_one(
                url,
                local.get(url.as_str()),
                remote.get(url.as_str()),
                strategy,
                window,
                &mut outcome,
            );
        }
        if (index + 1) % batch_size == 0 {
            on_progress(MergeProgress {
                processed: index + 1,
                total,
            });
        }
    }
    if total == 0 || total % batch_size != 0 {
        on_progress(MergeProgress {
            processed: total,
            total,
        });
    }

    outcome.final_local = apply_changes(local, &outcome.local_deletions, &outcome.updates_for_local);
    outcome.final_remote =
        apply_changes(remote, &outcome.remote_deletions, &outcome.updates_for_remote);
    outcome
}

/// Decide which side(s) must adopt the merged entry.
pub fn determine_merge_target(
    merged: &BookmarkEntry,
    local: &BookmarkEntry,
    remote: &BookmarkEntry,
) -> MergeTarget {
    let local_differs = !merged.content_eq(local);
    let remote_differs = !merged.content_eq(remote);
    match (local_differs, remote_differs) {
        (true, true) => MergeTarget::Both,
        (true, false) => MergeTarget::Local,
        (false, true) => MergeTarget::Remote,
        (false, false) => MergeTarget::None,
    }
}

/// `updated3` for an entry queued for update: strictly after both sides'
/// latest known state and at least the time of this cycle, so the stamp
/// advances monotonically even under clock skew.
fn updated3_stamp(
    local_updated: Timestamp,
    remote_updated: Timestamp,
    current_sync_time: Timestamp,
) -> Timestamp {
    (local_updated + 1)
        .max(remote_updated + 1)
        .max(current_sync_time)
}

fn merge_one(
    url: &str,
    local_entry: Option<&BookmarkEntry>,
    remote_entry: Option<&BookmarkEntry>,
    strategy: &MergeStrategy,
    window: SyncWindow,
    out: &mut MergeOutcome,
) {
    match (local_entry, remote_entry) {
        (Some(local_orig), Some(remote_orig)) => {
            let mut local = local_orig.clone();
            local.normalize(strategy.default_date);
            let mut remote = remote_orig.clone();
            remote.normalize(strategy.default_date);

            let local_valid = local.touched_since(window.last_sync_time);
            let remote_valid = remote.touched_since(window.last_sync_time);

            let mut merged = match (local_valid, remote_valid) {
                // Untouched on both sides: preserve as-is.
                (false, false) => return,
                // Exactly one side touched: its content is taken verbatim.
                (true, false) => local.clone(),
                (false, true) => remote.clone(),
                (true, true) => merge_touched_pair(&local, &remote, strategy),
            };
            merged.enforce_deleted_consistency(window.current_sync_time);

            let target = determine_merge_target(&merged, &local, &remote);
            if target != MergeTarget::None {
                merged.meta.updated3 = Some(updated3_stamp(
                    local.meta.updated,
                    remote.meta.updated,
                    window.current_sync_time,
                ));
            }
            match target {
                MergeTarget::None => {}
                MergeTarget::Local => {
                    out.updates_for_local.insert(url.to_string(), merged);
                }
                MergeTarget::Remote => {
                    out.updates_for_remote.insert(url.to_string(), merged);
                }
                MergeTarget::Both => {
                    out.updates_for_local
                        .insert(url.to_string(), merged.clone());
                    out.updates_for_remote.insert(url.to_string(), merged);
                }
            }
        }
        (Some(local_orig), None) => {
            let mut entry = local_orig.clone();
            entry.normalize(strategy.default_date);
            if entry.touched_since(window.last_sync_time) {
                entry.meta.updated3 = Some(updated3_stamp(
                    entry.meta.updated,
                    entry.meta.updated,
                    window.current_sync_time,
                ));
                out.updates_for_remote.insert(url.to_string(), entry);
            } else {
                // Absent remotely and untouched locally: the remote side
                // deleted it. The queued tombstone stops resurrection.
                out.remote_deletions.push(url.to_string());
            }
        }
        (None, Some(remote_orig)) => {
            let mut entry = remote_orig.clone();
            entry.normalize(strategy.default_date);
            if entry.touched_since(window.last_sync_time) {
                entry.meta.updated3 = Some(updated3_stamp(
                    entry.meta.updated,
                    entry.meta.updated,
                    window.current_sync_time,
                ));
                out.updates_for_local.insert(url.to_string(), entry);
            } else {
                out.local_deletions.push(url.to_string());
            }
        }
        (None, None) => {}
    }
}

/// Field-level merge of two entries both touched since the last sync.
fn merge_touched_pair(
    local: &BookmarkEntry,
    remote: &BookmarkEntry,
    strategy: &MergeStrategy,
) -> BookmarkEntry {
    // Ties favor local.
    let remote_newer = remote.meta.updated > local.meta.updated;
    let (newer, older) = if remote_newer {
        (remote, local)
    } else {
        (local, remote)
    };

    let tags: IndexSet<String> = match strategy.tags {
        TagStrategy::Local => local.tags.clone(),
        TagStrategy::Remote => remote.tags.clone(),
        TagStrategy::Newer => newer.tags.clone(),
        TagStrategy::Union => {
            let mut union = local.tags.clone();
            for tag in &remote.tags {
                union.insert(tag.clone());
            }
            union
        }
    };

    let mut meta = match strategy.meta {
        MetaStrategy::Local => local.meta.clone(),
        MetaStrategy::Remote => remote.meta.clone(),
        MetaStrategy::Newer => newer.meta.clone(),
        MetaStrategy::Merge => overlay_meta(&older.meta, &newer.meta),
    };

    // deletedMeta only survives beneath the sentinel, merged by the meta rule.
    let deleted_meta = if tags.contains(DELETED_TAG) {
        match strategy.meta {
            MetaStrategy::Local => local.deleted_meta,
            MetaStrategy::Remote => remote.deleted_meta,
            MetaStrategy::Newer | MetaStrategy::Merge => {
                newer.deleted_meta.or(older.deleted_meta)
            }
        }
    } else {
        None
    };

    // created/updated finalization, overriding any timestamps chosen above.
    if strategy.prefer_oldest_created {
        meta.created = local.meta.created.min(remote.meta.created);
    }
    if strategy.prefer_newest_updated {
        meta.updated = local.meta.updated.max(remote.meta.updated);
        meta.updated2 = match (local.meta.updated2, remote.meta.updated2) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
    if meta.updated < meta.created {
        meta.updated = meta.created;
    }

    BookmarkEntry {
        tags,
        meta,
        deleted_meta,
    }
}

/// Overlay the newer side's fields onto the older side's metadata: newer wins
/// on key collision, older contributes keys absent from newer.
fn overlay_meta(older: &BookmarkMeta, newer: &BookmarkMeta) -> BookmarkMeta {
    let mut extra = older.extra.clone();
    for (key, value) in &newer.extra {
        extra.insert(key.clone(), value.clone());
    }
    BookmarkMeta {
        title: newer.title.clone().or_else(|| older.title.clone()),
        description: newer
            .description
            .clone()
            .or_else(|| older.description.clone()),
        created: newer.created,
        updated: newer.updated,
        updated2: newer.updated2.or(older.updated2),
        updated3: newer.updated3.or(older.updated3),
        extra,
    }
}

/// Remove queued deletions from, then overlay queued updates onto, one side's
/// original collection.
fn apply_changes(
    original: &BookmarkCollection,
    deletions: &[String],
    updates: &BookmarkCollection,
) -> BookmarkCollection {
    let mut out = original.clone();
    for url in deletions {
        out.shift_remove(url.as_str());
    }
    for (url, entry) in updates {
        out.insert(url.clone(), entry.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmark::DeleteActionType;
    use std::cell::RefCell;

    fn entry(tags: &[&str], created: Timestamp, updated: Timestamp) -> BookmarkEntry {
        let mut e = BookmarkEntry::new(tags.iter().copied(), created);
        e.meta.updated = updated;
        e
    }

    fn collection(entries: &[(&str, BookmarkEntry)]) -> BookmarkCollection {
        entries
            .iter()
            .map(|(url, e)| (url.to_string(), e.clone()))
            .collect()
    }

    fn window(last: Timestamp, current: Timestamp) -> SyncWindow {
        SyncWindow {
            last_sync_time: last,
            current_sync_time: current,
        }
    }

    const URL_A: &str = "https://a.example/";
    const URL_B: &str = "https://b.example/";

    #[test]
    fn test_merge_with_self_is_noop() {
        let col = collection(&[
            (URL_A, entry(&["rust"], 100, 150)),
            (URL_B, entry(&["web", "css"], 50, 200)),
        ]);
        for strategy in [
            MergeStrategy::new(1),
            MergeStrategy::new(1)
                .with_tags(TagStrategy::Newer)
                .with_meta(MetaStrategy::Newer),
            MergeStrategy::new(1)
                .with_tags(TagStrategy::Local)
                .with_meta(MetaStrategy::Remote),
        ] {
            let outcome = merge(&col, &col, &strategy, window(0, 300));
            assert!(outcome.updates_for_local.is_empty());
            assert!(outcome.updates_for_remote.is_empty());
            assert!(outcome.local_deletions.is_empty());
            assert!(outcome.remote_deletions.is_empty());
            assert_eq!(outcome.final_local, col);
            assert_eq!(outcome.final_remote, col);
        }
    }

    #[test]
    fn test_validity_gate_blocks_untouched_entries() {
        // Content differs, but neither side was touched since the last sync.
        let local = collection(&[(URL_A, entry(&["one"], 10, 20))]);
        let remote = collection(&[(URL_A, entry(&["two"], 10, 30))]);
        let outcome = merge(&local, &remote, &MergeStrategy::new(1), window(50, 100));
        assert!(outcome.updates_for_local.is_empty());
        assert!(outcome.updates_for_remote.is_empty());
        assert_eq!(outcome.final_local, local);
        assert_eq!(outcome.final_remote, remote);
    }

    #[test]
    fn test_single_valid_side_wins_verbatim() {
        let local = collection(&[(URL_A, entry(&["fresh"], 10, 80))]);
        let remote = collection(&[(URL_A, entry(&["stale"], 10, 20))]);
        let outcome = merge(&local, &remote, &MergeStrategy::new(1), window(50, 100));

        assert!(outcome.updates_for_local.is_empty());
        let pushed = &outcome.updates_for_remote[URL_A];
        assert!(pushed.tags.contains("fresh"));
        assert!(!pushed.tags.contains("stale"));
        assert_eq!(outcome.final_remote[URL_A].tags, pushed.tags);
    }

    #[test]
    fn test_union_tags() {
        let local = collection(&[(URL_A, entry(&["a", "shared"], 10, 80))]);
        let remote = collection(&[(URL_A, entry(&["shared", "b"], 10, 90))]);
        let outcome = merge(&local, &remote, &MergeStrategy::new(1), window(50, 100));

        let merged = &outcome.updates_for_local[URL_A];
        let expected: IndexSet<String> = ["a", "shared", "b"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(merged.tags, expected);
        // Same union flows to the remote side.
        assert_eq!(outcome.updates_for_remote[URL_A].tags, expected);
    }

    #[test]
    fn test_newer_tie_favors_local() {
        let strategy = MergeStrategy::new(1)
            .with_tags(TagStrategy::Newer)
            .with_meta(MetaStrategy::Newer);
        let local = collection(&[(URL_A, entry(&["local"], 10, 80))]);
        let remote = collection(&[(URL_A, entry(&["remote"], 10, 80))]);
        let outcome = merge(&local, &remote, &strategy, window(50, 100));

        // Local content was authoritative, so only the remote side updates.
        assert!(outcome.updates_for_local.is_empty());
        assert!(outcome.updates_for_remote[URL_A].tags.contains("local"));
    }

    #[test]
    fn test_direction_symmetry() {
        let strategy = MergeStrategy::new(1)
            .with_tags(TagStrategy::Newer)
            .with_meta(MetaStrategy::Newer);
        let side_x = collection(&[(URL_A, entry(&["x"], 10, 90))]);
        let side_y = collection(&[(URL_A, entry(&["y"], 10, 80))]);

        let forward = merge(&side_x, &side_y, &strategy, window(50, 100));
        let mirrored = merge(&side_y, &side_x, &strategy.mirrored(), window(50, 100));

        // x is newer: forward updates remote (side_y), mirrored updates local
        // (side_y again, now playing the local role).
        assert!(forward.updates_for_local.is_empty());
        assert!(forward.updates_for_remote.contains_key(URL_A));
        assert!(mirrored.updates_for_remote.is_empty());
        assert!(mirrored.updates_for_local.contains_key(URL_A));
        assert!(
            forward.updates_for_remote[URL_A].content_eq(&mirrored.updates_for_local[URL_A])
        );
    }

    #[test]
    fn test_merge_target_mirroring() {
        assert_eq!(MergeTarget::Local.mirrored(), MergeTarget::Remote);
        assert_eq!(MergeTarget::Remote.mirrored(), MergeTarget::Local);
        assert_eq!(MergeTarget::Both.mirrored(), MergeTarget::Both);
        assert_eq!(MergeTarget::None.as_code(), 0);
        assert_eq!(MergeTarget::Both.as_code(), 3);
    }

    #[test]
    fn test_updated3_strictly_after_both_sides() {
        let local = collection(&[(URL_A, entry(&["a"], 10, 80))]);
        let remote = collection(&[(URL_A, entry(&["b"], 10, 90))]);
        let outcome = merge(&local, &remote, &MergeStrategy::new(1), window(50, 60));

        for updates in [&outcome.updates_for_local, &outcome.updates_for_remote] {
            let stamped = updates[URL_A].meta.updated3.expect("updated3 stamped");
            assert!(stamped > 90);
        }
    }

    #[test]
    fn test_local_only_valid_propagates_to_remote() {
        let local = collection(&[(URL_A, entry(&["a"], 100, 100))]);
        let outcome = merge(
            &local,
            &BookmarkCollection::new(),
            &MergeStrategy::new(1),
            window(50, 60),
        );

        let pushed = &outcome.updates_for_remote[URL_A];
        assert!(pushed.tags.contains("a"));
        assert!(pushed.meta.updated3.unwrap() > 100);
        assert!(outcome.final_remote.contains_key(URL_A));
        assert!(outcome.local_deletions.is_empty());
    }

    #[test]
    fn test_remote_only_stale_becomes_local_tombstone() {
        let remote = collection(&[(URL_A, entry(&["x"], 10, 10))]);
        let outcome = merge(
            &BookmarkCollection::new(),
            &remote,
            &MergeStrategy::new(1),
            window(50, 60),
        );

        // Stale and absent locally: inferred local tombstone, no propagation.
        assert_eq!(outcome.local_deletions, vec![URL_A.to_string()]);
        assert!(outcome.updates_for_local.is_empty());
        assert!(outcome.updates_for_remote.is_empty());
        assert!(!outcome.final_local.contains_key(URL_A));
    }

    #[test]
    fn test_local_only_stale_becomes_remote_tombstone() {
        let local = collection(&[(URL_A, entry(&["x"], 10, 10))]);
        let outcome = merge(
            &local,
            &BookmarkCollection::new(),
            &MergeStrategy::new(1),
            window(50, 60),
        );

        assert_eq!(outcome.remote_deletions, vec![URL_A.to_string()]);
        assert!(outcome.updates_for_remote.is_empty());
    }

    #[test]
    fn test_updated2_only_difference_is_noop() {
        let mut local_entry = entry(&["same"], 40, 40);
        local_entry.meta.updated2 = Some(60);
        let mut remote_entry = entry(&["same"], 40, 40);
        remote_entry.meta.updated2 = Some(70);

        let local = collection(&[(URL_A, local_entry)]);
        let remote = collection(&[(URL_A, remote_entry)]);
        let outcome = merge(&local, &remote, &MergeStrategy::new(1), window(50, 100));

        assert!(outcome.updates_for_local.is_empty());
        assert!(outcome.updates_for_remote.is_empty());
    }

    #[test]
    fn test_meta_merge_overlays_newer_onto_older() {
        let mut older = entry(&["t"], 10, 80);
        older.meta.title = Some("old title".to_string());
        older
            .meta
            .extra
            .insert("keep".to_string(), serde_json::json!(1));
        older
            .meta
            .extra
            .insert("clash".to_string(), serde_json::json!("old"));

        let mut newer = entry(&["t"], 10, 90);
        newer
            .meta
            .extra
            .insert("clash".to_string(), serde_json::json!("new"));
        newer
            .meta
            .extra
            .insert("added".to_string(), serde_json::json!(2));

        let local = collection(&[(URL_A, older)]);
        let remote = collection(&[(URL_A, newer)]);
        let outcome = merge(&local, &remote, &MergeStrategy::new(1), window(50, 100));

        let merged = &outcome.updates_for_local[URL_A];
        assert_eq!(merged.meta.title.as_deref(), Some("old title"));
        assert_eq!(merged.meta.extra["keep"], serde_json::json!(1));
        assert_eq!(merged.meta.extra["clash"], serde_json::json!("new"));
        assert_eq!(merged.meta.extra["added"], serde_json::json!(2));
        assert_eq!(merged.meta.updated, 90);
        assert_eq!(merged.meta.created, 10);
    }

    #[test]
    fn test_created_updated_finalization_flags() {
        let mut strategy = MergeStrategy::new(1).with_meta(MetaStrategy::Local);
        let local = collection(&[(URL_A, entry(&["a"], 30, 80))]);
        let remote = collection(&[(URL_A, entry(&["b"], 20, 90))]);

        let outcome = merge(&local, &remote, &strategy, window(50, 100));
        let merged = &outcome.updates_for_local[URL_A];
        assert_eq!(merged.meta.created, 20);
        assert_eq!(merged.meta.updated, 90);

        strategy.prefer_oldest_created = false;
        strategy.prefer_newest_updated = false;
        let outcome = merge(&local, &remote, &strategy, window(50, 100));
        // The strategy-chosen (local) timestamps stand, unfinalized.
        let merged = &outcome.updates_for_local[URL_A];
        assert_eq!(merged.meta.created, 30);
        assert_eq!(merged.meta.updated, 80);
    }

    #[test]
    fn test_soft_delete_survives_union_with_bookkeeping() {
        let mut deleted = entry(&["a"], 10, 80);
        deleted.soft_delete(80, DeleteActionType::Delete);
        let local = collection(&[(URL_A, deleted)]);
        let remote = collection(&[(URL_A, entry(&["a", "b"], 10, 70))]);

        let outcome = merge(&local, &remote, &MergeStrategy::new(1), window(50, 100));
        let merged = &outcome.updates_for_remote[URL_A];
        assert!(merged.is_soft_deleted());
        assert!(merged.deleted_meta.is_some());
    }

    #[test]
    fn test_malformed_url_is_skipped() {
        let local = collection(&[("not a url", entry(&["a"], 10, 80))]);
        let remote = collection(&[("not a url", entry(&["b"], 10, 90))]);
        let outcome = merge(&local, &remote, &MergeStrategy::new(1), window(50, 100));

        assert!(outcome.updates_for_local.is_empty());
        assert!(outcome.updates_for_remote.is_empty());
        // The key stays on both sides, just unprocessed.
        assert!(outcome.final_local.contains_key("not a url"));
        assert!(outcome.final_remote.contains_key("not a url"));
    }

    #[test]
    fn test_progress_batches() {
        let mut local = BookmarkCollection::new();
        for i in 0..5 {
            local.insert(
                format!("https://site{i}.example/"),
                entry(&["t"], 100, 100),
            );
        }
        let seen = RefCell::new(Vec::new());
        merge_with_progress(
            &local,
            &BookmarkCollection::new(),
            &MergeStrategy::new(1),
            window(50, 200),
            2,
            &|p| seen.borrow_mut().push((p.processed, p.total)),
        );
        assert_eq!(*seen.borrow(), vec![(2, 5), (4, 5), (5, 5)]);
    }

    #[test]
    fn test_final_snapshots_apply_deletions_and_updates() {
        // URL_A: stale remote-only (local tombstone). URL_B: fresh local-only.
        let local = collection(&[(URL_B, entry(&["new"], 100, 100))]);
        let remote = collection(&[(URL_A, entry(&["old"], 10, 10))]);
        let outcome = merge(&local, &remote, &MergeStrategy::new(1), window(50, 200));

        assert!(!outcome.final_local.contains_key(URL_A));
        assert!(outcome.final_local.contains_key(URL_B));
        assert!(outcome.final_remote.contains_key(URL_A));
        assert!(outcome.final_remote.contains_key(URL_B));
    }
}
