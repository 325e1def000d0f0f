//! The sync cycle driver.
//!
//! [`SyncOrchestrator`] owns the registered services, their backend adapters
//! and the event fan-out, and runs the per-service cycle:
//! check remote revision, download, merge, conditionally upload, persist.
//! One store write at most per cycle, and a conflicting remote write aborts
//! the cycle before anything local is touched.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use indexmap::IndexMap;

use crate::adapter::{AuthStatus, CancelToken, SyncAdapter};
use crate::config::SyncServiceConfig;
use crate::error::{Result, SyncError};
use crate::events::{EventRegistry, SyncEvent};
use crate::merge::{MergeOutcome, SyncWindow, merge_with_progress};
use crate::snapshot::{DATABASE_VERSION, SnapshotMeta, SnapshotStats, SyncedSnapshot};
use crate::store::BookmarkStore;
use crate::sync::SyncPhase;

/// Builds a backend adapter from a service configuration.
///
/// The orchestrator calls the factory once per service and caches the
/// result; hosts plug in whichever backends they link.
#[cfg(not(target_arch = "wasm32"))]
pub trait AdapterFactory: Send + Sync {
    /// Build an adapter for `config`'s backend.
    fn create(&self, config: &SyncServiceConfig) -> Result<Arc<dyn SyncAdapter>>;
}

#[cfg(not(target_arch = "wasm32"))]
impl<F> AdapterFactory for F
where
    F: Fn(&SyncServiceConfig) -> Result<Arc<dyn SyncAdapter>> + Send + Sync,
{
    fn create(&self, config: &SyncServiceConfig) -> Result<Arc<dyn SyncAdapter>> {
        self(config)
    }
}

/// Builds a backend adapter from a service configuration (wasm form).
#[cfg(target_arch = "wasm32")]
pub trait AdapterFactory {
    /// Build an adapter for `config`'s backend.
    fn create(&self, config: &SyncServiceConfig) -> Result<Arc<dyn SyncAdapter>>;
}

#[cfg(target_arch = "wasm32")]
impl<F> AdapterFactory for F
where
    F: Fn(&SyncServiceConfig) -> Result<Arc<dyn SyncAdapter>>,
{
    fn create(&self, config: &SyncServiceConfig) -> Result<Arc<dyn SyncAdapter>> {
        self(config)
    }
}

/// How a cycle that ran to a decision point ended.
enum CycleEnd {
    /// Both sides converged; carries the counts reported to subscribers.
    Clean {
        local_updates: usize,
        remote_updates: usize,
        local_deletions: usize,
        remote_deletions: usize,
        uploaded: bool,
    },
    /// The remote moved underneath the cycle; nothing was written anywhere.
    Conflict { message: String },
}

/// Removes the service from the in-flight set when the cycle ends, on every
/// exit path.
struct InFlightGuard<'a> {
    orchestrator: &'a SyncOrchestrator,
    service_id: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(orchestrator: &'a SyncOrchestrator, service_id: &str) -> Option<Self> {
        let mut in_flight = orchestrator.in_flight.lock().unwrap();
        if !in_flight.insert(service_id.to_string()) {
            return None;
        }
        Some(Self {
            orchestrator,
            service_id: service_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator
            .in_flight
            .lock()
            .unwrap()
            .remove(&self.service_id);
    }
}

/// Drives sync cycles for a set of configured services against one local
/// bookmark store.
pub struct SyncOrchestrator {
    store: Arc<dyn BookmarkStore>,
    factory: Box<dyn AdapterFactory>,
    services: Mutex<IndexMap<String, SyncServiceConfig>>,
    adapters: Mutex<HashMap<String, Arc<dyn SyncAdapter>>>,
    events: EventRegistry,
    in_flight: Mutex<HashSet<String>>,
    phases: Mutex<HashMap<String, SyncPhase>>,
    cancel: CancelToken,
    destroyed: AtomicBool,
    device_name: Option<String>,
    merge_batch_size: usize,
}

impl SyncOrchestrator {
    /// Create an orchestrator over `store`, building adapters with `factory`.
    pub fn new(store: Arc<dyn BookmarkStore>, factory: Box<dyn AdapterFactory>) -> Self {
        Self {
            store,
            factory,
            services: Mutex::new(IndexMap::new()),
            adapters: Mutex::new(HashMap::new()),
            events: EventRegistry::new(),
            in_flight: Mutex::new(HashSet::new()),
            phases: Mutex::new(HashMap::new()),
            cancel: CancelToken::new(),
            destroyed: AtomicBool::new(false),
            device_name: None,
            merge_batch_size: crate::merge::DEFAULT_BATCH_SIZE,
        }
    }

    /// Record this device's name in uploaded snapshot metadata.
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// Override how many URLs the merge processes between progress events.
    pub fn with_merge_batch_size(mut self, batch_size: usize) -> Self {
        self.merge_batch_size = batch_size.max(1);
        self
    }

    /// Event registry for subscribing to lifecycle events.
    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    /// Register or replace a service. A replaced service's cached adapter is
    /// destroyed so the next cycle rebuilds it from the new configuration.
    pub async fn register_service(&self, config: SyncServiceConfig) -> Result<()> {
        self.ensure_live()?;
        config.validate()?;
        let id = config.id.clone();
        self.services.lock().unwrap().insert(id.clone(), config);
        self.drop_cached_adapter(&id).await;
        Ok(())
    }

    /// Remove a service and destroy its cached adapter. Returns false if the
    /// id was not registered.
    pub async fn remove_service(&self, service_id: &str) -> Result<bool> {
        self.ensure_live()?;
        let removed = self
            .services
            .lock()
            .unwrap()
            .shift_remove(service_id)
            .is_some();
        self.drop_cached_adapter(service_id).await;
        self.phases.lock().unwrap().remove(service_id);
        Ok(removed)
    }

    /// Switch a service on or off.
    pub fn set_enabled(&self, service_id: &str, enabled: bool) -> Result<()> {
        self.ensure_live()?;
        let mut services = self.services.lock().unwrap();
        let config = services
            .get_mut(service_id)
            .ok_or_else(|| Self::unknown_service(service_id))?;
        config.enabled = enabled;
        Ok(())
    }

    /// Current configuration of one service.
    pub fn service(&self, service_id: &str) -> Option<SyncServiceConfig> {
        self.services.lock().unwrap().get(service_id).cloned()
    }

    /// All registered services, in registration order.
    pub fn services(&self) -> Vec<SyncServiceConfig> {
        self.services.lock().unwrap().values().cloned().collect()
    }

    /// Current phase of a service; `Idle` when unknown or between cycles.
    pub fn phase(&self, service_id: &str) -> SyncPhase {
        *self
            .phases
            .lock()
            .unwrap()
            .get(service_id)
            .unwrap_or(&SyncPhase::Idle)
    }

    /// Check a service's backend credentials without running a cycle.
    pub async fn auth_status(&self, service_id: &str) -> Result<AuthStatus> {
        self.ensure_live()?;
        let config = self
            .service(service_id)
            .ok_or_else(|| Self::unknown_service(service_id))?;
        let adapter = self.adapter_for(&config).await?;
        Ok(adapter.auth_status(&self.cancel).await)
    }

    /// Run one cycle for `service_id`.
    ///
    /// `Ok(true)` means the cycle ran to success. `Ok(false)` means it was
    /// skipped (disabled service, cycle already in flight) or stopped on a
    /// conflict; subscribers learn which from the emitted events. `Err` is a
    /// stage failure.
    pub async fn sync_service(&self, service_id: &str) -> Result<bool> {
        self.ensure_live()?;
        let config = self
            .service(service_id)
            .ok_or_else(|| Self::unknown_service(service_id))?;

        if !config.enabled {
            self.enter_phase(service_id, SyncPhase::Disabled);
            self.events.emit(&SyncEvent::info(
                format!("sync skipped for {service_id}: service is disabled"),
                Some(service_id),
            ));
            return Ok(false);
        }

        let Some(_guard) = InFlightGuard::acquire(self, service_id) else {
            self.events.emit(&SyncEvent::info(
                format!("sync skipped for {service_id}: a cycle is already in flight"),
                Some(service_id),
            ));
            return Ok(false);
        };

        self.events.emit(&SyncEvent::sync_start(service_id));
        let end = self.run_cycle(&config).await;
        match end {
            Ok(CycleEnd::Clean {
                local_updates,
                remote_updates,
                local_deletions,
                remote_deletions,
                uploaded,
            }) => {
                self.enter_phase(service_id, SyncPhase::Success);
                self.events.emit(&SyncEvent::SyncSuccess {
                    service_id: service_id.to_string(),
                    local_updates,
                    remote_updates,
                    local_deletions,
                    remote_deletions,
                    uploaded,
                });
                self.events
                    .emit(&SyncEvent::sync_end(service_id, SyncPhase::Success, None));
                self.enter_phase(service_id, SyncPhase::Idle);
                Ok(true)
            }
            Ok(CycleEnd::Conflict { message }) => {
                self.enter_phase(service_id, SyncPhase::Conflict);
                self.events
                    .emit(&SyncEvent::sync_conflict(service_id, message));
                self.events
                    .emit(&SyncEvent::sync_end(service_id, SyncPhase::Conflict, None));
                self.enter_phase(service_id, SyncPhase::Idle);
                Ok(false)
            }
            Err(err) => {
                self.enter_phase(service_id, SyncPhase::Error);
                self.events
                    .emit(&SyncEvent::error(err.to_string(), Some(service_id)));
                self.events.emit(&SyncEvent::sync_end(
                    service_id,
                    SyncPhase::Error,
                    Some(err.to_string()),
                ));
                self.enter_phase(service_id, SyncPhase::Idle);
                Err(err)
            }
        }
    }

    /// Run one cycle for every registered service, in registration order.
    /// A failing service does not stop the ones after it.
    pub async fn sync_all(&self) -> Vec<(String, Result<bool>)> {
        let ids: Vec<String> = self.services.lock().unwrap().keys().cloned().collect();
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self.sync_service(&id).await;
            if let Err(err) = &result {
                log::error!("sync failed for {id}: {err}");
            }
            results.push((id, result));
        }
        results
    }

    /// Tear the orchestrator down: cancel in-flight work, destroy every
    /// cached adapter and drop all subscribers. Idempotent; every later call
    /// on this orchestrator fails with [`SyncError::Destroyed`].
    pub async fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.cancel.cancel();
        let adapters: Vec<(String, Arc<dyn SyncAdapter>)> =
            self.adapters.lock().unwrap().drain().collect();
        for (id, adapter) in adapters {
            if let Err(err) = adapter.destroy().await {
                log::error!("failed to destroy adapter for {id}: {err}");
            }
        }
        self.events.clear();
        Ok(())
    }

    fn ensure_live(&self) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            Err(SyncError::Destroyed)
        } else {
            Ok(())
        }
    }

    fn unknown_service(service_id: &str) -> SyncError {
        SyncError::Configuration(format!("sync configuration not found for {service_id:?}"))
    }

    fn enter_phase(&self, service_id: &str, phase: SyncPhase) {
        self.phases
            .lock()
            .unwrap()
            .insert(service_id.to_string(), phase);
        self.events
            .emit(&SyncEvent::status_change(phase, Some(service_id)));
    }

    async fn drop_cached_adapter(&self, service_id: &str) {
        let adapter = self.adapters.lock().unwrap().remove(service_id);
        if let Some(adapter) = adapter {
            if let Err(err) = adapter.destroy().await {
                log::warn!("failed to destroy cached adapter for {service_id}: {err}");
            }
        }
    }

    async fn adapter_for(&self, config: &SyncServiceConfig) -> Result<Arc<dyn SyncAdapter>> {
        if let Some(adapter) = self.adapters.lock().unwrap().get(&config.id) {
            return Ok(adapter.clone());
        }
        let adapter = self.factory.create(config)?;
        adapter.init().await?;
        // A concurrent caller may have built and cached an adapter while ours
        // was initializing; the cached one wins and ours is torn down.
        let existing = {
            use std::collections::hash_map::Entry;
            let mut adapters = self.adapters.lock().unwrap();
            match adapters.entry(config.id.clone()) {
                Entry::Occupied(entry) => Some(entry.get().clone()),
                Entry::Vacant(entry) => {
                    entry.insert(adapter.clone());
                    None
                }
            }
        };
        if let Some(existing) = existing {
            if let Err(err) = adapter.destroy().await {
                log::warn!("failed to destroy duplicate adapter for {}: {err}", config.id);
            }
            return Ok(existing);
        }
        Ok(adapter)
    }

    /// Wrap a stage failure, passing cancellation through untouched.
    fn stage_error(message: String, err: SyncError) -> SyncError {
        match err {
            SyncError::Cancelled => SyncError::Cancelled,
            other => SyncError::Cycle(format!("{message}: {other}")),
        }
    }

    async fn run_cycle(&self, config: &SyncServiceConfig) -> Result<CycleEnd> {
        let id = &config.id;
        let adapter = self.adapter_for(config).await?;
        self.cancel.check()?;

        self.enter_phase(id, SyncPhase::Checking);
        let checked = adapter.remote_metadata(&self.cancel).await.map_err(|err| {
            Self::stage_error(format!("Failed to check remote version for {id}"), err)
        })?;

        self.enter_phase(id, SyncPhase::Downloading);
        let payload = adapter.download(&self.cancel).await.map_err(|err| {
            Self::stage_error(format!("Failed to fetch remote data for {id}"), err)
        })?;
        let snapshot = match &payload.data {
            Some(body) => SyncedSnapshot::parse(body).map_err(|err| {
                SyncError::Validation(format!(
                    "malformed remote snapshot from {} backend for {id}: {err}",
                    config.backend.kind()
                ))
            })?,
            None => None,
        };
        // A service that has synced before must find a trustworthy remote
        // state: both the backend revision and the snapshot's own metadata.
        let has_snapshot_meta = snapshot.as_ref().is_some_and(|s| s.meta.is_some());
        if config.last_data_change_timestamp > 0 && (checked.is_none() || !has_snapshot_meta) {
            return Err(SyncError::Validation(format!(
                "remote data validation failed for {id}: expected snapshot metadata is missing"
            )));
        }
        if let Some(meta) = snapshot.as_ref().and_then(|s| s.meta.as_ref()) {
            if meta.database_version > DATABASE_VERSION {
                return Err(SyncError::Validation(format!(
                    "remote snapshot for {id} uses database version {}, this engine supports up to {DATABASE_VERSION}",
                    meta.database_version
                )));
            }
        }
        let (remote_data, remote_snapshot_meta) = match snapshot {
            Some(snapshot) => (snapshot.data, snapshot.meta),
            None => (Default::default(), None),
        };
        self.cancel.check()?;

        self.enter_phase(id, SyncPhase::Merging);
        let state = self.store.read().await.map_err(|err| {
            Self::stage_error(format!("Bookmark merging failed for {id}"), err)
        })?;
        let now = Utc::now().timestamp_millis();
        let mut strategy = config.strategy.clone();
        if strategy.default_date == 0 {
            strategy.default_date = now;
        }
        let window = SyncWindow {
            last_sync_time: config.last_data_change_timestamp,
            current_sync_time: now,
        };
        let outcome: MergeOutcome = merge_with_progress(
            &state.data,
            &remote_data,
            &strategy,
            window,
            self.merge_batch_size,
            &|progress| {
                self.events
                    .emit(&SyncEvent::merge_progress(id, progress.processed, progress.total));
            },
        );
        self.cancel.check()?;

        // An upload happens when the merge changed the remote side, or on a
        // first sync against an empty remote that has local data to publish.
        let needs_upload = outcome.has_remote_changes()
            || (checked.is_none() && !outcome.final_remote.is_empty());
        let mut remote_version = checked.as_ref().map(|m| m.version.clone());
        let uploaded = if needs_upload {
            self.enter_phase(id, SyncPhase::Uploading);
            let mut meta = SnapshotMeta::new(now);
            if let Some(previous) = &remote_snapshot_meta {
                meta.created = previous.created;
            }
            meta.stats = Some(SnapshotStats::of(&outcome.final_remote));
            meta.last_upload_device = self.device_name.clone();
            let body = SyncedSnapshot {
                data: outcome.final_remote.clone(),
                meta: Some(meta),
            }
            .to_json()?;
            // The CAS token is the revision observed during the checking
            // phase, so remote movement any time after the check conflicts.
            let expected = checked.as_ref().map(|m| m.version.as_str());
            match adapter.upload(&body, expected, &self.cancel).await {
                Ok(new_meta) => {
                    remote_version = Some(new_meta.version);
                    true
                }
                Err(err) if err.is_conflict() => {
                    return Ok(CycleEnd::Conflict {
                        message: err.to_string(),
                    });
                }
                Err(err) => {
                    return Err(Self::stage_error(
                        format!("Failed to upload data for {id}"),
                        err,
                    ));
                }
            }
        } else {
            false
        };

        // The single store write of the cycle, after the remote side is safe.
        if outcome.has_local_changes() {
            self.store.write(&outcome.final_local).await.map_err(|err| {
                Self::stage_error(format!("Failed to persist merged bookmarks for {id}"), err)
            })?;
        }

        {
            let mut services = self.services.lock().unwrap();
            if let Some(live) = services.get_mut(id) {
                live.last_sync_timestamp = now;
                live.last_data_change_timestamp = now;
                live.remote_version = remote_version;
            }
        }

        Ok(CycleEnd::Clean {
            local_updates: outcome.updates_for_local.len(),
            remote_updates: outcome.updates_for_remote.len(),
            local_deletions: outcome.local_deletions.len(),
            remote_deletions: outcome.remote_deletions.len(),
            uploaded,
        })
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl SyncOrchestrator {
    /// Blocking wrapper around [`sync_service`](Self::sync_service) for hosts
    /// without an async runtime.
    pub fn sync_service_blocking(&self, service_id: &str) -> Result<bool> {
        futures_lite::future::block_on(self.sync_service(service_id))
    }

    /// Blocking wrapper around [`sync_all`](Self::sync_all).
    pub fn sync_all_blocking(&self) -> Vec<(String, Result<bool>)> {
        futures_lite::future::block_on(self.sync_all())
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("services", &self.services.lock().unwrap().len())
            .field("destroyed", &self.destroyed.load(Ordering::SeqCst))
            .finish()
    }
}
