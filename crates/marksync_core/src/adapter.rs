//! Backend adapter contract.
//!
//! A [`SyncAdapter`] is the pluggable transport a sync service talks through:
//! GitHub, WebDAV, an HTTP API, a browser extension bridge, or the in-memory
//! test double in [`memory`]. Adapters move opaque snapshot strings and
//! version metadata; they never interpret bookmark content.
//!
//! All methods return boxed futures so the trait stays object-safe and the
//! orchestrator can hold adapters behind `Arc<dyn SyncAdapter>`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::bookmark::Timestamp;
use crate::error::{Result, SyncError};

pub mod memory;

/// Boxed future used throughout the adapter and store traits.
#[cfg(not(target_arch = "wasm32"))]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Boxed future used throughout the adapter and store traits.
///
/// On wasm32 futures are not required to be `Send` since execution is
/// single-threaded.
#[cfg(target_arch = "wasm32")]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Cooperative cancellation handle shared between the orchestrator and
/// long-running adapter operations.
///
/// Cloning is cheap; all clones observe the same flag. Cancellation is
/// one-way: once set the token stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation on every clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Bail out with [`SyncError::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Authentication state reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    /// Credentials verified against the backend.
    Authenticated,
    /// Credentials rejected by the backend.
    Unauthenticated,
    /// The adapter is missing required configuration.
    RequiresConfig,
    /// The backend could not be reached to verify credentials.
    Error,
    /// Not yet checked.
    #[default]
    Unknown,
}

/// Version metadata describing one remote snapshot revision.
///
/// The `version` string is opaque to the engine: an ETag, a git blob SHA, a
/// WebDAV Last-Modified value, whatever the backend natively versions by.
/// Equality comparison is the only operation performed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    /// Backend-native revision identifier.
    pub version: String,
    /// Server-side modification time, when the backend exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl SyncMetadata {
    /// Metadata carrying only a version string.
    pub fn versioned(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            timestamp: None,
        }
    }
}

/// A downloaded remote snapshot: raw body plus the revision it was read at.
///
/// `data: None` means the remote store exists but holds no snapshot yet
/// (first sync against an empty backend).
#[derive(Debug, Clone, Default)]
pub struct RemotePayload {
    /// Raw snapshot body, exactly as stored.
    pub data: Option<String>,
    /// Revision the body was read at, when the backend exposes one.
    pub meta: Option<SyncMetadata>,
}

/// Transport contract implemented per backend.
///
/// Implementations are expected to be internally synchronized: the
/// orchestrator calls them behind an `Arc` and may probe
/// [`auth_status`](Self::auth_status) concurrently with a running cycle.
#[cfg(not(target_arch = "wasm32"))]
pub trait SyncAdapter: Send + Sync {
    /// Short backend name used in logs and error messages
    /// (`"github"`, `"webdav"`, ...).
    fn kind(&self) -> &'static str;

    /// Prepare the adapter for use. Called once before the first cycle;
    /// must be idempotent.
    fn init(&self) -> BoxFuture<'_, Result<()>>;

    /// Check credentials against the backend without transferring snapshot
    /// data. Never fails: an unreachable backend reports
    /// [`AuthStatus::Error`], a cancelled or uninitialized check resolves to
    /// [`AuthStatus::Unknown`].
    fn auth_status<'a>(&'a self, cancel: &'a CancelToken) -> BoxFuture<'a, AuthStatus>;

    /// Fetch the current remote revision without downloading the body.
    /// `Ok(None)` means no snapshot exists remotely yet.
    fn remote_metadata<'a>(
        &'a self,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, Result<Option<SyncMetadata>>>;

    /// Download the remote snapshot body and the revision it was read at.
    fn download<'a>(&'a self, cancel: &'a CancelToken) -> BoxFuture<'a, Result<RemotePayload>>;

    /// Upload `body`. When `expected_version` is supplied the write is
    /// conditional: it must fail with [`SyncError::VersionConflict`] if the
    /// remote revision no longer equals it. `None` skips the concurrency
    /// check and creates or overwrites unconditionally.
    /// Returns the new revision on success.
    fn upload<'a>(
        &'a self,
        body: &'a str,
        expected_version: Option<&'a str>,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, Result<SyncMetadata>>;

    /// Release backend resources. The adapter must reject further calls
    /// afterwards.
    fn destroy(&self) -> BoxFuture<'_, Result<()>>;
}

/// Transport contract implemented per backend (single-threaded wasm form).
#[cfg(target_arch = "wasm32")]
pub trait SyncAdapter {
    /// Short backend name used in logs and error messages.
    fn kind(&self) -> &'static str;

    /// Prepare the adapter for use. Must be idempotent.
    fn init(&self) -> BoxFuture<'_, Result<()>>;

    /// Check credentials against the backend. Never fails.
    fn auth_status<'a>(&'a self, cancel: &'a CancelToken) -> BoxFuture<'a, AuthStatus>;

    /// Fetch the current remote revision without downloading the body.
    fn remote_metadata<'a>(
        &'a self,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, Result<Option<SyncMetadata>>>;

    /// Download the remote snapshot body.
    fn download<'a>(&'a self, cancel: &'a CancelToken) -> BoxFuture<'a, Result<RemotePayload>>;

    /// Upload `body`, conditionally when `expected_version` is supplied,
    /// unconditionally when it is omitted.
    fn upload<'a>(
        &'a self,
        body: &'a str,
        expected_version: Option<&'a str>,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, Result<SyncMetadata>>;

    /// Release backend resources.
    fn destroy(&self) -> BoxFuture<'_, Result<()>>;
}

/// Drive a future to completion on the current thread. Test helper.
#[cfg(test)]
pub(crate) fn block_on_test<F: Future>(future: F) -> F::Output {
    futures_lite::future::block_on(future)
}
