//! Common error types for marksync operations.

use thiserror::Error;

/// Unified error type for sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Service configuration is missing or structurally invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The adapter was used before `init` or after `destroy`.
    #[error("sync adapter is not initialized")]
    NotInitialized,

    /// The orchestrator was destroyed; no further operations are available.
    #[error("sync is no longer available (orchestrator destroyed)")]
    Destroyed,

    /// Transport or backend failure during check/download/upload.
    #[error("network error from {backend}: {message}")]
    Network {
        /// Backend name (e.g. "github", "webdav").
        backend: String,
        /// Human-readable cause.
        message: String,
    },

    /// Optimistic-concurrency check failed on upload: the remote object moved.
    #[error("remote version conflict: expected {expected}, found {found}")]
    VersionConflict {
        /// Version token the caller expected the remote to be at.
        expected: String,
        /// Version token the remote actually reported.
        found: String,
    },

    /// Malformed remote payload or missing expected metadata.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Local store read/write failure.
    #[error("store error: {0}")]
    Store(String),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The operation was cancelled via its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// A stage-qualified sync cycle failure, already formatted for reporting.
    #[error("{0}")]
    Cycle(String),
}

impl SyncError {
    /// True if this error is an optimistic-concurrency conflict that callers
    /// can resolve by re-running the cycle after a fresh download.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::VersionConflict { .. })
    }

    /// True if this error was caused by cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
