//! In-memory [`SyncAdapter`] with compare-and-swap versioning and failure
//! injection. Backs the engine's tests and doubles as a reference for how a
//! real backend should behave, conditional writes included.

use std::sync::Mutex;

use crate::adapter::{AuthStatus, BoxFuture, CancelToken, RemotePayload, SyncAdapter, SyncMetadata};
use crate::bookmark::Timestamp;
use crate::error::{Result, SyncError};

#[derive(Debug, Default)]
struct Inner {
    initialized: bool,
    destroyed: bool,
    content: Option<String>,
    version: u64,
    timestamp: Option<Timestamp>,
    auth: AuthStatus,
    fail_metadata: Option<String>,
    fail_download: Option<String>,
    fail_upload: Option<String>,
}

/// Adapter holding its remote state behind a mutex.
///
/// Versions are a monotonically increasing counter rendered as a string;
/// version `0` means "no snapshot exists". Injected failures fire once and
/// clear themselves.
#[derive(Debug)]
pub struct MemoryAdapter {
    inner: Mutex<Inner>,
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter {
    /// An empty, authenticated remote.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                auth: AuthStatus::Authenticated,
                ..Inner::default()
            }),
        }
    }

    /// Place a snapshot body on the remote, bumping the version.
    pub fn seed(&self, body: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.content = Some(body.into());
        inner.version += 1;
    }

    /// Set the server-side timestamp reported in metadata.
    pub fn set_timestamp(&self, timestamp: Timestamp) {
        self.inner.lock().unwrap().timestamp = Some(timestamp);
    }

    /// Override the reported authentication state.
    pub fn set_auth(&self, auth: AuthStatus) {
        self.inner.lock().unwrap().auth = auth;
    }

    /// Make the next `remote_metadata` call fail with a network error.
    pub fn fail_next_metadata(&self, message: impl Into<String>) {
        self.inner.lock().unwrap().fail_metadata = Some(message.into());
    }

    /// Make the next `download` call fail with a network error.
    pub fn fail_next_download(&self, message: impl Into<String>) {
        self.inner.lock().unwrap().fail_download = Some(message.into());
    }

    /// Make the next `upload` call fail with a network error.
    pub fn fail_next_upload(&self, message: impl Into<String>) {
        self.inner.lock().unwrap().fail_upload = Some(message.into());
    }

    /// The current remote body, if any.
    pub fn content(&self) -> Option<String> {
        self.inner.lock().unwrap().content.clone()
    }

    /// The current version counter.
    pub fn version(&self) -> u64 {
        self.inner.lock().unwrap().version
    }

    fn network_error(&self, message: String) -> SyncError {
        SyncError::Network {
            backend: self.kind().to_string(),
            message,
        }
    }

    fn guard(inner: &Inner) -> Result<()> {
        if inner.destroyed {
            Err(SyncError::Destroyed)
        } else if !inner.initialized {
            Err(SyncError::NotInitialized)
        } else {
            Ok(())
        }
    }

    fn current_metadata(inner: &Inner) -> Option<SyncMetadata> {
        (inner.version > 0).then(|| SyncMetadata {
            version: inner.version.to_string(),
            timestamp: inner.timestamp,
        })
    }
}

impl SyncAdapter for MemoryAdapter {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn init(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            if inner.destroyed {
                return Err(SyncError::Destroyed);
            }
            inner.initialized = true;
            Ok(())
        })
    }

    fn auth_status<'a>(&'a self, cancel: &'a CancelToken) -> BoxFuture<'a, AuthStatus> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return AuthStatus::Unknown;
            }
            let inner = self.inner.lock().unwrap();
            if Self::guard(&inner).is_err() {
                return AuthStatus::Unknown;
            }
            inner.auth
        })
    }

    fn remote_metadata<'a>(
        &'a self,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, Result<Option<SyncMetadata>>> {
        Box::pin(async move {
            cancel.check()?;
            let mut inner = self.inner.lock().unwrap();
            Self::guard(&inner)?;
            if let Some(message) = inner.fail_metadata.take() {
                return Err(self.network_error(message));
            }
            Ok(Self::current_metadata(&inner))
        })
    }

    fn download<'a>(&'a self, cancel: &'a CancelToken) -> BoxFuture<'a, Result<RemotePayload>> {
        Box::pin(async move {
            cancel.check()?;
            let mut inner = self.inner.lock().unwrap();
            Self::guard(&inner)?;
            if let Some(message) = inner.fail_download.take() {
                return Err(self.network_error(message));
            }
            Ok(RemotePayload {
                data: inner.content.clone(),
                meta: Self::current_metadata(&inner),
            })
        })
    }

    fn upload<'a>(
        &'a self,
        body: &'a str,
        expected_version: Option<&'a str>,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, Result<SyncMetadata>> {
        Box::pin(async move {
            cancel.check()?;
            let mut inner = self.inner.lock().unwrap();
            Self::guard(&inner)?;
            if let Some(message) = inner.fail_upload.take() {
                return Err(self.network_error(message));
            }
            // Omitting the expected version skips the concurrency check,
            // creating or overwriting whatever is there.
            if let Some(expected) = expected_version {
                let current = (inner.version > 0).then(|| inner.version.to_string());
                if current.as_deref() != Some(expected) {
                    return Err(SyncError::VersionConflict {
                        expected: expected.to_string(),
                        found: current.unwrap_or_else(|| "none".to_string()),
                    });
                }
            }
            inner.content = Some(body.to_string());
            inner.version += 1;
            Ok(SyncMetadata {
                version: inner.version.to_string(),
                timestamp: inner.timestamp,
            })
        })
    }

    fn destroy(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.destroyed = true;
            inner.initialized = false;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::block_on_test;

    #[test]
    fn test_requires_init_before_use() {
        let adapter = MemoryAdapter::new();
        let cancel = CancelToken::new();
        let err = block_on_test(adapter.download(&cancel)).unwrap_err();
        assert!(matches!(err, SyncError::NotInitialized));

        block_on_test(adapter.init()).unwrap();
        let payload = block_on_test(adapter.download(&cancel)).unwrap();
        assert!(payload.data.is_none());
        assert!(payload.meta.is_none());
    }

    #[test]
    fn test_upload_download_roundtrip() {
        let adapter = MemoryAdapter::new();
        block_on_test(adapter.init()).unwrap();
        let cancel = CancelToken::new();

        let meta = block_on_test(adapter.upload("{\"data\":{}}", None, &cancel)).unwrap();
        assert_eq!(meta.version, "1");

        let payload = block_on_test(adapter.download(&cancel)).unwrap();
        assert_eq!(payload.data.as_deref(), Some("{\"data\":{}}"));
        assert_eq!(payload.meta.unwrap().version, "1");
    }

    #[test]
    fn test_unconditional_upload_overwrites() {
        let adapter = MemoryAdapter::new();
        block_on_test(adapter.init()).unwrap();
        let cancel = CancelToken::new();

        adapter.seed("first");
        // No expectation given, so the write goes through regardless.
        let meta = block_on_test(adapter.upload("second", None, &cancel)).unwrap();
        assert_eq!(meta.version, "2");
        assert_eq!(adapter.content().as_deref(), Some("second"));
    }

    #[test]
    fn test_conditional_upload_detects_conflict() {
        let adapter = MemoryAdapter::new();
        block_on_test(adapter.init()).unwrap();
        let cancel = CancelToken::new();

        // Expecting a revision on an empty remote loses.
        let err = block_on_test(adapter.upload("body", Some("1"), &cancel)).unwrap_err();
        assert!(matches!(
            err,
            SyncError::VersionConflict { ref expected, ref found }
                if expected == "1" && found == "none"
        ));

        adapter.seed("first");
        // Matching version succeeds and bumps.
        block_on_test(adapter.upload("second", Some("1"), &cancel)).unwrap();
        assert_eq!(adapter.version(), 2);

        // The stale version now loses.
        let err = block_on_test(adapter.upload("third", Some("1"), &cancel)).unwrap_err();
        assert!(matches!(
            err,
            SyncError::VersionConflict { ref expected, ref found }
                if expected == "1" && found == "2"
        ));
        assert_eq!(adapter.content().as_deref(), Some("second"));
    }

    #[test]
    fn test_cancelled_upload_never_touches_remote() {
        let adapter = MemoryAdapter::new();
        block_on_test(adapter.init()).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = block_on_test(adapter.upload("body", None, &cancel)).unwrap_err();
        assert!(err.is_cancelled());
        assert!(adapter.content().is_none());

        assert!(block_on_test(adapter.download(&cancel)).unwrap_err().is_cancelled());
        assert_eq!(
            block_on_test(adapter.auth_status(&cancel)),
            AuthStatus::Unknown
        );
    }

    #[test]
    fn test_injected_failures_fire_once() {
        let adapter = MemoryAdapter::new();
        block_on_test(adapter.init()).unwrap();
        let cancel = CancelToken::new();

        adapter.fail_next_download("socket closed");
        let err = block_on_test(adapter.download(&cancel)).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Network { ref backend, ref message }
                if backend == "memory" && message == "socket closed"
        ));
        block_on_test(adapter.download(&cancel)).unwrap();
    }

    #[test]
    fn test_destroyed_adapter_rejects_everything() {
        let adapter = MemoryAdapter::new();
        block_on_test(adapter.init()).unwrap();
        block_on_test(adapter.destroy()).unwrap();

        assert!(matches!(
            block_on_test(adapter.init()).unwrap_err(),
            SyncError::Destroyed
        ));
        // Auth probing never fails, it degrades to unknown.
        let cancel = CancelToken::new();
        assert_eq!(
            block_on_test(adapter.auth_status(&cancel)),
            AuthStatus::Unknown
        );
    }
}
