//! Per-service sync configuration.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use url::Url;

use crate::bookmark::Timestamp;
use crate::error::{Result, SyncError};
use crate::strategy::MergeStrategy;

/// Backend-specific connection settings, tagged by backend type on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum BackendConfig {
    /// A file in a GitHub repository, versioned by blob SHA.
    #[serde(rename_all = "camelCase")]
    Github {
        /// Repository owner (user or organization).
        owner: String,
        /// Repository name.
        repo: String,
        /// Branch to read and write; the backend default when empty.
        #[serde(default)]
        branch: String,
        /// Path of the snapshot file inside the repository.
        path: String,
        /// Personal access token.
        token: String,
    },
    /// A file on a WebDAV share, versioned by ETag or Last-Modified.
    #[serde(rename_all = "camelCase")]
    Webdav {
        /// Base URL of the WebDAV server.
        url: String,
        /// Login user name.
        username: String,
        /// Login password or app token.
        password: String,
        /// Path of the snapshot file on the share.
        path: String,
    },
    /// A dedicated HTTP API speaking the snapshot wire format directly.
    #[serde(rename_all = "camelCase")]
    Api {
        /// Endpoint URL.
        endpoint: String,
        /// Optional bearer token.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    /// A browser-extension bridge holding the snapshot in extension storage.
    #[serde(rename_all = "camelCase")]
    Browser {
        /// Identifier of the paired extension.
        extension_id: String,
    },
}

impl BackendConfig {
    /// Backend type name matching the wire tag.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Github { .. } => "github",
            BackendConfig::Webdav { .. } => "webdav",
            BackendConfig::Api { .. } => "api",
            BackendConfig::Browser { .. } => "browser",
        }
    }

    fn validate(&self) -> Result<()> {
        let complain = |what: &str| {
            Err(SyncError::Configuration(format!(
                "{} backend requires {what}",
                self.kind()
            )))
        };
        match self {
            BackendConfig::Github {
                owner, repo, path, token, ..
            } => {
                if owner.is_empty() || repo.is_empty() {
                    return complain("owner and repo");
                }
                if path.is_empty() {
                    return complain("a file path");
                }
                if token.is_empty() {
                    return complain("an access token");
                }
            }
            BackendConfig::Webdav { url, username, path, .. } => {
                Url::parse(url).map_err(|e| {
                    SyncError::Configuration(format!("invalid webdav url {url:?}: {e}"))
                })?;
                if username.is_empty() {
                    return complain("a username");
                }
                if path.is_empty() {
                    return complain("a file path");
                }
            }
            BackendConfig::Api { endpoint, .. } => {
                Url::parse(endpoint).map_err(|e| {
                    SyncError::Configuration(format!("invalid api endpoint {endpoint:?}: {e}"))
                })?;
            }
            BackendConfig::Browser { extension_id } => {
                if extension_id.is_empty() {
                    return complain("an extension id");
                }
            }
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

/// One configured sync service: a backend plus merge policy and the
/// bookkeeping timestamps the orchestrator maintains across cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SyncServiceConfig {
    /// Stable identifier, unique among registered services.
    pub id: String,
    /// Disabled services are skipped by every sync entry point.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Backend connection settings.
    pub backend: BackendConfig,
    /// Merge policy applied during this service's cycles.
    #[serde(default)]
    pub strategy: MergeStrategy,
    /// End time of the last successful cycle (ms). Zero before first sync.
    #[serde(default)]
    pub last_sync_timestamp: Timestamp,
    /// Validity horizon for the next merge (ms). Zero before first sync.
    #[serde(default)]
    pub last_data_change_timestamp: Timestamp,
    /// Remote revision confirmed by the last successful cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_version: Option<String>,
}

impl SyncServiceConfig {
    /// A new enabled service that has never synced.
    pub fn new(id: impl Into<String>, backend: BackendConfig) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            backend,
            strategy: MergeStrategy::default(),
            last_sync_timestamp: 0,
            last_data_change_timestamp: 0,
            remote_version: None,
        }
    }

    /// True if this service has never completed a cycle.
    pub fn is_first_sync(&self) -> bool {
        self.last_sync_timestamp == 0 && self.remote_version.is_none()
    }

    /// Reject configurations the orchestrator cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(SyncError::Configuration(
                "service id must not be empty".to_string(),
            ));
        }
        self.backend.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github_backend() -> BackendConfig {
        BackendConfig::Github {
            owner: "octocat".to_string(),
            repo: "bookmarks".to_string(),
            branch: "main".to_string(),
            path: "bookmarks.json".to_string(),
            token: "ghp_test".to_string(),
        }
    }

    #[test]
    fn test_backend_wire_tagging() {
        let json = serde_json::to_value(github_backend()).unwrap();
        assert_eq!(json["type"], "github");
        assert_eq!(json["owner"], "octocat");

        let parsed: BackendConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, github_backend());
        assert_eq!(parsed.kind(), "github");
    }

    #[test]
    fn test_service_defaults_on_deserialize() {
        let config: SyncServiceConfig = serde_json::from_value(serde_json::json!({
            "id": "gh",
            "backend": {"type": "browser", "extensionId": "abc"},
        }))
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.last_sync_timestamp, 0);
        assert!(config.is_first_sync());
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_incomplete_backends() {
        let empty_id = SyncServiceConfig::new("", github_backend());
        assert!(matches!(
            empty_id.validate(),
            Err(SyncError::Configuration(_))
        ));

        let bad_url = SyncServiceConfig::new(
            "dav",
            BackendConfig::Webdav {
                url: "not a url".to_string(),
                username: "me".to_string(),
                password: String::new(),
                path: "b.json".to_string(),
            },
        );
        assert!(matches!(bad_url.validate(), Err(SyncError::Configuration(_))));

        let no_token = SyncServiceConfig::new(
            "gh",
            BackendConfig::Github {
                owner: "o".to_string(),
                repo: "r".to_string(),
                branch: String::new(),
                path: "p.json".to_string(),
                token: String::new(),
            },
        );
        assert!(matches!(no_token.validate(), Err(SyncError::Configuration(_))));
    }

    #[test]
    fn test_first_sync_detection() {
        let mut config = SyncServiceConfig::new("gh", github_backend());
        assert!(config.is_first_sync());
        config.last_sync_timestamp = 1_700_000_000_000;
        config.remote_version = Some("1".to_string());
        assert!(!config.is_first_sync());
    }
}
