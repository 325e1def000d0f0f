//! Synchronization orchestration.
//!
//! [`SyncPhase`] names the states a service's cycle moves through;
//! [`orchestrator::SyncOrchestrator`] drives the cycles.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub mod orchestrator;

pub use orchestrator::{AdapterFactory, SyncOrchestrator};

/// Phase of a service's sync cycle.
///
/// A cycle moves `idle → checking → downloading → merging → uploading`
/// followed by exactly one terminal phase (`success`, `conflict` or `error`),
/// then returns to `idle`. `disabled` is reported instead of a cycle when the
/// service is switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum SyncPhase {
    /// No cycle in flight.
    #[default]
    Idle,
    /// Service is switched off.
    Disabled,
    /// Probing the remote revision.
    Checking,
    /// Fetching the remote snapshot body.
    Downloading,
    /// Running the merge engine.
    Merging,
    /// Writing the merged snapshot to the remote.
    Uploading,
    /// Cycle converged both sides.
    Success,
    /// Cycle stopped on a concurrent remote modification.
    Conflict,
    /// Cycle failed.
    Error,
}

impl SyncPhase {
    /// True for the phases a cycle can end in.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncPhase::Success | SyncPhase::Conflict | SyncPhase::Error
        )
    }

    /// True while a cycle is actively running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncPhase::Checking | SyncPhase::Downloading | SyncPhase::Merging | SyncPhase::Uploading
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(serde_json::to_string(&SyncPhase::Idle).unwrap(), r#""idle""#);
        assert_eq!(
            serde_json::to_string(&SyncPhase::Downloading).unwrap(),
            r#""downloading""#
        );
        let parsed: SyncPhase = serde_json::from_str(r#""conflict""#).unwrap();
        assert_eq!(parsed, SyncPhase::Conflict);
    }

    #[test]
    fn test_phase_classification() {
        assert!(SyncPhase::Success.is_terminal());
        assert!(SyncPhase::Error.is_terminal());
        assert!(!SyncPhase::Merging.is_terminal());
        assert!(SyncPhase::Merging.is_active());
        assert!(!SyncPhase::Idle.is_active());
        assert!(!SyncPhase::Disabled.is_active());
    }
}
