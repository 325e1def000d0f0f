#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Sync adapter contract (backend capability interface)
pub mod adapter;

/// Bookmark data model
pub mod bookmark;

/// Sync service configuration
pub mod config;

/// Error (common error types)
pub mod error;

/// Sync lifecycle events and subscriptions
pub mod events;

/// Merge engine (three-way, field-level)
pub mod merge;

/// Serialized snapshot wire format
pub mod snapshot;

/// Local bookmark store contract
pub mod store;

/// Merge strategy descriptors
pub mod strategy;

/// Synchronization orchestrator
pub mod sync;
