//! Merge strategy descriptors.
//!
//! A [`MergeStrategy`] is created once per sync service and is immutable
//! during a sync attempt. Strategies control how tags and metadata are
//! combined when both sides of a merge have been touched since the last sync.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::bookmark::Timestamp;

/// How to combine the tag sets of two touched entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum TagStrategy {
    /// Take the local side's tags outright.
    Local,
    /// Take the remote side's tags outright.
    Remote,
    /// Take the side with the greater `updated`; ties favor local.
    Newer,
    /// Set union of both sides, preserving discovery order.
    #[default]
    Union,
}

/// How to combine the metadata of two touched entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum MetaStrategy {
    /// Take the local side's metadata outright.
    Local,
    /// Take the remote side's metadata outright.
    Remote,
    /// Take the side with the greater `updated`; ties favor local.
    Newer,
    /// Overlay the newer side's fields onto the older side's: newer wins on
    /// key collision, older contributes keys absent from newer.
    #[default]
    Merge,
}

impl FromStr for TagStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(TagStrategy::Local),
            "remote" => Ok(TagStrategy::Remote),
            "newer" => Ok(TagStrategy::Newer),
            "union" => Ok(TagStrategy::Union),
            _ => Err(()),
        }
    }
}

impl FromStr for MetaStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(MetaStrategy::Local),
            "remote" => Ok(MetaStrategy::Remote),
            "newer" => Ok(MetaStrategy::Newer),
            "merge" => Ok(MetaStrategy::Merge),
            _ => Err(()),
        }
    }
}

/// Per-service merge strategy descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct MergeStrategy {
    /// Tag combination rule.
    #[serde(default)]
    pub tags: TagStrategy,

    /// Metadata combination rule.
    #[serde(default)]
    pub meta: MetaStrategy,

    /// Fallback date substituted for invalid `created` timestamps.
    #[serde(default)]
    pub default_date: Timestamp,

    /// Finalize merged `created` to the older of both sides (on by default).
    #[serde(default = "default_true")]
    pub prefer_oldest_created: bool,

    /// Finalize merged `updated`/`updated2` to the newer of both sides
    /// (on by default).
    #[serde(default = "default_true")]
    pub prefer_newest_updated: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MergeStrategy {
    fn default() -> Self {
        Self::new(0)
    }
}

impl MergeStrategy {
    /// Create the default strategy (tag union, meta merge) with the given
    /// fallback date for invalid timestamps.
    pub fn new(default_date: Timestamp) -> Self {
        Self {
            tags: TagStrategy::default(),
            meta: MetaStrategy::default(),
            default_date,
            prefer_oldest_created: true,
            prefer_newest_updated: true,
        }
    }

    /// Replace the tag rule.
    pub fn with_tags(mut self, tags: TagStrategy) -> Self {
        self.tags = tags;
        self
    }

    /// Replace the metadata rule.
    pub fn with_meta(mut self, meta: MetaStrategy) -> Self {
        self.meta = meta;
        self
    }

    /// The same strategy with the local/remote roles of its directional
    /// rules swapped. Non-directional rules are unchanged.
    pub fn mirrored(&self) -> Self {
        let mut out = self.clone();
        out.tags = match self.tags {
            TagStrategy::Local => TagStrategy::Remote,
            TagStrategy::Remote => TagStrategy::Local,
            other => other,
        };
        out.meta = match self.meta {
            MetaStrategy::Local => MetaStrategy::Remote,
            MetaStrategy::Remote => MetaStrategy::Local,
            other => other,
        };
        out
    }
}
