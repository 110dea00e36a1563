//! Controller snapshots.
//!
//! A snapshot records a controller's configuration, its active flags in both
//! scopes and the opaque blob each active state chose to save. Behavior does
//! not serialize: restoring rebuilds states through the controller's factory
//! and hands each one its blob.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod error;

pub use error::SnapshotError;

/// Version identifier for the snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable capture of a controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "P: Serialize", deserialize = "P: DeserializeOwned"))]
pub struct ControllerSnapshot<P> {
    /// Snapshot format version
    pub version: u32,

    /// Unique snapshot identifier
    #[serde(default)]
    pub id: String,

    /// When the snapshot was taken
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub cache_enabled: bool,

    #[serde(default)]
    pub stack_enabled: bool,

    #[serde(default = "default_stack_size")]
    pub max_stack_size: usize,

    #[serde(default)]
    pub locked_events: Vec<i32>,

    #[serde(default)]
    pub share_param: Option<P>,

    #[serde(default)]
    pub current_flags: u32,

    #[serde(default)]
    pub global_flags: u32,

    /// Saved blobs of active current states, keyed by flag
    #[serde(default)]
    pub current_saves: BTreeMap<u32, Vec<u8>>,

    /// Saved blobs of active global states, keyed by flag
    #[serde(default)]
    pub global_saves: BTreeMap<u32, Vec<u8>>,
}

fn default_stack_size() -> usize {
    crate::core::DEFAULT_MAX_STACK_SIZE
}

impl<P> ControllerSnapshot<P> {
    fn check_version(self) -> Result<Self, SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                supported: SNAPSHOT_VERSION,
            });
        }
        Ok(self)
    }
}

impl<P: Serialize + DeserializeOwned> ControllerSnapshot<P> {
    /// Encode as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        snapshot.check_version()
    }

    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = bincode::deserialize(bytes)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        snapshot.check_version()
    }
}
