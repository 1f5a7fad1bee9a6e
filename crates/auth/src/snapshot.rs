//! Persisted form of a grant store: a versioned JSON document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{GrantRecord, GrantStore, GrantStoreError};

/// Current snapshot schema version.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot schema version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] GrantStoreError),
}

/// Flat, serializable copy of every grant in a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSnapshot {
    pub schema_version: u32,
    pub taken_at: DateTime<Utc>,
    pub grants: Vec<GrantRecord>,
}

#[derive(Deserialize)]
struct VersionProbe {
    schema_version: u32,
}

impl GrantSnapshot {
    pub fn empty(taken_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            taken_at,
            grants: Vec::new(),
        }
    }

    pub fn capture<S>(store: &S, taken_at: DateTime<Utc>) -> Result<Self, SnapshotError>
    where
        S: GrantStore + ?Sized,
    {
        Ok(Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            taken_at,
            grants: store.all()?,
        })
    }

    /// Replace the store's contents with this snapshot.
    ///
    /// Duplicate keys inside the document collapse to their first occurrence.
    /// Returns the number of records loaded.
    pub fn restore_into<S>(self, store: &S) -> Result<usize, SnapshotError>
    where
        S: GrantStore + ?Sized,
    {
        store.reset()?;
        let loaded = store.insert_batch(self.grants)?;
        tracing::debug!(loaded, taken_at = %self.taken_at, "grant snapshot restored");
        Ok(loaded)
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot, checking the schema version before the body.
    pub fn from_json(input: &str) -> Result<Self, SnapshotError> {
        let probe: VersionProbe = serde_json::from_str(input)?;
        if probe.schema_version == 0 || probe.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: probe.schema_version,
                supported: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        Ok(serde_json::from_str(input)?)
    }
}
