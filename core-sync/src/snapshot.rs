//! Canonical snapshot input.
//!
//! The snapshot is produced by the ingestion layer as a JSON array of raw
//! records. Each element is validated separately so one malformed record does
//! not discard the whole snapshot.

use core_library::SnapshotRecord;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, SyncError};

/// Provider of the canonical snapshot for a sync pass.
pub trait SnapshotSource: Send + Sync {
    /// # Errors
    ///
    /// [`SyncError::MissingSnapshot`] when there is no snapshot to sync from.
    fn load_snapshot(&self) -> Result<Vec<SnapshotRecord>>;
}

/// Snapshot read from a JSON file.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for FileSnapshotSource {
    fn load_snapshot(&self) -> Result<Vec<SnapshotRecord>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SyncError::MissingSnapshot {
                    path: self.path.clone(),
                })
            }
            Err(e) => return Err(SyncError::io(&self.path, e)),
        };

        let raw: Vec<Value> =
            serde_json::from_slice(&bytes).map_err(|e| SyncError::InvalidSnapshot {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        let total = raw.len();
        let records: Vec<SnapshotRecord> = raw
            .into_iter()
            .enumerate()
            .filter_map(|(position, value)| {
                serde_json::from_value::<SnapshotRecord>(value)
                    .map_err(|e| warn!(position, error = %e, "Skipping malformed snapshot record"))
                    .ok()
            })
            .collect();

        debug!(
            path = %self.path.display(),
            total,
            accepted = records.len(),
            "Loaded snapshot"
        );
        Ok(records)
    }
}
