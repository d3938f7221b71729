//! Durable storage for the sync working set.

use core_library::SyncState;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::persist::write_json_atomic;

/// Load/save of the [`SyncState`] between runs.
pub trait StateStore: Send + Sync {
    /// Returns the persisted state, or an empty state when none exists yet.
    ///
    /// # Errors
    ///
    /// [`SyncError::StateCorruption`] when a state exists but cannot be read
    /// back. No attempt is made to recover from it.
    fn load(&self) -> Result<SyncState>;

    /// Replaces the persisted state. A crash mid-save leaves the previous
    /// state intact.
    fn save(&self, state: &SyncState) -> Result<()>;
}

/// JSON state file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corruption(&self, message: impl Into<String>) -> SyncError {
        SyncError::StateCorruption {
            path: self.path.clone(),
            message: message.into(),
        }
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<SyncState> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No state file, starting empty");
                return Ok(SyncState::default());
            }
            Err(e) => return Err(SyncError::io(&self.path, e)),
        };

        let state: SyncState =
            serde_json::from_slice(&bytes).map_err(|e| self.corruption(e.to_string()))?;
        state
            .validate()
            .map_err(|e| self.corruption(e.to_string()))?;

        debug!(
            path = %self.path.display(),
            records = state.records.len(),
            needs_index_rebuild = state.needs_index_rebuild,
            "Loaded state"
        );
        Ok(state)
    }

    fn save(&self, state: &SyncState) -> Result<()> {
        write_json_atomic(&self.path, state)?;
        debug!(
            path = %self.path.display(),
            records = state.records.len(),
            needs_index_rebuild = state.needs_index_rebuild,
            "Saved state"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::SnapshotRecord;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(id: &str) -> core_library::CatalogRecord {
        let snapshot: SnapshotRecord = serde_json::from_value(json!({"id": id})).unwrap();
        snapshot.into_record().unwrap()
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonStateStore::new(dir.path().join("catalog_state.json"));

        let state = store.load().unwrap();
        assert!(state.records.is_empty());
        assert!(!state.needs_index_rebuild);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonStateStore::new(dir.path().join("catalog_state.json"));

        let mut state = SyncState::default();
        state.records.push(record("a"));
        state.needs_index_rebuild = true;
        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn test_unparseable_state_is_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog_state.json");
        fs::write(&path, "{\"records\": [").unwrap();

        let result = JsonStateStore::new(&path).load();
        assert!(matches!(result, Err(SyncError::StateCorruption { .. })));
    }

    #[test]
    fn test_duplicate_ids_are_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog_state.json");
        let state = SyncState {
            records: vec![record("a"), record("a")],
            ..Default::default()
        };
        fs::write(&path, serde_json::to_vec(&state).unwrap()).unwrap();

        let result = JsonStateStore::new(&path).load();
        assert!(matches!(result, Err(SyncError::StateCorruption { .. })));
    }
}
