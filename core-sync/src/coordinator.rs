//! # Sync Coordinator
//!
//! Drives one incremental sync pass over the catalog mirror.
//!
//! ## Workflow
//!
//! 1. Load the canonical snapshot from the [`SnapshotSource`]
//! 2. Load the persisted `SyncState` from the [`StateStore`]
//! 3. Diff the snapshot against stored records by content fingerprint
//! 4. Enrich new and changed records with edition metadata
//! 5. Assemble unchanged + enriched records (removed ids fall away) sorted by id
//! 6. Raise the index-rebuild flag if anything was added, changed or removed
//! 7. Persist state, then write the clean catalog snapshot
//!
//! A pass that fails before step 7 leaves the persisted state untouched.
//! Records whose enrichment never landed carry no fingerprint and are picked
//! up again by the next pass, which is also how an interrupted pass recovers.
//! When such a retry fails again and the source fields have not moved, the
//! stored copy is kept as it was (embedding included) and the pass does not
//! count it as a change.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncCoordinator;
//!
//! # async fn example(coordinator: SyncCoordinator) -> core_sync::Result<()> {
//! let summary = coordinator.run_pass().await?;
//! println!("{} new, {} changed", summary.new, summary.changed);
//! # Ok(())
//! # }
//! ```

use chrono::Utc;
use core_library::CatalogRecord;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::differ::diff_records;
use crate::enrichment::EditionEnricher;
use crate::persist::write_json_atomic;
use crate::snapshot::SnapshotSource;
use crate::state_store::StateStore;
use crate::{Result, SyncError};

/// Counters reported by one sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub pass_id: String,
    pub new: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// Unenriched records looked up again with unchanged source fields
    pub retried: usize,
    /// Snapshot entries ignored for a missing or repeated id
    pub dropped: usize,
    /// New or changed records whose enrichment resolved to absent
    pub enrichment_failed: usize,
    pub needs_index_rebuild: bool,
    /// Records in the persisted state after the pass
    pub total_records: usize,
}

/// Orchestrates sync passes over one run directory.
///
/// Assumes it is the only writer of that directory.
pub struct SyncCoordinator {
    snapshot_source: Arc<dyn SnapshotSource>,
    state_store: Arc<dyn StateStore>,
    enricher: EditionEnricher,
    clean_catalog_path: PathBuf,
    event_bus: Option<EventBus>,
}

impl SyncCoordinator {
    pub fn new(
        snapshot_source: Arc<dyn SnapshotSource>,
        state_store: Arc<dyn StateStore>,
        enricher: EditionEnricher,
        clean_catalog_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            snapshot_source,
            state_store,
            enricher,
            clean_catalog_path: clean_catalog_path.into(),
            event_bus: None,
        }
    }

    /// Publishes pass progress on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn clean_catalog_path(&self) -> &Path {
        &self.clean_catalog_path
    }

    /// Runs one sync pass.
    ///
    /// # Errors
    ///
    /// - [`SyncError::MissingSnapshot`] / [`SyncError::InvalidSnapshot`] when
    ///   there is nothing usable to sync from
    /// - [`SyncError::StateCorruption`] when the stored state cannot be read
    /// - [`SyncError::Io`] when persisting fails
    ///
    /// Per-record network failures are not errors; they show up in
    /// [`SyncSummary::enrichment_failed`].
    #[instrument(skip(self))]
    pub async fn run_pass(&self) -> Result<SyncSummary> {
        let pass_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        self.emit(SyncEvent::Started {
            pass_id: pass_id.clone(),
        });

        match self.execute(&pass_id).await {
            Ok(summary) => {
                self.emit(SyncEvent::Completed {
                    pass_id: pass_id.clone(),
                    new: summary.new as u64,
                    changed: summary.changed as u64,
                    unchanged: summary.unchanged as u64,
                    removed: summary.removed as u64,
                    enrichment_failed: summary.enrichment_failed as u64,
                    needs_index_rebuild: summary.needs_index_rebuild,
                    duration_ms: started.elapsed().as_millis() as u64,
                });

                info!(
                    pass_id = %pass_id,
                    new = summary.new,
                    changed = summary.changed,
                    unchanged = summary.unchanged,
                    removed = summary.removed,
                    enrichment_failed = summary.enrichment_failed,
                    needs_index_rebuild = summary.needs_index_rebuild,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Sync pass completed"
                );
                Ok(summary)
            }
            Err(e) => {
                warn!(pass_id = %pass_id, error = %e, "Sync pass failed");
                self.emit(SyncEvent::Failed {
                    pass_id,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn execute(&self, pass_id: &str) -> Result<SyncSummary> {
        info!("Phase 1: Loading snapshot and state");
        let snapshot = self.snapshot_source.load_snapshot()?;
        let mut state = self.state_store.load()?;

        info!("Phase 2: Diffing {} snapshot records", snapshot.len());
        let diff = diff_records(snapshot, &state.records)?;
        self.progress(pass_id, "diff", diff.pending_count(), None);

        let new_count = diff.new_records.len();
        let mut changed_count = diff.changed_records.len();
        let mut unchanged_count = diff.unchanged_records.len();
        let removed_count = diff.removed_ids.len();
        let retried_count = diff.retry_records.len();

        // Retries go last so their outcomes sit at the tail of the enrichment
        let mut pending: Vec<CatalogRecord> = diff
            .new_records
            .into_iter()
            .chain(diff.changed_records)
            .map(|record| record.into_record())
            .collect::<std::result::Result<_, _>>()?;
        let retry_start = pending.len();
        pending.extend(diff.retry_records);

        info!("Phase 3: Enriching {} new/changed records", pending.len());
        let total_pending = pending.len() as u64;
        let enrichment = self.enricher.enrich(pending).await?;
        self.progress(
            pass_id,
            "enrich",
            enrichment.records.len(),
            Some(total_pending),
        );

        // A retry that landed is a content change; one that failed again is
        // the stored copy untouched
        let recovered = enrichment.records[retry_start..]
            .iter()
            .filter(|record| record.content_fingerprint.is_some())
            .count();
        changed_count += recovered;
        unchanged_count += retried_count - recovered;
        let has_changes = new_count > 0 || changed_count > 0 || removed_count > 0;

        info!("Phase 4: Persisting state");
        let mut records = diff.unchanged_records;
        records.extend(enrichment.records);

        state.records = records;
        state.sort_records();
        state.needs_index_rebuild |= has_changes;
        state.last_sync_at = Some(Utc::now());
        state.validate().map_err(SyncError::from)?;

        self.state_store.save(&state)?;
        write_json_atomic(&self.clean_catalog_path, &state.clean_records())?;
        self.progress(pass_id, "persist", state.records.len(), None);

        Ok(SyncSummary {
            pass_id: pass_id.to_string(),
            new: new_count,
            changed: changed_count,
            unchanged: unchanged_count,
            removed: removed_count,
            retried: retried_count,
            dropped: diff.dropped,
            enrichment_failed: enrichment.failed,
            needs_index_rebuild: state.needs_index_rebuild,
            total_records: state.records.len(),
        })
    }

    fn progress(&self, pass_id: &str, phase: &str, processed: usize, total: Option<u64>) {
        self.emit(SyncEvent::Progress {
            pass_id: pass_id.to_string(),
            phase: phase.to_string(),
            items_processed: processed as u64,
            total_items: total,
        });
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Sync(event)).ok();
        }
    }
}
