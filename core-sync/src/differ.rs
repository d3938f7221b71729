//! Snapshot differ.
//!
//! Classifies the records of a fresh snapshot against the stored working set
//! by content fingerprint.

use core_library::{CatalogRecord, SnapshotRecord};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::Result;

/// Classification of one snapshot against stored state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
    /// Ids never seen before
    pub new_records: Vec<SnapshotRecord>,
    /// Ids already stored whose fingerprint differs (or was never recorded)
    pub changed_records: Vec<SnapshotRecord>,
    /// Stored copies of records whose fingerprint matches
    pub unchanged_records: Vec<CatalogRecord>,
    /// Stored copies whose enrichment never landed but whose source fields
    /// still match the snapshot; enrichment is retried on these copies
    pub retry_records: Vec<CatalogRecord>,
    /// Stored ids absent from the snapshot, sorted
    pub removed_ids: Vec<String>,
    /// Snapshot entries ignored because they had no id or repeated one
    pub dropped: usize,
}

impl DiffResult {
    /// Whether anything new, changed or removed was found.
    ///
    /// Retried records do not count; their source content is unchanged.
    pub fn has_changes(&self) -> bool {
        !self.new_records.is_empty() || !self.changed_records.is_empty() || !self.removed_ids.is_empty()
    }

    /// Records that need enrichment this pass.
    pub fn pending_count(&self) -> usize {
        self.new_records.len() + self.changed_records.len() + self.retry_records.len()
    }
}

/// Diffs `snapshot` against `stored`.
///
/// A stored record without a fingerprint is picked up again: as a retry when
/// its source fields still match the snapshot, as changed otherwise.
pub fn diff_records(snapshot: Vec<SnapshotRecord>, stored: &[CatalogRecord]) -> Result<DiffResult> {
    let stored_by_id: HashMap<&str, &CatalogRecord> =
        stored.iter().map(|record| (record.id.as_str(), record)).collect();

    let mut result = DiffResult::default();
    let mut seen: HashSet<String> = HashSet::with_capacity(snapshot.len());

    for record in snapshot {
        let Some(id) = record.record_id().map(str::to_string) else {
            warn!(title = ?record.title, "Dropping snapshot record without an id");
            result.dropped += 1;
            continue;
        };

        if !seen.insert(id.clone()) {
            warn!(id = %id, "Dropping duplicate snapshot record");
            result.dropped += 1;
            continue;
        }

        let fingerprint = record.fingerprint()?;

        match stored_by_id.get(id.as_str()) {
            None => result.new_records.push(record),
            Some(existing) if existing.content_fingerprint.as_deref() == Some(fingerprint.as_str()) => {
                result.unchanged_records.push((*existing).clone());
            }
            Some(existing)
                if existing.content_fingerprint.is_none()
                    && existing.source_fingerprint()? == fingerprint =>
            {
                result.retry_records.push((*existing).clone());
            }
            Some(_) => result.changed_records.push(record),
        }
    }

    let mut removed_ids: Vec<String> = stored_by_id
        .keys()
        .filter(|id| !seen.contains(**id))
        .map(|id| id.to_string())
        .collect();
    removed_ids.sort();
    result.removed_ids = removed_ids;

    debug!(
        new = result.new_records.len(),
        changed = result.changed_records.len(),
        unchanged = result.unchanged_records.len(),
        retry = result.retry_records.len(),
        removed = result.removed_ids.len(),
        dropped = result.dropped,
        "Diff complete"
    );

    Ok(result)
}
