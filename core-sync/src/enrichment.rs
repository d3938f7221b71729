//! Edition enrichment of new and changed records.
//!
//! Each record is looked up by its primary edition id. A successful lookup
//! merges subjects, summary and contributors and stamps the record with its
//! content fingerprint. A lookup that resolves to absent leaves the record
//! without a fingerprint so the next pass looks it up again.

use core_library::CatalogRecord;
use core_metadata::{EditionMetadataSource, MetadataError};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::fetcher::BoundedFetcher;

/// Records after enrichment plus per-pass counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentOutcome {
    /// Every submitted record, in submission order
    pub records: Vec<CatalogRecord>,
    pub enriched: usize,
    pub failed: usize,
    /// Records with no edition to look up; fingerprinted without a fetch
    pub skipped_no_edition: usize,
}

pub struct EditionEnricher {
    source: Arc<dyn EditionMetadataSource>,
    fetcher: BoundedFetcher,
}

impl EditionEnricher {
    pub fn new(source: Arc<dyn EditionMetadataSource>, fetcher: BoundedFetcher) -> Self {
        Self { source, fetcher }
    }

    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn enrich(&self, records: Vec<CatalogRecord>) -> Result<EnrichmentOutcome> {
        let mut outcome = EnrichmentOutcome::default();
        let mut lookups: Vec<(usize, String)> = Vec::new();
        let mut working = Vec::with_capacity(records.len());

        for mut record in records {
            record.content_fingerprint = None;
            match record.primary_edition_id().map(str::to_string) {
                Some(edition_id) => lookups.push((working.len(), edition_id)),
                None => {
                    debug!(id = %record.id, "No edition id, skipping enrichment");
                    record.mark_fingerprinted()?;
                    outcome.skipped_no_edition += 1;
                }
            }
            working.push(record);
        }

        let source = &self.source;
        let report = self
            .fetcher
            .fetch_all(
                lookups.iter().map(|(_, edition_id)| edition_id.clone()).collect(),
                |edition_id: String| async move { source.fetch_edition(&edition_id).await },
                MetadataError::is_retryable,
            )
            .await;

        // Merge by position in `working`, never by completion order
        for ((position, _), enrichment) in lookups.into_iter().zip(report.into_values()) {
            let record = &mut working[position];
            match enrichment {
                Some(enrichment) => {
                    record.apply_enrichment(enrichment);
                    record.mark_fingerprinted()?;
                    outcome.enriched += 1;
                }
                None => outcome.failed += 1,
            }
        }

        info!(
            enriched = outcome.enriched,
            failed = outcome.failed,
            skipped_no_edition = outcome.skipped_no_edition,
            "Enrichment complete"
        );

        outcome.records = working;
        Ok(outcome)
    }
}
