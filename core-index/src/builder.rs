//! # Embedding Index Builder
//!
//! Runs one embedding pass over the persisted working set.
//!
//! ## Workflow
//!
//! 1. Embed every record that has no usable embedding yet. Successes are
//!    stored on the record and raise the rebuild flag; records whose
//!    attempts are exhausted stay pending for a later pass. The state is saved
//!    before any rebuild starts.
//! 2. If the rebuild flag is set, stack the embeddings of all embedded records
//!    in id order into a fresh matrix and index, write the three library
//!    artifacts, and only then clear the flag.
//!
//! With zero embedded records the rebuild is skipped, the flag stays set and
//! the existing artifacts are left as they are.

use chrono::Utc;
use core_library::text::render_embedding_text;
use core_library::{CatalogRecord, CleanRecord};
use core_metadata::{MetadataError, TextEmbedder};
use core_runtime::config::RunLayout;
use core_runtime::events::{CoreEvent, EventBus, IndexEvent};
use core_sync::{BoundedFetcher, StateStore};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::artifacts::write_library;
use crate::error::Result;
use crate::matrix::EmbeddingMatrix;

/// Counters reported by one embedding pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingSummary {
    pub pass_id: String,
    /// Records embedded this pass
    pub embedded: usize,
    /// Records whose embedding resolved to absent this pass
    pub skipped: usize,
    /// Whether the library artifacts were rewritten
    pub rebuilt: bool,
    /// Rows in the rebuilt index
    pub index_rows: Option<usize>,
    /// Flag left in the persisted state after the pass
    pub needs_index_rebuild: bool,
}

pub struct EmbeddingIndexBuilder {
    state_store: Arc<dyn StateStore>,
    embedder: Arc<dyn TextEmbedder>,
    fetcher: BoundedFetcher,
    layout: RunLayout,
    event_bus: Option<EventBus>,
}

impl EmbeddingIndexBuilder {
    pub fn new(
        state_store: Arc<dyn StateStore>,
        embedder: Arc<dyn TextEmbedder>,
        fetcher: BoundedFetcher,
        layout: RunLayout,
    ) -> Self {
        Self {
            state_store,
            embedder,
            fetcher,
            layout,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Runs one embedding pass.
    ///
    /// # Errors
    ///
    /// Fails when the state cannot be loaded or saved, when embeddings of
    /// different dimensions are found at rebuild time, or when an artifact
    /// cannot be written. Per-record embedding failures are not errors.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<EmbeddingSummary> {
        let pass_id = Uuid::new_v4().to_string();

        match self.execute(&pass_id).await {
            Ok(summary) => {
                self.emit(IndexEvent::Completed {
                    pass_id: pass_id.clone(),
                    embedded: summary.embedded as u64,
                    skipped: summary.skipped as u64,
                    rebuilt: summary.rebuilt,
                    index_rows: summary.index_rows.map(|rows| rows as u64),
                });
                info!(
                    pass_id = %pass_id,
                    embedded = summary.embedded,
                    skipped = summary.skipped,
                    rebuilt = summary.rebuilt,
                    "Embedding pass completed"
                );
                Ok(summary)
            }
            Err(e) => {
                warn!(pass_id = %pass_id, error = %e, "Embedding pass failed");
                self.emit(IndexEvent::Failed {
                    pass_id,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn execute(&self, pass_id: &str) -> Result<EmbeddingSummary> {
        let mut state = self.state_store.load()?;

        let pending: Vec<usize> = state
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| !record.has_embedding())
            .map(|(position, _)| position)
            .collect();

        self.emit(IndexEvent::Started {
            pass_id: pass_id.to_string(),
            pending: pending.len() as u64,
        });

        // Step 1: embed what is missing
        let (embedded, skipped) = if pending.is_empty() {
            (0, 0)
        } else {
            info!("Embedding {} records", pending.len());
            let texts: Vec<String> = pending
                .iter()
                .map(|&position| render_embedding_text(&state.records[position]))
                .collect();

            let embedder = &self.embedder;
            let report = self
                .fetcher
                .fetch_all(
                    texts,
                    |text: String| async move { embedder.embed(&text).await },
                    MetadataError::is_retryable,
                )
                .await;

            let mut embedded = 0;
            let mut skipped = 0;
            for (position, vector) in pending.iter().zip(report.into_values()) {
                match vector {
                    Some(vector) => {
                        state.records[*position].set_embedding(vector);
                        embedded += 1;
                    }
                    None => skipped += 1,
                }
            }

            if embedded > 0 {
                state.needs_index_rebuild = true;
            }
            self.state_store.save(&state)?;
            self.progress(pass_id, "embed", embedded + skipped, pending.len());
            (embedded, skipped)
        };

        // Step 2: rebuild if flagged
        let mut index_rows = None;
        if state.needs_index_rebuild {
            let mut library: Vec<&CatalogRecord> =
                state.records.iter().filter(|r| r.has_embedding()).collect();
            library.sort_by(|a, b| a.id.cmp(&b.id));

            if library.is_empty() {
                let reason = "no embedded records".to_string();
                warn!(pass_id, "Index rebuild skipped: {}", reason);
                self.emit(IndexEvent::RebuildSkipped {
                    pass_id: pass_id.to_string(),
                    reason,
                });
            } else {
                info!("Rebuilding index from {} records", library.len());
                let matrix = EmbeddingMatrix::from_rows(
                    library
                        .iter()
                        .filter_map(|record| record.embedding.as_deref()),
                )?;
                let index = matrix.to_index()?;
                let aligned: Vec<CleanRecord> =
                    library.iter().map(|record| CleanRecord::from(*record)).collect();

                write_library(&self.layout, &index, &matrix, &aligned)?;
                index_rows = Some(matrix.rows());

                state.needs_index_rebuild = false;
                state.last_rebuild_at = Some(Utc::now());
                self.state_store.save(&state)?;
                self.progress(pass_id, "rebuild", matrix.rows(), matrix.rows());
            }
        }

        Ok(EmbeddingSummary {
            pass_id: pass_id.to_string(),
            embedded,
            skipped,
            rebuilt: index_rows.is_some(),
            index_rows,
            needs_index_rebuild: state.needs_index_rebuild,
        })
    }

    fn progress(&self, pass_id: &str, phase: &str, processed: usize, total: usize) {
        self.emit(IndexEvent::Progress {
            pass_id: pass_id.to_string(),
            phase: phase.to_string(),
            items_processed: processed as u64,
            total_items: Some(total as u64),
        });
    }

    fn emit(&self, event: IndexEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Index(event)).ok();
        }
    }
}
