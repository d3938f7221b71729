//! Candidate retrieval for the recommendation query path.
//!
//! The patron's query is embedded, normalised and matched against the loaded
//! library. Hits are then scored and trimmed before they are handed to the
//! synthesis step, which lives outside this crate.

use core_metadata::TextEmbedder;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::artifacts::LibraryIndex;
use crate::error::{IndexError, Result};
use crate::flat_index::normalize;

/// Nearest neighbours fetched from the index.
pub const DEFAULT_K: usize = 50;
/// Candidates kept after scoring.
pub const DEFAULT_MAX_ITEMS: usize = 15;
/// Score bonus for candidates that carry a summary.
pub const SUMMARY_BONUS: f32 = 0.1;

/// A scored library record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub id: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub material: Option<String>,
    pub year: Option<String>,
    pub summary: Option<String>,
    pub subjects: Option<String>,
    pub contributors: Vec<String>,
    pub distance: f32,
    pub score: f32,
}

pub struct LibrarySearch {
    library: Arc<LibraryIndex>,
    embedder: Arc<dyn TextEmbedder>,
}

impl LibrarySearch {
    pub fn new(library: Arc<LibraryIndex>, embedder: Arc<dyn TextEmbedder>) -> Self {
        Self { library, embedder }
    }

    pub fn library(&self) -> &LibraryIndex {
        &self.library
    }

    /// Returns at most `max_items` candidates for `query`, best first.
    ///
    /// # Errors
    ///
    /// [`IndexError::EmptyQuery`] for blank input, [`IndexError::Embedding`]
    /// when the query cannot be embedded, and
    /// [`IndexError::DimensionMismatch`] when the query vector does not fit
    /// the index.
    #[instrument(skip(self), level = "debug")]
    pub async fn candidates(
        &self,
        query: &str,
        k: usize,
        max_items: usize,
    ) -> Result<Vec<Candidate>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(IndexError::EmptyQuery);
        }

        let mut vector = self.embedder.embed(query).await?;
        normalize(&mut vector);

        let hits = self.library.search(&vector, k)?;
        let candidates: Vec<Candidate> = hits
            .into_iter()
            .filter_map(|hit| {
                let record = self.library.record(hit.position)?;
                Some(Candidate {
                    id: record.id.clone(),
                    title: record.title.clone(),
                    author: record.author.clone(),
                    material: record.materials.first().and_then(|m| m.name.clone()),
                    year: record.publication_date.clone(),
                    summary: record.summary.clone(),
                    subjects: record.subjects.clone(),
                    contributors: record.contributors.clone(),
                    distance: hit.distance,
                    score: 0.0,
                })
            })
            .collect();

        debug!(hits = candidates.len(), "Scoring candidates");
        Ok(prefilter(candidates, max_items))
    }
}

/// Scores candidates and keeps the best `max_items`.
///
/// `score = 1 / (1 + distance)`, plus [`SUMMARY_BONUS`] when a summary is
/// present. Input is expected in ascending distance order; equal scores keep
/// that order.
pub fn prefilter(mut candidates: Vec<Candidate>, max_items: usize) -> Vec<Candidate> {
    for candidate in &mut candidates {
        let has_summary = candidate
            .summary
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        candidate.score =
            1.0 / (1.0 + candidate.distance) + if has_summary { SUMMARY_BONUS } else { 0.0 };
    }

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(max_items);
    candidates
}
