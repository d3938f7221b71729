//! # Library Artifacts
//!
//! A rebuild produces three files that must be read together:
//!
//! - the vector index (`library.index`, bincode)
//! - the embedding matrix (`library_embeddings.bin`, bincode)
//! - the aligned clean snapshot (`library_records.json`)
//!
//! Row `i` of the matrix, position `i` of the index and element `i` of the
//! aligned snapshot describe the same record. [`LibraryIndex::open`] refuses
//! to load a set whose lengths disagree.

use core_library::CleanRecord;
use core_runtime::config::RunLayout;
use core_sync::{write_atomic, write_json_atomic};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{IndexError, Result};
use crate::flat_index::{FlatL2Index, SearchHit};
use crate::matrix::EmbeddingMatrix;

/// Writes the three artifacts of a rebuild, index first and records last.
pub fn write_library(
    layout: &RunLayout,
    index: &FlatL2Index,
    matrix: &EmbeddingMatrix,
    records: &[CleanRecord],
) -> Result<()> {
    write_bincode(&layout.index_path(), index)?;
    write_bincode(&layout.matrix_path(), matrix)?;
    write_json_atomic(&layout.aligned_records_path(), records)?;

    debug!(
        rows = matrix.rows(),
        dimension = matrix.dimension(),
        "Wrote library artifacts"
    );
    Ok(())
}

fn write_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value)
        .map_err(|e| IndexError::Serialization(format!("{}: {}", path.display(), e)))?;
    write_atomic(path, &bytes)?;
    Ok(())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => IndexError::MissingArtifact {
            path: path.to_path_buf(),
        },
        _ => IndexError::CorruptArtifact {
            path: path.to_path_buf(),
            message: e.to_string(),
        },
    })
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read_bytes(path)?;
    bincode::deserialize(&bytes).map_err(|e| IndexError::CorruptArtifact {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn corrupt(path: &Path, message: &str) -> IndexError {
    IndexError::CorruptArtifact {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Loaded library ready for similarity search.
#[derive(Debug, Clone)]
pub struct LibraryIndex {
    records: Vec<CleanRecord>,
    matrix: EmbeddingMatrix,
    index: FlatL2Index,
}

impl LibraryIndex {
    /// Loads and cross-checks the artifacts of `layout`.
    ///
    /// # Errors
    ///
    /// - [`IndexError::MissingArtifact`] if any of the three files is absent
    /// - [`IndexError::CorruptArtifact`] if a file cannot be decoded
    /// - [`IndexError::IndexConsistency`] if record, matrix and index counts differ
    pub fn open(layout: &RunLayout) -> Result<Self> {
        let index_path = layout.index_path();
        let matrix_path = layout.matrix_path();
        let records_path = layout.aligned_records_path();

        let index: FlatL2Index = read_bincode(&index_path)?;
        if !index.is_well_formed() {
            return Err(corrupt(&index_path, "index shape is invalid"));
        }

        let matrix: EmbeddingMatrix = read_bincode(&matrix_path)?;
        if !matrix.is_well_formed() {
            return Err(corrupt(&matrix_path, "matrix shape is invalid"));
        }

        let records: Vec<CleanRecord> = serde_json::from_slice(&read_bytes(&records_path)?)
            .map_err(|e| corrupt(&records_path, &e.to_string()))?;

        Self::from_parts(records, matrix, index)
    }

    /// Assembles a library from in-memory parts with the same parity check
    /// as [`LibraryIndex::open`].
    pub fn from_parts(
        records: Vec<CleanRecord>,
        matrix: EmbeddingMatrix,
        index: FlatL2Index,
    ) -> Result<Self> {
        if records.len() != matrix.rows() || index.len() != matrix.rows() {
            return Err(IndexError::IndexConsistency {
                records: records.len(),
                matrix_rows: matrix.rows(),
                index_rows: index.len(),
            });
        }
        if !matrix.is_empty() && matrix.dimension() != index.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: index.dimension(),
                found: matrix.dimension(),
            });
        }

        info!(
            records = records.len(),
            dimension = index.dimension(),
            "Library loaded"
        );
        Ok(Self {
            records,
            matrix,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn records(&self) -> &[CleanRecord] {
        &self.records
    }

    pub fn record(&self, position: usize) -> Option<&CleanRecord> {
        self.records.get(position)
    }

    pub fn embedding(&self, position: usize) -> Option<&[f32]> {
        self.matrix.row(position)
    }

    /// Nearest `k` rows to `query`, ascending by squared L2 distance.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.index.search(query, k.min(self.index.len()))
    }
}
