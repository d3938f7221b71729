use core_library::LibraryError;
use core_metadata::MetadataError;
use core_sync::SyncError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Vector dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Index dimension must be greater than zero")]
    ZeroDimension,

    #[error("Library artifacts are inconsistent: {records} records, {matrix_rows} matrix rows, {index_rows} index rows")]
    IndexConsistency {
        records: usize,
        matrix_rows: usize,
        index_rows: usize,
    },

    #[error("Library artifact not found: {}", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("Library artifact {} is unreadable: {message}", path.display())]
    CorruptArtifact { path: PathBuf, message: String },

    #[error("Query text is empty")]
    EmptyQuery,

    #[error("Embedding error: {0}")]
    Embedding(#[from] MetadataError),

    #[error("State error: {0}")]
    Sync(#[from] SyncError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
