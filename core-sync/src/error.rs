use core_library::LibraryError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Catalog snapshot not found: {}", path.display())]
    MissingSnapshot { path: PathBuf },

    #[error("Catalog snapshot {} is unreadable: {message}", path.display())]
    InvalidSnapshot { path: PathBuf, message: String },

    #[error("State file {} is corrupt: {message}", path.display())]
    StateCorruption { path: PathBuf, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
