use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Record has no id")]
    MissingId,

    #[error("Duplicate record id: {0}")]
    DuplicateId(String),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
