//! # Library Index
//!
//! Embedding pass, vector index and query-side loading for the catalog mirror.
//!
//! ## Overview
//!
//! - [`builder`]: embeds pending records and rebuilds the index when flagged
//! - [`flat_index`]: exact squared-L2 nearest-neighbour index
//! - [`matrix`]: embedding matrix aligned row-for-row with the index
//! - [`artifacts`]: artifact persistence and [`LibraryIndex`] loading with a
//!   parity check
//! - [`search`]: candidate retrieval and scoring for the query path

pub mod artifacts;
pub mod builder;
pub mod error;
pub mod flat_index;
pub mod matrix;
pub mod search;

pub use artifacts::{write_library, LibraryIndex};
pub use builder::{EmbeddingIndexBuilder, EmbeddingSummary};
pub use error::{IndexError, Result};
pub use flat_index::{FlatL2Index, SearchHit};
pub use matrix::EmbeddingMatrix;
pub use search::{prefilter, Candidate, LibrarySearch, DEFAULT_K, DEFAULT_MAX_ITEMS};
