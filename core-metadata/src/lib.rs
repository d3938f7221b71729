//! # Remote Metadata Adapters
//!
//! Adapters for the two remote collaborators of the catalog mirror.
//!
//! ## Overview
//!
//! - [`edition`]: fetches an edition document by id and derives subjects,
//!   summary and contributors from it
//! - [`embedding`]: turns canonical record text into a vector through an
//!   OpenAI-compatible embeddings endpoint
//!
//! Every call is a single attempt. Failures are classified into
//! [`MetadataError`] so the bounded fetcher in `core-sync` can decide whether
//! to retry.

pub mod edition;
pub mod embedding;
pub mod error;

pub use edition::{parse_edition_document, EditionMetadataSource, HttpEditionSource};
pub use embedding::{HttpTextEmbedder, TextEmbedder};
pub use error::{MetadataError, Result};
