//! # Catalog Library Model
//!
//! Typed domain model shared by the sync engine, the index builder and the
//! query path.
//!
//! ## Overview
//!
//! This module provides:
//! - [`SnapshotRecord`](models::SnapshotRecord): a raw record as produced by the ingestion step
//! - [`CatalogRecord`](models::CatalogRecord): the working record with enrichment and embedding state
//! - [`SyncState`](models::SyncState): the persisted record set plus the rebuild flag
//! - [`CleanRecord`](models::CleanRecord): the public projection written for downstream consumers
//! - Content fingerprints over source fields ([`fingerprint`])
//! - Canonical embedding text ([`text`])

pub mod error;
pub mod fingerprint;
pub mod models;
pub mod text;

pub use error::{LibraryError, Result};
pub use models::{
    CatalogRecord, CleanRecord, Edition, EditionEnrichment, Material, SnapshotRecord, SyncState,
};
