//! # Catalog Sync
//!
//! Incremental synchronization of the catalog mirror.
//!
//! ## Overview
//!
//! - [`differ`]: classifies snapshot records as new, changed, unchanged or removed
//! - [`fetcher`]: bounded-concurrency executor with retry, backoff and per-attempt timeouts
//! - [`state_store`]: durable load/save of the working set
//! - [`snapshot`]: canonical snapshot input
//! - [`enrichment`]: edition metadata lookups for new and changed records
//! - [`coordinator`]: one sync pass end to end
//! - [`persist`]: atomic file replacement shared by every artifact writer

pub mod coordinator;
pub mod differ;
pub mod enrichment;
pub mod error;
pub mod fetcher;
pub mod persist;
pub mod snapshot;
pub mod state_store;

pub use coordinator::{SyncCoordinator, SyncSummary};
pub use differ::{diff_records, DiffResult};
pub use enrichment::{EditionEnricher, EnrichmentOutcome};
pub use error::{Result, SyncError};
pub use fetcher::{BoundedFetcher, FetchOutcome, FetchReport};
pub use persist::{write_atomic, write_json_atomic};
pub use snapshot::{FileSnapshotSource, SnapshotSource};
pub use state_store::{JsonStateStore, StateStore};
