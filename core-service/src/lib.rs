//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host HTTP client and the mirror configuration into
//! the sync, embedding and query components. Desktop builds enable the
//! `desktop-shims` feature (which depends on `bridge-desktop`) and can use
//! [`CatalogMirror::with_desktop_http`]; other hosts pass their own
//! [`HttpClient`] to [`CatalogMirror::new`].

pub mod error;

pub use error::{CoreError, Result};

pub use core_index::{Candidate, EmbeddingSummary, LibraryIndex, DEFAULT_K, DEFAULT_MAX_ITEMS};
pub use core_runtime::config::{MirrorConfig, MirrorConfigBuilder, RunLayout};
pub use core_runtime::events::{CoreEvent, EventBus};
pub use core_sync::SyncSummary;

use std::sync::Arc;

use bridge_traits::http::HttpClient;
use core_index::{EmbeddingIndexBuilder, LibrarySearch};
use core_library::SyncState;
use core_metadata::{HttpEditionSource, HttpTextEmbedder, TextEmbedder};
use core_sync::{
    BoundedFetcher, EditionEnricher, FileSnapshotSource, JsonStateStore, StateStore,
    SyncCoordinator,
};
use tracing::info;

const EVENT_BUS_CAPACITY: usize = 256;

/// Primary façade exposed to host applications.
///
/// Owns one HTTP client handle shared by every adapter it builds.
#[derive(Clone)]
pub struct CatalogMirror {
    config: Arc<MirrorConfig>,
    http_client: Arc<dyn HttpClient>,
    event_bus: EventBus,
}

impl CatalogMirror {
    pub fn new(config: MirrorConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config: Arc::new(config),
            http_client,
            event_bus: EventBus::new(EVENT_BUS_CAPACITY),
        }
    }

    /// Builds the façade on the reqwest-backed client.
    #[cfg(feature = "desktop-shims")]
    pub fn with_desktop_http(config: MirrorConfig) -> Result<Self> {
        let http_client = bridge_desktop::ReqwestHttpClient::with_timeout(
            config.enrichment_fetch.attempt_timeout,
        )
        .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;
        Ok(Self::new(config, Arc::new(http_client)))
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn state_store(&self) -> Arc<dyn StateStore> {
        Arc::new(JsonStateStore::new(self.config.layout.state_path()))
    }

    fn embedder(&self) -> Result<Arc<dyn TextEmbedder>> {
        let embedder = HttpTextEmbedder::new(self.http_client.clone(), &self.config.embedding_api)?;
        Ok(Arc::new(embedder))
    }

    /// Sync coordinator over the configured run directory.
    pub fn sync_coordinator(&self) -> SyncCoordinator {
        let layout = &self.config.layout;
        let source =
            HttpEditionSource::new(self.http_client.clone(), self.config.edition_api.clone());
        let enricher = EditionEnricher::new(
            Arc::new(source),
            BoundedFetcher::new(self.config.enrichment_fetch.clone()),
        );

        SyncCoordinator::new(
            Arc::new(FileSnapshotSource::new(layout.snapshot_path())),
            self.state_store(),
            enricher,
            layout.clean_catalog_path(),
        )
        .with_event_bus(self.event_bus.clone())
    }

    /// Embedding builder over the configured run directory.
    ///
    /// # Errors
    ///
    /// Fails when no embeddings API key is configured.
    pub fn index_builder(&self) -> Result<EmbeddingIndexBuilder> {
        Ok(EmbeddingIndexBuilder::new(
            self.state_store(),
            self.embedder()?,
            BoundedFetcher::new(self.config.embedding_fetch.clone()),
            self.config.layout.clone(),
        )
        .with_event_bus(self.event_bus.clone()))
    }

    /// Runs one sync pass.
    pub async fn sync(&self) -> Result<SyncSummary> {
        Ok(self.sync_coordinator().run_pass().await?)
    }

    /// Runs one embedding pass, rebuilding the index when needed.
    pub async fn embed(&self) -> Result<EmbeddingSummary> {
        Ok(self.index_builder()?.run().await?)
    }

    /// Current persisted state of the run directory.
    pub fn state(&self) -> Result<SyncState> {
        Ok(self.state_store().load()?)
    }

    /// Loads the library artifacts for querying.
    pub fn open_library(&self) -> Result<LibraryIndex> {
        Ok(LibraryIndex::open(&self.config.layout)?)
    }

    /// Opens the library and retrieves scored candidates for `query`.
    pub async fn candidates(
        &self,
        query: &str,
        k: usize,
        max_items: usize,
    ) -> Result<Vec<Candidate>> {
        let library = Arc::new(self.open_library()?);
        info!(records = library.len(), "Searching library");
        let search = LibrarySearch::new(library, self.embedder()?);
        Ok(search.candidates(query, k, max_items).await?)
    }
}
