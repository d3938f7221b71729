//! # Core Configuration Module
//!
//! Provides configuration management for the catalog mirror.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`MirrorConfig`] holding every setting the sync engine and the index
//! builder need. It enforces fail-fast validation so a bad run directory or a
//! zero concurrency limit is reported before any pass starts.
//!
//! ## Required Settings
//!
//! - `run_dir` - Directory holding the snapshot, state and derived artifacts
//!
//! ## Optional Settings (with defaults)
//!
//! - [`RunLayout`] file names inside the run directory
//! - [`EditionApiConfig`] - edition-metadata endpoint
//! - [`EmbeddingApiConfig`] - OpenAI-compatible embeddings endpoint
//! - [`FetchSettings`] for enrichment and for embedding
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::MirrorConfig;
//!
//! let config = MirrorConfig::builder()
//!     .run_dir("/data/catalog")
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! Hosts that are configured through the environment can start from
//! [`MirrorConfigBuilder::from_env`] and override individual settings.

use crate::error::{Error, Result};
use crate::logging::redact_if_sensitive;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the run directory.
pub const ENV_RUN_DIR: &str = "CATALOG_RUN_DIR";
/// Environment variable overriding the edition-metadata base URL.
pub const ENV_EDITION_URL: &str = "CATALOG_EDITION_URL";
/// Environment variable overriding the embeddings base URL.
pub const ENV_EMBEDDING_BASE_URL: &str = "EMBEDDING_BASE_URL";
/// Environment variable overriding the embedding model.
pub const ENV_EMBEDDING_MODEL: &str = "EMBEDDING_MODEL";
/// Environment variable carrying the embeddings API key.
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";

pub const DEFAULT_EDITION_BASE_URL: &str = "https://na2.iiivega.com/api/search-result/editions";
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

// ============================================================================
// Run directory layout
// ============================================================================

/// File names of every artifact inside a run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub run_dir: PathBuf,
    /// Canonical snapshot produced by the ingestion step
    pub snapshot_file: String,
    /// Persisted sync state
    pub state_file: String,
    /// Clean catalog written by every sync pass
    pub clean_catalog_file: String,
    /// Clean records aligned with the matrix rows, written by a rebuild
    pub aligned_records_file: String,
    pub index_file: String,
    pub matrix_file: String,
}

impl RunLayout {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
            snapshot_file: "catalog.json".to_string(),
            state_file: "catalog_state.json".to_string(),
            clean_catalog_file: "catalog_enhanced.json".to_string(),
            aligned_records_file: "library_records.json".to_string(),
            index_file: "library.index".to_string(),
            matrix_file: "library_embeddings.bin".to_string(),
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.run_dir.join(&self.snapshot_file)
    }

    pub fn state_path(&self) -> PathBuf {
        self.run_dir.join(&self.state_file)
    }

    pub fn clean_catalog_path(&self) -> PathBuf {
        self.run_dir.join(&self.clean_catalog_file)
    }

    pub fn aligned_records_path(&self) -> PathBuf {
        self.run_dir.join(&self.aligned_records_file)
    }

    pub fn index_path(&self) -> PathBuf {
        self.run_dir.join(&self.index_file)
    }

    pub fn matrix_path(&self) -> PathBuf {
        self.run_dir.join(&self.matrix_file)
    }

    /// Validates the layout
    ///
    /// # Errors
    ///
    /// Returns an error if the run directory or any file name is empty, or if
    /// two artifacts share a file name.
    pub fn validate(&self) -> Result<()> {
        if self.run_dir.as_os_str().is_empty() {
            return Err(Error::Config("Run directory cannot be empty".to_string()));
        }

        let names = self.file_names();
        for (label, name) in &names {
            if name.trim().is_empty() {
                return Err(Error::Config(format!("{} file name cannot be empty", label)));
            }
            if Path::new(name).components().count() != 1 {
                return Err(Error::Config(format!(
                    "{} file name must not contain path separators: {}",
                    label, name
                )));
            }
        }

        for (i, (label, name)) in names.iter().enumerate() {
            if let Some((other, _)) = names[i + 1..].iter().find(|(_, n)| n == name) {
                return Err(Error::Config(format!(
                    "{} and {} share the file name {}",
                    label, other, name
                )));
            }
        }

        Ok(())
    }

    fn file_names(&self) -> [(&'static str, &str); 6] {
        [
            ("Snapshot", self.snapshot_file.as_str()),
            ("State", self.state_file.as_str()),
            ("Clean catalog", self.clean_catalog_file.as_str()),
            ("Aligned records", self.aligned_records_file.as_str()),
            ("Index", self.index_file.as_str()),
            ("Matrix", self.matrix_file.as_str()),
        ]
    }
}

// ============================================================================
// Remote collaborators
// ============================================================================

/// Edition-metadata endpoint configuration.
///
/// Editions are fetched with `GET {base_url}/{edition_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditionApiConfig {
    pub base_url: String,
    /// Extra headers sent with every request (origin, referer, api version)
    pub headers: BTreeMap<String, String>,
}

impl Default for EditionApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_EDITION_BASE_URL)
    }
}

impl EditionApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// URL of a single edition document.
    pub fn edition_url(&self, edition_id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), edition_id)
    }

    pub fn validate(&self) -> Result<()> {
        validate_url("Edition API base URL", &self.base_url)
    }
}

/// OpenAI-compatible embeddings endpoint configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct EmbeddingApiConfig {
    pub base_url: String,
    pub model: String,
    /// Bearer key; only required when an embedding pass runs
    pub api_key: Option<String>,
}

impl Default for EmbeddingApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EMBEDDING_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key: None,
        }
    }
}

impl fmt::Debug for EmbeddingApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingApiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field(
                "api_key",
                &self
                    .api_key
                    .as_deref()
                    .map(|key| redact_if_sensitive("api_key", key)),
            )
            .finish()
    }
}

impl EmbeddingApiConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    /// Returns the API key, failing when none was configured.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(Error::MissingSetting {
                setting: ENV_API_KEY.to_string(),
                message: "An API key is required to compute embeddings. \
                          Set OPENAI_API_KEY or configure EmbeddingApiConfig::with_api_key."
                    .to_string(),
            }),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_url("Embedding API base URL", &self.base_url)?;
        if self.model.trim().is_empty() {
            return Err(Error::Config("Embedding model cannot be empty".to_string()));
        }
        Ok(())
    }
}

fn validate_url(label: &str, url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(Error::Config(format!("{} cannot be empty", label)));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Error::Config(format!(
            "{} must start with http:// or https://: {}",
            label, url
        )));
    }
    Ok(())
}

// ============================================================================
// Fetch tuning
// ============================================================================

/// Admission, retry and timeout settings for one class of remote calls.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    /// Maximum number of attempts in flight at once
    pub max_in_flight: usize,
    /// Total attempts per item, including the first
    pub max_attempts: u32,
    /// Backoff before the second attempt
    pub base_delay: Duration,
    /// Upper bound of the exponential backoff (before jitter)
    pub max_delay: Duration,
    /// Jitter multiplier range applied to every backoff
    pub jitter: (f64, f64),
    /// Timeout of a single attempt
    pub attempt_timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 6,
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: (0.8, 1.2),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl FetchSettings {
    /// Defaults for edition-metadata enrichment.
    pub fn enrichment() -> Self {
        Self::default()
    }

    /// Defaults for embedding requests.
    pub fn embedding() -> Self {
        Self {
            max_in_flight: 4,
            ..Self::default()
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, min: f64, max: f64) -> Self {
        self.jitter = (min, max);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Validates the settings
    ///
    /// # Errors
    ///
    /// Returns an error if concurrency or attempts are zero, if the base delay
    /// exceeds the cap, if the jitter range is not positive and ordered, or if
    /// the attempt timeout is zero.
    pub fn validate(&self, label: &str) -> Result<()> {
        if self.max_in_flight == 0 {
            return Err(Error::Config(format!(
                "{}: max_in_flight must be greater than 0",
                label
            )));
        }
        if self.max_attempts == 0 {
            return Err(Error::Config(format!(
                "{}: max_attempts must be greater than 0",
                label
            )));
        }
        if self.base_delay > self.max_delay {
            return Err(Error::Config(format!(
                "{}: base delay ({:?}) exceeds max delay ({:?})",
                label, self.base_delay, self.max_delay
            )));
        }
        let (min, max) = self.jitter;
        if !(min > 0.0 && min <= max && max.is_finite()) {
            return Err(Error::Config(format!(
                "{}: invalid jitter range {}..{}",
                label, min, max
            )));
        }
        if self.attempt_timeout.is_zero() {
            return Err(Error::Config(format!(
                "{}: attempt timeout must be greater than 0",
                label
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Mirror configuration
// ============================================================================

/// Complete configuration of the catalog mirror.
///
/// Use [`MirrorConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub layout: RunLayout,
    pub edition_api: EditionApiConfig,
    pub embedding_api: EmbeddingApiConfig,
    pub enrichment_fetch: FetchSettings,
    pub embedding_fetch: FetchSettings,
}

impl MirrorConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> MirrorConfigBuilder {
        MirrorConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        self.layout.validate()?;
        self.edition_api.validate()?;
        self.embedding_api.validate()?;
        self.enrichment_fetch.validate("Enrichment fetch")?;
        self.embedding_fetch.validate("Embedding fetch")?;
        Ok(())
    }
}

/// Builder for constructing [`MirrorConfig`] instances.
#[derive(Debug, Default)]
pub struct MirrorConfigBuilder {
    run_dir: Option<PathBuf>,
    layout: Option<RunLayout>,
    edition_api: Option<EditionApiConfig>,
    embedding_api: Option<EmbeddingApiConfig>,
    enrichment_fetch: Option<FetchSettings>,
    embedding_fetch: Option<FetchSettings>,
}

impl MirrorConfigBuilder {
    /// Starts a builder from the process environment.
    ///
    /// Reads `CATALOG_RUN_DIR`, `CATALOG_EDITION_URL`, `EMBEDDING_BASE_URL`,
    /// `EMBEDDING_MODEL` and `OPENAI_API_KEY`. Unset variables leave the
    /// defaults in place.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut builder = Self::default();

        if let Some(run_dir) = value(ENV_RUN_DIR) {
            builder = builder.run_dir(run_dir);
        }

        if let Some(url) = value(ENV_EDITION_URL) {
            builder = builder.edition_api(EditionApiConfig::new(url));
        }

        let mut embedding = EmbeddingApiConfig::default();
        if let Some(url) = value(ENV_EMBEDDING_BASE_URL) {
            embedding = embedding.with_base_url(url);
        }
        if let Some(model) = value(ENV_EMBEDDING_MODEL) {
            embedding = embedding.with_model(model);
        }
        if let Some(key) = value(ENV_API_KEY) {
            embedding = embedding.with_api_key(key);
        }

        builder.embedding_api(embedding)
    }

    /// Sets the run directory.
    pub fn run_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.run_dir = Some(path.into());
        self
    }

    /// Replaces the whole layout, including its run directory.
    pub fn layout(mut self, layout: RunLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn edition_api(mut self, config: EditionApiConfig) -> Self {
        self.edition_api = Some(config);
        self
    }

    pub fn embedding_api(mut self, config: EmbeddingApiConfig) -> Self {
        self.embedding_api = Some(config);
        self
    }

    pub fn enrichment_fetch(mut self, settings: FetchSettings) -> Self {
        self.enrichment_fetch = Some(settings);
        self
    }

    pub fn embedding_fetch(mut self, settings: FetchSettings) -> Self {
        self.embedding_fetch = Some(settings);
        self
    }

    /// Builds the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no run directory was provided or if validation fails.
    pub fn build(self) -> Result<MirrorConfig> {
        let layout = match (self.layout, self.run_dir) {
            (Some(mut layout), Some(run_dir)) => {
                layout.run_dir = run_dir;
                layout
            }
            (Some(layout), None) => layout,
            (None, Some(run_dir)) => RunLayout::new(run_dir),
            (None, None) => {
                return Err(Error::MissingSetting {
                    setting: "run_dir".to_string(),
                    message: "A run directory is required. \
                              Pass --run-dir or set CATALOG_RUN_DIR."
                        .to_string(),
                })
            }
        };

        let config = MirrorConfig {
            layout,
            edition_api: self.edition_api.unwrap_or_default(),
            embedding_api: self.embedding_api.unwrap_or_default(),
            enrichment_fetch: self.enrichment_fetch.unwrap_or_else(FetchSettings::enrichment),
            embedding_fetch: self.embedding_fetch.unwrap_or_else(FetchSettings::embedding),
        };

        config.validate()?;
        Ok(config)
    }
}
