use anyhow::Context;
use clap::Parser;
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use core_service::{CatalogMirror, MirrorConfigBuilder, DEFAULT_K, DEFAULT_MAX_ITEMS};
use std::path::PathBuf;
use tracing::{debug, info};

/// Incremental catalog mirror with a derived vector index
#[derive(Parser, Debug)]
#[command(name = "catalog-mirror")]
#[command(about = "Sync the catalog mirror, embed records and query the library", long_about = None)]
struct Args {
    /// Run directory holding the snapshot, state and library artifacts
    /// (defaults to CATALOG_RUN_DIR)
    #[arg(short, long)]
    run_dir: Option<PathBuf>,

    /// Run a sync pass: diff the snapshot and enrich new or changed records
    #[arg(long)]
    fetch: bool,

    /// Run an embedding pass and rebuild the index when needed
    #[arg(long)]
    embed: bool,

    /// Print library candidates for a query
    #[arg(long, value_name = "TEXT")]
    search: Option<String>,

    /// Nearest neighbours fetched from the index
    #[arg(long, default_value_t = DEFAULT_K)]
    k: usize,

    /// Candidates kept after scoring
    #[arg(long, default_value_t = DEFAULT_MAX_ITEMS)]
    max_items: usize,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: LogLevel,

    /// Log format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut logging = LoggingConfig::default().with_level(args.log_level);
    if let Some(format) = args.log_format {
        logging = logging.with_format(format);
    }
    init_logging(logging).context("failed to initialise logging")?;

    let mut builder = MirrorConfigBuilder::from_env();
    if let Some(run_dir) = args.run_dir {
        builder = builder.run_dir(run_dir);
    }
    let config = builder.build().context("invalid configuration")?;
    info!(run_dir = %config.layout.run_dir.display(), "Starting catalog-mirror");
    debug!(config = ?config, "Configuration loaded");

    let mirror = CatalogMirror::with_desktop_http(config)?;

    if args.fetch {
        let summary = mirror.sync().await.context("sync pass failed")?;
        println!(
            "Catalog sync: {} new, {} changed, {} unchanged, {} removed, {} retried, {} enrichment failures, rebuild needed: {}",
            summary.new,
            summary.changed,
            summary.unchanged,
            summary.removed,
            summary.retried,
            summary.enrichment_failed,
            summary.needs_index_rebuild
        );
    }

    if args.embed {
        let summary = mirror.embed().await.context("embedding pass failed")?;
        println!(
            "Embedding: {} embedded, {} skipped, rebuilt: {}",
            summary.embedded, summary.skipped, summary.rebuilt
        );
    }

    if let Some(query) = args.search.as_deref() {
        let candidates = mirror
            .candidates(query, args.k, args.max_items)
            .await
            .context("search failed")?;
        println!("{}", serde_json::to_string_pretty(&candidates)?);
    }

    if !args.fetch && !args.embed && args.search.is_none() {
        let state = mirror.state().context("failed to read state")?;
        println!(
            "{} records, {} embedded, {} pending, rebuild needed: {}",
            state.records.len(),
            state.embedded_count(),
            state.pending_embedding_count(),
            state.needs_index_rebuild
        );
    }

    Ok(())
}
