//! CLI entry point for the catalog mirror tool.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tunemirror::{
    ArtFetcher, AudioProvider, Database, HttpFetcher, Ledger, LoftyTagWriter, MetadataCache,
    MetadataProvider, MetadataResolver, Orchestrator, Pipeline, Settings, TagWriter, YtDlpProvider,
    read_targets,
};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("Mirror starting");

    let settings = Settings {
        output_dir: args.output_dir,
        cache_db: args.cache_db,
        ledger_path: args.archive,
        refresh_cache_at_scan: args.refresh_cache,
        update_metadata_existing: args.update_existing_metadata,
        dry_run: args.dry_run,
        download_rate_limit: args.rate_limit,
        ..Settings::default()
    };

    let targets = read_targets(&args.list)
        .with_context(|| format!("could not read target list {}", args.list.display()))?;
    if targets.is_empty() {
        info!(list = %args.list.display(), "Target list is empty, nothing to do");
        return Ok(());
    }
    info!(targets = targets.len(), "Parsed target list");

    let db = Database::new(&settings.cache_db).await?;
    let cache = MetadataCache::new(db);

    let ledger = Arc::new(Ledger::open(&settings.ledger_path)?);
    info!(
        ledger = %settings.ledger_path.display(),
        entries = ledger.len(),
        "Ledger loaded"
    );

    let provider = Arc::new(YtDlpProvider::with_program(&args.extractor));
    let resolver = MetadataResolver::new(
        cache,
        Arc::clone(&ledger),
        Arc::clone(&provider) as Arc<dyn MetadataProvider>,
        settings.extract_options(),
    );

    let orchestrator = Orchestrator::new(
        settings.clone(),
        resolver.clone(),
        Arc::clone(&ledger),
        provider as Arc<dyn AudioProvider>,
        Arc::new(HttpFetcher::with_pacing(settings.info_pacing)) as Arc<dyn ArtFetcher>,
        Arc::new(LoftyTagWriter) as Arc<dyn TagWriter>,
    );

    let pipeline = Pipeline::new(settings, resolver, ledger, orchestrator);
    let stats = pipeline.run(&targets).await;

    info!(
        materialized = stats.materialized,
        skipped = stats.skipped,
        failed = stats.failed,
        planned = stats.planned,
        total = stats.total(),
        "Mirror complete"
    );

    Ok(())
}
