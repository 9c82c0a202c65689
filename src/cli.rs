//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use tunemirror::config::DEFAULT_DOWNLOAD_RATE_LIMIT;

/// Mirror hierarchical media catalogs into a flat local audio library.
///
/// Reads a list of catalog URLs, resolves their metadata through a local
/// cache, and downloads each track once into creator/album directories with
/// tags and cover art. A persistent ledger makes re-runs cheap and safe.
#[derive(Parser, Debug)]
#[command(name = "tunemirror")]
#[command(author, version, about)]
pub struct Args {
    /// Target list file (one catalog URL per line, # for comments)
    #[arg(default_value = "list.txt")]
    pub list: PathBuf,

    /// Root directory of the mirrored library
    #[arg(short, long, default_value = "library")]
    pub output_dir: PathBuf,

    /// Metadata cache database path
    #[arg(long, default_value = "cache.db")]
    pub cache_db: PathBuf,

    /// Dedup ledger path
    #[arg(long, default_value = "archive.txt")]
    pub archive: PathBuf,

    /// Force-refresh root and collection metadata during scanning
    #[arg(long)]
    pub refresh_cache: bool,

    /// Re-apply tags to tracks that already exist on disk
    #[arg(long)]
    pub update_existing_metadata: bool,

    /// Plan the run without downloading or writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Download bandwidth cap in bytes per second (0 to disable)
    #[arg(short = 'l', long, default_value_t = DEFAULT_DOWNLOAD_RATE_LIMIT)]
    pub rate_limit: u64,

    /// Path to the external extractor binary
    #[arg(long, default_value = "yt-dlp")]
    pub extractor: PathBuf,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
