//! Run configuration.
//!
//! All knobs live in one explicit [`Settings`] value constructed at startup
//! and passed by reference to the pipeline stages; there is no ambient global
//! state. Defaults mirror conservative pacing suitable for rate-limited
//! upstream providers.

use std::path::PathBuf;

use crate::provider::{AudioOptions, ExtractOptions, PacingOptions};

/// Default inclusive sleep window (seconds) for metadata requests.
pub const DEFAULT_INFO_PACING: PacingOptions = PacingOptions {
    min_sleep_secs: 10,
    max_sleep_secs: 20,
};

/// Default inclusive sleep window (seconds) for audio downloads.
pub const DEFAULT_DOWNLOAD_PACING: PacingOptions = PacingOptions {
    min_sleep_secs: 60,
    max_sleep_secs: 120,
};

/// Default sleep (seconds) between the audio provider's internal requests.
pub const DEFAULT_DOWNLOAD_REQUEST_SLEEP_SECS: u64 = 3;

/// Default bandwidth cap in bytes per second.
pub const DEFAULT_DOWNLOAD_RATE_LIMIT: u64 = 500_000;

/// Process-wide run configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the mirrored library.
    pub output_dir: PathBuf,
    /// Path to the metadata cache database.
    pub cache_db: PathBuf,
    /// Path to the dedup ledger file.
    pub ledger_path: PathBuf,
    /// Pacing window for metadata extraction.
    pub info_pacing: PacingOptions,
    /// Pacing window for audio downloads.
    pub download_pacing: PacingOptions,
    /// Sleep between the audio provider's internal requests.
    pub download_request_sleep_secs: u64,
    /// Bandwidth cap for audio downloads, bytes per second.
    pub download_rate_limit: u64,
    /// Force-refresh root and collection metadata during flattening.
    pub refresh_cache_at_scan: bool,
    /// Re-apply tags to artifacts that already exist on disk.
    pub update_metadata_existing: bool,
    /// Plan without touching network or disk.
    pub dry_run: bool,
    /// Suppress provider progress output.
    pub quiet_provider: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("library"),
            cache_db: PathBuf::from("cache.db"),
            ledger_path: PathBuf::from("archive.txt"),
            info_pacing: DEFAULT_INFO_PACING,
            download_pacing: DEFAULT_DOWNLOAD_PACING,
            download_request_sleep_secs: DEFAULT_DOWNLOAD_REQUEST_SLEEP_SECS,
            download_rate_limit: DEFAULT_DOWNLOAD_RATE_LIMIT,
            refresh_cache_at_scan: false,
            update_metadata_existing: false,
            dry_run: false,
            quiet_provider: true,
        }
    }
}

impl Settings {
    /// Options for metadata extraction calls.
    ///
    /// Flat extraction is always on: the flattener resolves children itself,
    /// one cache-checked call at a time.
    #[must_use]
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            quiet: self.quiet_provider,
            flat: true,
            pacing: self.info_pacing,
        }
    }

    /// Options for audio fetch calls.
    #[must_use]
    pub fn audio_options(&self) -> AudioOptions {
        AudioOptions {
            quiet: self.quiet_provider,
            rate_limit: self.download_rate_limit,
            request_sleep_secs: self.download_request_sleep_secs,
            pacing: self.download_pacing,
        }
    }
}
