//! External collaborator seams: metadata extraction, audio/content fetching,
//! and tag writing.
//!
//! The pipeline never talks to the outside world directly; it goes through
//! the object-safe traits defined here. Production wiring uses
//! [`YtDlpProvider`] (a `yt-dlp` subprocess) for metadata and audio,
//! [`HttpFetcher`] for plain byte fetches, and [`LoftyTagWriter`] for
//! in-place tag application. Tests substitute mocks.

mod http;
mod tags;
mod ytdlp;

pub use http::HttpFetcher;
pub use tags::LoftyTagWriter;
pub use ytdlp::YtDlpProvider;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::document::Document;

/// Output container produced by the audio provider.
pub const AUDIO_EXTENSION: &str = "ogg";

/// Inclusive sleep window (seconds) applied between provider requests.
///
/// The upstream services rate-limit aggressively; pacing is a correctness
/// requirement, not a courtesy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingOptions {
    pub min_sleep_secs: u64,
    pub max_sleep_secs: u64,
}

/// Options for metadata extraction calls.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Suppress provider progress/warning output.
    pub quiet: bool,
    /// Flat extraction: child entries are listed, not recursed into.
    pub flat: bool,
    pub pacing: PacingOptions,
}

/// Options for audio fetch calls.
#[derive(Debug, Clone)]
pub struct AudioOptions {
    pub quiet: bool,
    /// Bandwidth cap in bytes per second.
    pub rate_limit: u64,
    /// Sleep between the provider's internal HTTP requests.
    pub request_sleep_secs: u64,
    pub pacing: PacingOptions,
}

/// Errors produced by external collaborators.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The external tool could not be spawned.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool exited unsuccessfully.
    #[error("{program} failed (status {status:?}): {stderr}")]
    Failed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    /// The tool's output could not be parsed as a document.
    #[error("unparseable provider output: {0}")]
    Parse(#[from] serde_json::Error),

    /// Network-level error fetching bytes.
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP error response fetching bytes.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// Filesystem error while writing fetched content.
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tag read/write failure on an on-disk audio file.
    #[error("tagging error on {path}: {message}")]
    Tag { path: PathBuf, message: String },
}

/// Remote metadata extraction.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Extracts the metadata document for a catalog URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the provider cannot be invoked, exits
    /// unsuccessfully, or produces unparseable output.
    async fn extract(&self, url: &str, options: &ExtractOptions)
    -> Result<Document, ProviderError>;
}

/// Remote audio retrieval and transcoding.
#[async_trait]
pub trait AudioProvider: Send + Sync {
    /// Fetches the audio for an item URL to `dest_stem` plus the fixed
    /// [`AUDIO_EXTENSION`].
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on any retrieval or transcode failure.
    async fn fetch_audio(
        &self,
        url: &str,
        dest_stem: &Path,
        options: &AudioOptions,
    ) -> Result<(), ProviderError>;
}

/// Plain streamed byte fetches (artwork and other assets).
#[async_trait]
pub trait ArtFetcher: Send + Sync {
    /// Streams `url` to `dest`. Succeeds as a no-op when `dest` already
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on network, HTTP, or filesystem failure.
    async fn fetch_bytes(&self, url: &str, dest: &Path) -> Result<(), ProviderError>;
}

/// Tag fields applied to a materialized audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags {
    /// 1-based track number; absent for explicitly unordered records.
    pub track_number: Option<u32>,
    pub artist: String,
    pub album: String,
    pub title: String,
    pub year: Option<String>,
}

/// In-place tag application on an on-disk audio file.
pub trait TagWriter: Send + Sync {
    /// Applies `tags` to the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Tag`] when the file cannot be read or the
    /// tags cannot be written.
    fn apply(&self, path: &Path, tags: &TrackTags) -> Result<(), ProviderError>;
}
