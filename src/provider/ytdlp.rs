//! `yt-dlp` subprocess provider for metadata extraction and audio fetching.
//!
//! Both calls shell out to the `yt-dlp` executable: metadata as a single JSON
//! dump on stdout, audio as a best-audio download remuxed into the fixed
//! output container. Pacing and rate-limit options are passed straight
//! through to the tool, which enforces them between its own requests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{
    AUDIO_EXTENSION, AudioOptions, AudioProvider, ExtractOptions, MetadataProvider, ProviderError,
};
use crate::document::Document;

/// Default executable name, resolved via `PATH`.
const DEFAULT_PROGRAM: &str = "yt-dlp";

/// Longest stderr excerpt carried into an error message.
const MAX_STDERR_LEN: usize = 500;

/// Metadata and audio provider backed by the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlpProvider {
    program: PathBuf,
}

impl Default for YtDlpProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlpProvider {
    /// Creates a provider using the default executable name.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }

    /// Creates a provider using an explicit executable path.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[String]) -> Result<std::process::Output, ProviderError> {
        let program = self.program.display().to_string();
        debug!(%program, ?args, "invoking provider");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|source| ProviderError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = excerpt(&String::from_utf8_lossy(&output.stderr));
            return Err(ProviderError::Failed {
                program,
                status: output.status.code(),
                stderr,
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl MetadataProvider for YtDlpProvider {
    #[instrument(skip(self, options), fields(url = %url))]
    async fn extract(
        &self,
        url: &str,
        options: &ExtractOptions,
    ) -> Result<Document, ProviderError> {
        let mut args = vec!["-J".to_string()];
        if options.flat {
            args.push("--flat-playlist".to_string());
        }
        if options.quiet {
            args.push("--quiet".to_string());
            args.push("--no-warnings".to_string());
        }
        args.extend(sleep_args(options.pacing.min_sleep_secs, options.pacing.max_sleep_secs));
        args.push(url.to_string());

        let output = self.run(&args).await?;
        let doc: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        Ok(Document::from_value(doc))
    }
}

#[async_trait]
impl AudioProvider for YtDlpProvider {
    #[instrument(skip(self, options), fields(url = %url, dest = %dest_stem.display()))]
    async fn fetch_audio(
        &self,
        url: &str,
        dest_stem: &Path,
        options: &AudioOptions,
    ) -> Result<(), ProviderError> {
        let mut args = vec![
            "-f".to_string(),
            "bestaudio[ext=opus]/bestaudio".to_string(),
            "-o".to_string(),
            format!("{}.%(ext)s", dest_stem.display()),
            "--remux-video".to_string(),
            AUDIO_EXTENSION.to_string(),
            "--limit-rate".to_string(),
            options.rate_limit.to_string(),
            "--sleep-requests".to_string(),
            options.request_sleep_secs.to_string(),
        ];
        if options.quiet {
            args.push("--quiet".to_string());
            args.push("--no-progress".to_string());
            args.push("--no-warnings".to_string());
        }
        args.extend(sleep_args(options.pacing.min_sleep_secs, options.pacing.max_sleep_secs));
        args.push(url.to_string());

        self.run(&args).await?;
        Ok(())
    }
}

fn sleep_args(min: u64, max: u64) -> Vec<String> {
    vec![
        "--sleep-interval".to_string(),
        min.to_string(),
        "--max-sleep-interval".to_string(),
        max.to_string(),
    ]
}

fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= MAX_STDERR_LEN {
        return trimmed.to_string();
    }
    let mut cut = MAX_STDERR_LEN;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &trimmed[..cut])
}
