//! Idempotent on-disk materialization of flat track records.
//!
//! Per record the orchestrator runs a small state machine with terminal
//! outcomes {skipped, materialized, permanent failure}: ledger check, path
//! computation from sanitized components, audio fetch only when the artifact
//! is absent, tag application, and best-effort cover art with a one-shot
//! re-resolution fallback. Unrecoverable fetch/tag failures push the source
//! reference into the ledger - a permanent skip, not a retry.
//!
//! Crash recovery is purely idempotent: a crash between "content fetched"
//! and "ledger updated" just means the next run finds the artifact on disk
//! and skips the download. No ledger entry is re-added for successes.

mod artwork;
mod sanitize;

pub use artwork::{ArtworkError, crop_square};
pub use sanitize::{sanitize_component, strip_promotional};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::Settings;
use crate::document::CreatorArt;
use crate::flatten::TrackRecord;
use crate::ledger::Ledger;
use crate::provider::{AUDIO_EXTENSION, ArtFetcher, AudioProvider, TagWriter, TrackTags};
use crate::resolver::MetadataResolver;

/// Cover art file name inside each album directory.
const COVER_FILE: &str = "cover.jpg";

/// Terminal outcome for one track record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Reference already in the ledger; nothing done.
    Skipped,
    /// Dry-run mode; planned but not touched.
    DryRun,
    /// Artifact present on disk (fetched now or found from an earlier run).
    Materialized,
    /// Unrecoverable failure; reference ledgered so later runs skip it.
    PermanentFailure,
}

/// Download orchestrator: turns track records into on-disk artifacts.
pub struct Orchestrator {
    settings: Settings,
    resolver: MetadataResolver,
    ledger: Arc<Ledger>,
    audio: Arc<dyn AudioProvider>,
    fetcher: Arc<dyn ArtFetcher>,
    tagger: Arc<dyn TagWriter>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        settings: Settings,
        resolver: MetadataResolver,
        ledger: Arc<Ledger>,
        audio: Arc<dyn AudioProvider>,
        fetcher: Arc<dyn ArtFetcher>,
        tagger: Arc<dyn TagWriter>,
    ) -> Self {
        Self {
            settings,
            resolver,
            ledger,
            audio,
            fetcher,
            tagger,
        }
    }

    /// Processes one record to a terminal outcome. Never panics and never
    /// aborts the surrounding run; every failure is contained here.
    #[instrument(skip(self, record), fields(url = %record.url, title = %record.title))]
    pub async fn process(&self, record: &TrackRecord) -> Outcome {
        if self.ledger.contains(&record.url) {
            debug!("reference already ledgered");
            return Outcome::Skipped;
        }

        // Promotional suffixes come off before sanitizing so bare variants
        // ("BandOfficial") do not survive into the path.
        let creator_dir = sanitize_component(&strip_promotional(&record.creator));
        let album_dir = sanitize_component(&record.album_title);
        let song_dir = self.settings.output_dir.join(&creator_dir).join(&album_dir);
        let audio_stem = song_dir.join(&record.id);
        let audio_path = song_dir.join(format!("{}.{AUDIO_EXTENSION}", record.id));
        let cover_path = song_dir.join(COVER_FILE);

        if self.settings.dry_run {
            info!(path = %audio_path.display(), "dry run, would materialize");
            return Outcome::DryRun;
        }

        if let Err(error) = std::fs::create_dir_all(&song_dir) {
            // Environmental, not a property of the reference: do not ledger.
            warn!(%error, dir = %song_dir.display(), "could not create album directory");
            return Outcome::PermanentFailure;
        }

        let tags = track_tags(record);

        if audio_path.exists() {
            info!(path = %audio_path.display(), "artifact already exists");
            if self.settings.update_metadata_existing
                && let Err(error) = self.tagger.apply(&audio_path, &tags)
            {
                warn!(%error, "could not refresh tags on existing artifact");
            }
        } else {
            info!(creator = %creator_dir, title = %record.title, "downloading");
            if let Err(error) = self
                .audio
                .fetch_audio(&record.url, &audio_stem, &self.settings.audio_options())
                .await
            {
                warn!(%error, "audio fetch failed; ledgering reference");
                self.ledger_permanent_failure(&record.url);
                return Outcome::PermanentFailure;
            }

            if let Err(error) = self.tagger.apply(&audio_path, &tags) {
                warn!(%error, "tagging failed; ledgering reference");
                self.ledger_permanent_failure(&record.url);
                return Outcome::PermanentFailure;
            }

            info!(creator = %creator_dir, title = %record.title, "downloaded");
        }

        self.ensure_cover(record, &cover_path).await;

        Outcome::Materialized
    }

    /// Downloads creator-level artwork (avatar/banner) into the creator
    /// directory. Best-effort: failures are logged and ignored.
    #[instrument(skip(self, art), fields(creator = %creator))]
    pub async fn fetch_creator_art(&self, creator: &str, art: &[CreatorArt]) {
        if self.settings.dry_run || art.is_empty() {
            return;
        }

        let creator_dir = self
            .settings
            .output_dir
            .join(sanitize_component(&strip_promotional(creator)));
        if let Err(error) = std::fs::create_dir_all(&creator_dir) {
            warn!(%error, dir = %creator_dir.display(), "could not create creator directory");
            return;
        }

        for asset in art {
            let dest = creator_dir.join(asset.kind.file_name());
            if let Err(error) = self.fetcher.fetch_bytes(&asset.url, &dest).await {
                warn!(%error, url = %asset.url, "creator art fetch failed");
            }
        }
    }

    /// Ensures the album cover exists next to the artifact.
    ///
    /// Order: the record's known artwork reference first; on failure (or
    /// when the record carries none) the collection metadata is re-resolved
    /// with a forced refresh and the fetch retried once. A final failure
    /// leaves the item without art - never a materialization failure.
    async fn ensure_cover(&self, record: &TrackRecord, cover_path: &Path) {
        if cover_path.exists() {
            return;
        }
        info!("cover missing, downloading");

        if let Some(art_url) = &record.album_art_url {
            match self.fetcher.fetch_bytes(art_url, cover_path).await {
                Ok(()) => {
                    self.square_cover(cover_path);
                    return;
                }
                Err(error) => {
                    warn!(%error, "cover fetch failed; re-resolving collection metadata");
                }
            }
        } else {
            debug!("record carries no artwork reference; re-resolving collection metadata");
        }

        let refreshed = match self.resolver.resolve(&record.album_url, true).await {
            Ok(doc) => doc,
            Err(error) => {
                warn!(%error, "could not re-resolve collection for artwork");
                return;
            }
        };

        let Some(art_url) = refreshed.penultimate_thumbnail() else {
            warn!("refreshed collection metadata carries no artwork");
            return;
        };

        match self.fetcher.fetch_bytes(&art_url, cover_path).await {
            Ok(()) => {
                info!("downloaded album cover on retry");
                self.square_cover(cover_path);
            }
            Err(error) => warn!(%error, "album cover failed to download"),
        }
    }

    fn square_cover(&self, cover_path: &Path) {
        if let Err(error) = crop_square(cover_path) {
            warn!(%error, "could not square cover art");
        }
    }

    fn ledger_permanent_failure(&self, reference: &str) {
        if let Err(error) = self.ledger.append(reference) {
            warn!(%error, "could not ledger failed reference");
        }
    }
}

/// Builds the tag set for a record. Track numbers are 1-based; records
/// without an ordinal get no track number at all.
fn track_tags(record: &TrackRecord) -> TrackTags {
    TrackTags {
        track_number: record.index.map(|i| i + 1),
        artist: strip_promotional(&record.creator),
        album: record.album_title.clone(),
        title: record.title.clone(),
        year: record.year.clone(),
    }
}

/// Deterministic artifact path for a record, exposed for idempotence checks
/// and tests.
#[must_use]
pub fn artifact_path(output_dir: &Path, record: &TrackRecord) -> PathBuf {
    output_dir
        .join(sanitize_component(&strip_promotional(&record.creator)))
        .join(sanitize_component(&record.album_title))
        .join(format!("{}.{AUDIO_EXTENSION}", record.id))
}
