//! Hierarchy flattening: one root catalog URL into an ordered sequence of
//! flat track records.
//!
//! Remote catalogs come in three shapes and all of them collapse to the same
//! record type here:
//! - creator/releases: collections of items, indices per collection
//! - creator/items: a flat item list with no intermediate collection
//! - creator-alt: mixed children dispatched on a provider discriminator;
//!   nested sub-catalogs get per-catalog indices, direct items get none
//!
//! The dedup ledger is checked before every child resolution, which is the
//! primary mechanism keeping network cost down across runs (the cache merely
//! makes repeated resolutions cheap; the ledger prevents them entirely).
//!
//! Failure policy: a child failure is logged and skipped without disturbing
//! its siblings; a root failure aborts the whole flatten for that root and
//! yields an empty output.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::classify::{EntityKind, classify};
use crate::document::{ChildKind, CreatorArt, Document};
use crate::ledger::Ledger;
use crate::resolver::MetadataResolver;

/// Album title sentinel for items that belong to no named collection.
pub const UNKNOWN_ALBUM: &str = "_unknown";

/// A normalized, order-bearing description of one downloadable unit.
///
/// Ephemeral: owned by the pipeline run that produced it and discarded after
/// orchestration. `id` and `url` are stable provider-side keys used to build
/// the on-disk path and the ledger reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackRecord {
    pub title: String,
    /// 0-based position within the owning collection. `None` for direct
    /// children of a creator-alt root, whose ordering is explicitly
    /// unreliable.
    pub index: Option<u32>,
    /// Source reference; also the ledger key.
    pub url: String,
    pub album_title: String,
    /// Known artwork reference; absent triggers re-resolution at
    /// materialization time.
    pub album_art_url: Option<String>,
    /// Reference to re-resolve when the artwork fetch fails.
    pub album_url: String,
    pub creator: String,
    /// Stable provider-side id; becomes the artifact file stem.
    pub id: String,
    pub year: Option<String>,
}

/// Result of flattening one root.
#[derive(Debug, Clone, Default)]
pub struct FlattenOutput {
    pub creator: String,
    pub creator_art: Vec<CreatorArt>,
    pub tracks: Vec<TrackRecord>,
}

impl FlattenOutput {
    fn empty() -> Self {
        Self::default()
    }
}

/// Where a record's artwork reference comes from.
enum ArtSource {
    /// The owning collection's artwork (may itself be absent).
    Collection(Option<String>),
    /// The item's own penultimate thumbnail.
    Own,
}

/// Which document field yields the record's year.
enum YearSource {
    Release,
    Upload,
}

/// Per-child parameters that differ between the three catalog shapes.
struct ChildContext<'c> {
    index: Option<u32>,
    album_fallback: &'c str,
    art: ArtSource,
    /// Collection reference for artwork re-resolution; `None` means the
    /// item's own URL doubles as that reference.
    album_url: Option<&'c str>,
    year: YearSource,
}

/// Converts root documents into ordered flat track records.
pub struct Flattener<'a> {
    resolver: &'a MetadataResolver,
    ledger: &'a Ledger,
    /// Force-refresh root and collection metadata (per-item metadata is
    /// always served from cache when available).
    refresh_roots: bool,
}

impl<'a> Flattener<'a> {
    #[must_use]
    pub fn new(resolver: &'a MetadataResolver, ledger: &'a Ledger, refresh_roots: bool) -> Self {
        Self {
            resolver,
            ledger,
            refresh_roots,
        }
    }

    /// Flattens one root catalog URL.
    ///
    /// Root-level problems (unclassifiable URL, failed resolution, document
    /// without a creator field) abort only this root: the output is empty
    /// and the caller moves on to the next target.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn flatten(&self, url: &str) -> FlattenOutput {
        let root_kind = match classify(url) {
            Ok(classified) => classified.kind,
            Err(error) => {
                warn!(%error, "skipping unclassifiable root");
                return FlattenOutput::empty();
            }
        };

        let Ok(doc) = self.resolver.resolve(url, self.refresh_roots).await else {
            warn!("no usable metadata for root");
            return FlattenOutput::empty();
        };

        let Some(creator) = doc.creator().map(ToString::to_string) else {
            warn!("root document has no creator field");
            return FlattenOutput::empty();
        };

        let tracks = match root_kind {
            EntityKind::Creator if url.contains("/releases") => {
                self.flatten_releases(&doc, &creator).await
            }
            EntityKind::Creator => self.flatten_items(&doc, &creator).await,
            EntityKind::CreatorAlt => self.flatten_mixed(&doc, &creator).await,
            EntityKind::Collection | EntityKind::Item => {
                warn!(kind = %root_kind, "unsupported root kind");
                return FlattenOutput::empty();
            }
        };

        info!(creator = %creator, tracks = tracks.len(), "flattened root");

        FlattenOutput {
            creator,
            creator_art: doc.creator_art(),
            tracks,
        }
    }

    /// Creator/releases: every child is a collection whose items are
    /// resolved individually for full detail.
    async fn flatten_releases(&self, root: &Document, creator: &str) -> Vec<TrackRecord> {
        let mut tracks = Vec::new();

        for collection_ref in root.entries() {
            if self.ledger.contains(&collection_ref.url) {
                debug!(url = %collection_ref.url, "collection already ledgered, skipping");
                continue;
            }

            let collection = match self
                .resolver
                .resolve(&collection_ref.url, self.refresh_roots)
                .await
            {
                Ok(doc) => doc,
                Err(error) => {
                    warn!(%error, url = %collection_ref.url, "collection unusable, skipping");
                    continue;
                }
            };

            let collection_title = collection.title().unwrap_or(UNKNOWN_ALBUM).to_string();
            let collection_art = collection.penultimate_thumbnail();

            for (position, child) in collection.entries().iter().enumerate() {
                let context = ChildContext {
                    index: Some(clamped_index(position)),
                    album_fallback: &collection_title,
                    art: ArtSource::Collection(collection_art.clone()),
                    album_url: Some(&collection_ref.url),
                    year: YearSource::Release,
                };
                if let Some(record) = self.resolve_child(&child.url, creator, context).await {
                    tracks.push(record);
                }
            }
        }

        tracks
    }

    /// Creator/items: a flat list of items with no intermediate collection.
    async fn flatten_items(&self, root: &Document, creator: &str) -> Vec<TrackRecord> {
        let mut tracks = Vec::new();

        for (position, child) in root.entries().iter().enumerate() {
            let context = ChildContext {
                index: Some(clamped_index(position)),
                album_fallback: UNKNOWN_ALBUM,
                art: ArtSource::Own,
                album_url: None,
                year: YearSource::Upload,
            };
            if let Some(record) = self.resolve_child(&child.url, creator, context).await {
                tracks.push(record);
            }
        }

        tracks
    }

    /// Creator-alt: children carry a kind discriminator. Sub-catalogs expand
    /// like creator/items with indices that reset per catalog; direct items
    /// are explicitly unordered.
    async fn flatten_mixed(&self, root: &Document, creator: &str) -> Vec<TrackRecord> {
        let mut tracks = Vec::new();

        for entry in root.entries() {
            match entry.kind {
                ChildKind::SubCatalog => {
                    if self.ledger.contains(&entry.url) {
                        debug!(url = %entry.url, "sub-catalog already ledgered, skipping");
                        continue;
                    }
                    let catalog = match self.resolver.resolve(&entry.url, false).await {
                        Ok(doc) => doc,
                        Err(error) => {
                            warn!(%error, url = %entry.url, "sub-catalog unusable, skipping");
                            continue;
                        }
                    };
                    for (position, child) in catalog.entries().iter().enumerate() {
                        let context = ChildContext {
                            index: Some(clamped_index(position)),
                            album_fallback: UNKNOWN_ALBUM,
                            art: ArtSource::Own,
                            album_url: None,
                            year: YearSource::Upload,
                        };
                        if let Some(record) = self.resolve_child(&child.url, creator, context).await
                        {
                            tracks.push(record);
                        }
                    }
                }
                ChildKind::Direct => {
                    let context = ChildContext {
                        index: None,
                        album_fallback: UNKNOWN_ALBUM,
                        art: ArtSource::Own,
                        album_url: None,
                        year: YearSource::Upload,
                    };
                    if let Some(record) = self.resolve_child(&entry.url, creator, context).await {
                        tracks.push(record);
                    }
                }
                ChildKind::Other => {
                    debug!(url = %entry.url, "unhandled child kind, skipping");
                }
            }
        }

        tracks
    }

    /// Resolves one child item into a record. Returns `None` when the child
    /// is ledgered, fails to resolve, or lacks the required fields; the
    /// caller continues with the remaining siblings either way.
    async fn resolve_child(
        &self,
        url: &str,
        creator: &str,
        context: ChildContext<'_>,
    ) -> Option<TrackRecord> {
        if self.ledger.contains(url) {
            debug!(%url, "item already ledgered, skipping");
            return None;
        }

        let item = match self.resolver.resolve(url, false).await {
            Ok(doc) => doc,
            Err(error) => {
                warn!(%error, %url, "item unusable, skipping");
                return None;
            }
        };

        let (Some(title), Some(id)) = (item.title(), item.id()) else {
            warn!(%url, "item document missing title or id, skipping");
            return None;
        };

        let album_art_url = match &context.art {
            ArtSource::Collection(art) => art.clone(),
            ArtSource::Own => item.penultimate_thumbnail(),
        };

        let year = match context.year {
            YearSource::Release => item.release_year(),
            YearSource::Upload => item.upload_year(),
        };

        Some(TrackRecord {
            title: title.to_string(),
            index: context.index,
            url: url.to_string(),
            album_title: item
                .album()
                .unwrap_or(context.album_fallback)
                .to_string(),
            album_art_url,
            album_url: context.album_url.unwrap_or(url).to_string(),
            creator: creator.to_string(),
            id: id.to_string(),
            year,
        })
    }
}

/// Collection positions comfortably fit in u32; saturate rather than panic
/// on absurd provider output.
fn clamped_index(position: usize) -> u32 {
    u32::try_from(position).unwrap_or(u32::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::MetadataCache;
    use crate::db::Database;
    use crate::provider::{ExtractOptions, PacingOptions};
    use crate::test_support::MockMetadataProvider;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn options() -> ExtractOptions {
        ExtractOptions {
            quiet: true,
            flat: true,
            pacing: PacingOptions {
                min_sleep_secs: 0,
                max_sleep_secs: 0,
            },
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        provider: Arc<MockMetadataProvider>,
        resolver: MetadataResolver,
        ledger: Arc<Ledger>,
    }

    async fn fixture(provider: MockMetadataProvider) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(&dir.path().join("archive.txt")).unwrap());
        let provider = Arc::new(provider);
        let db = Database::new_in_memory().await.unwrap();
        let resolver = MetadataResolver::new(
            MetadataCache::new(db),
            Arc::clone(&ledger),
            Arc::clone(&provider) as Arc<dyn crate::provider::MetadataProvider>,
            options(),
        );
        Fixture {
            _dir: dir,
            provider,
            resolver,
            ledger,
        }
    }

    fn video(id: &str, title: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "upload_date": "20230105",
            "thumbnails": [
                { "url": format!("https://img/{id}-small.jpg") },
                { "url": format!("https://img/{id}-max.jpg") },
                { "url": format!("https://img/{id}.webp") },
            ],
        })
    }

    #[tokio::test]
    async fn test_flatten_releases_shape() {
        let provider = MockMetadataProvider::new()
            .with_response(
                "https://x/@band/releases",
                json!({
                    "channel": "Band - Topic",
                    "entries": [{ "url": "https://x/playlist?list=alb1" }],
                }),
            )
            .with_response(
                "https://x/playlist?list=alb1",
                json!({
                    "title": "First Album",
                    "thumbnails": [
                        { "url": "https://img/alb1-small.jpg" },
                        { "url": "https://img/alb1-max.jpg" },
                        { "url": "https://img/alb1.webp" },
                    ],
                    "entries": [
                        { "url": "https://x/watch?v=a1" },
                        { "url": "https://x/watch?v=a2" },
                    ],
                }),
            )
            .with_response(
                "https://x/watch?v=a1",
                json!({ "id": "a1", "title": "Opener", "album": "Tagged Album", "release_year": 2019 }),
            )
            .with_response(
                "https://x/watch?v=a2",
                json!({ "id": "a2", "title": "Closer" }),
            );
        let f = fixture(provider).await;

        let flattener = Flattener::new(&f.resolver, &f.ledger, false);
        let output = flattener.flatten("https://x/@band/releases").await;

        assert_eq!(output.creator, "Band - Topic");
        assert_eq!(output.tracks.len(), 2);

        let first = &output.tracks[0];
        assert_eq!(first.title, "Opener");
        assert_eq!(first.index, Some(0));
        assert_eq!(first.album_title, "Tagged Album");
        assert_eq!(first.album_art_url.as_deref(), Some("https://img/alb1-max.jpg"));
        assert_eq!(first.album_url, "https://x/playlist?list=alb1");
        assert_eq!(first.year.as_deref(), Some("2019"));

        // Item without its own album falls back to the collection title.
        let second = &output.tracks[1];
        assert_eq!(second.index, Some(1));
        assert_eq!(second.album_title, "First Album");
        assert_eq!(second.year, None);
    }

    #[tokio::test]
    async fn test_flatten_items_shape_uses_own_art_and_upload_year() {
        let provider = MockMetadataProvider::new()
            .with_response(
                "https://x/@band/videos",
                json!({
                    "channel": "Band",
                    "entries": [{ "url": "https://x/watch?v=v1" }],
                }),
            )
            .with_response("https://x/watch?v=v1", video("v1", "Single"));
        let f = fixture(provider).await;

        let flattener = Flattener::new(&f.resolver, &f.ledger, false);
        let output = flattener.flatten("https://x/@band/videos").await;

        assert_eq!(output.tracks.len(), 1);
        let track = &output.tracks[0];
        assert_eq!(track.album_title, UNKNOWN_ALBUM);
        assert_eq!(track.album_art_url.as_deref(), Some("https://img/v1-max.jpg"));
        assert_eq!(track.album_url, "https://x/watch?v=v1");
        assert_eq!(track.year.as_deref(), Some("2023"));
        assert_eq!(track.index, Some(0));
    }

    #[tokio::test]
    async fn test_flatten_dedup_skips_ledgered_child_preserving_order() {
        let provider = MockMetadataProvider::new()
            .with_response(
                "https://x/@band/videos",
                json!({
                    "channel": "Band",
                    "entries": [
                        { "url": "https://x/watch?v=v1" },
                        { "url": "https://x/watch?v=v2" },
                        { "url": "https://x/watch?v=v3" },
                    ],
                }),
            )
            .with_response("https://x/watch?v=v1", video("v1", "One"))
            .with_response("https://x/watch?v=v2", video("v2", "Two"))
            .with_response("https://x/watch?v=v3", video("v3", "Three"));
        let f = fixture(provider).await;
        f.ledger.append("https://x/watch?v=v2").unwrap();

        let flattener = Flattener::new(&f.resolver, &f.ledger, false);
        let output = flattener.flatten("https://x/@band/videos").await;

        let titles: Vec<&str> = output.tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Three"]);
        // The skipped reference never reached the resolver.
        assert_eq!(f.provider.calls_for("https://x/watch?v=v2"), 0);
    }

    #[tokio::test]
    async fn test_flatten_mixed_shape_indices_and_unordered_items() {
        let provider = MockMetadataProvider::new()
            .with_response(
                "https://x/channel/UC123",
                json!({
                    "channel": "Band - Topic",
                    "entries": [
                        { "url": "https://x/playlist?list=tab1", "ie_key": "YoutubeTab" },
                        { "url": "https://x/watch?v=d1", "ie_key": "Youtube" },
                        { "url": "https://x/other", "ie_key": "SomethingElse" },
                    ],
                }),
            )
            .with_response(
                "https://x/playlist?list=tab1",
                json!({
                    "entries": [
                        { "url": "https://x/watch?v=t1" },
                        { "url": "https://x/watch?v=t2" },
                    ],
                }),
            )
            .with_response("https://x/watch?v=t1", video("t1", "Tab One"))
            .with_response("https://x/watch?v=t2", video("t2", "Tab Two"))
            .with_response("https://x/watch?v=d1", video("d1", "Loose"));
        let f = fixture(provider).await;

        let flattener = Flattener::new(&f.resolver, &f.ledger, false);
        let output = flattener.flatten("https://x/channel/UC123").await;

        assert_eq!(output.tracks.len(), 3);
        assert_eq!(output.tracks[0].index, Some(0));
        assert_eq!(output.tracks[1].index, Some(1));
        // Direct children of a creator-alt root carry no ordinal.
        assert_eq!(output.tracks[2].index, None);
        assert_eq!(output.tracks[2].title, "Loose");
        // The unknown-kind child never reached the resolver.
        assert_eq!(f.provider.calls_for("https://x/other"), 0);
    }

    #[tokio::test]
    async fn test_flatten_child_failure_skips_without_aborting_siblings() {
        let provider = MockMetadataProvider::new()
            .with_response(
                "https://x/@band/videos",
                json!({
                    "channel": "Band",
                    "entries": [
                        { "url": "https://x/watch?v=v1" },
                        { "url": "https://x/watch?v=broken" },
                        { "url": "https://x/watch?v=v3" },
                    ],
                }),
            )
            .with_response("https://x/watch?v=v1", video("v1", "One"))
            .with_failure("https://x/watch?v=broken")
            .with_response("https://x/watch?v=v3", video("v3", "Three"));
        let f = fixture(provider).await;

        let flattener = Flattener::new(&f.resolver, &f.ledger, false);
        let output = flattener.flatten("https://x/@band/videos").await;

        let titles: Vec<&str> = output.tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Three"]);
        // The failed child reference was ledgered by the resolver so later
        // runs stop retrying it.
        assert!(f.ledger.contains("https://x/watch?v=broken"));
    }

    #[tokio::test]
    async fn test_flatten_root_failure_yields_empty_output() {
        let provider = MockMetadataProvider::new().with_failure("https://x/@gone/videos");
        let f = fixture(provider).await;

        let flattener = Flattener::new(&f.resolver, &f.ledger, false);
        let output = flattener.flatten("https://x/@gone/videos").await;
        assert!(output.tracks.is_empty());
    }

    #[tokio::test]
    async fn test_flatten_root_without_creator_yields_empty_output() {
        let provider = MockMetadataProvider::new().with_response(
            "https://x/@band/videos",
            json!({ "entries": [{ "url": "https://x/watch?v=v1" }] }),
        );
        let f = fixture(provider).await;

        let flattener = Flattener::new(&f.resolver, &f.ledger, false);
        let output = flattener.flatten("https://x/@band/videos").await;
        assert!(output.tracks.is_empty());
        assert_eq!(f.provider.calls_for("https://x/watch?v=v1"), 0);
    }

    #[tokio::test]
    async fn test_flatten_collects_creator_art() {
        let provider = MockMetadataProvider::new().with_response(
            "https://x/@band/videos",
            json!({
                "channel": "Band",
                "thumbnails": [
                    { "id": "avatar_uncropped", "url": "https://img/avatar.jpg" },
                ],
                "entries": [],
            }),
        );
        let f = fixture(provider).await;

        let flattener = Flattener::new(&f.resolver, &f.ledger, false);
        let output = flattener.flatten("https://x/@band/videos").await;
        assert_eq!(output.creator_art.len(), 1);
        assert_eq!(output.creator_art[0].url, "https://img/avatar.jpg");
    }
}
