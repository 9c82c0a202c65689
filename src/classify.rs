//! Catalog URL classification into entity kinds and canonical ids.
//!
//! Every remote reference enters the system as a URL. Before anything is
//! cached, resolved, or downloaded, the URL is classified into one of the
//! closed [`EntityKind`] variants and reduced to the canonical id used as the
//! cache key for that kind. Unrecognized shapes are reported as errors and
//! must be skipped by callers, never treated as fatal.

use thiserror::Error;
use url::Url;

/// Classification of a catalog URL.
///
/// The kind determines which cache partition the entity lives in and which
/// id-extraction rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A creator channel addressed by handle (`/@handle/...`).
    Creator,
    /// A creator channel addressed by opaque channel id (`/channel/<id>`).
    CreatorAlt,
    /// A collection of items (`/playlist?list=<id>`).
    Collection,
    /// A single downloadable item (`/watch?v=<id>`).
    Item,
}

impl EntityKind {
    /// All kinds, in cache-partition creation order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Creator,
        EntityKind::CreatorAlt,
        EntityKind::Collection,
        EntityKind::Item,
    ];

    /// Name of the cache table backing this kind.
    ///
    /// These are compile-time constants from a closed enum; they are the only
    /// non-bound fragment ever interpolated into a SQL statement.
    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::CreatorAlt => "creator_alt",
            Self::Collection => "collection",
            Self::Item => "item",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// A successfully classified URL: its kind plus the canonical id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: EntityKind,
    pub id: String,
}

/// Errors produced by URL classification.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The URL could not be parsed at all (bad scheme, no host, garbage).
    #[error("malformed URL: {url}")]
    Malformed { url: String },

    /// The URL parsed but matches none of the known catalog shapes.
    #[error("unrecognized catalog URL: {url}")]
    Unrecognized { url: String },

    /// A known shape was matched but the id component is missing or empty.
    #[error("missing id in catalog URL: {url}")]
    MissingId { url: String },
}

/// Classifies a catalog URL into an entity kind and canonical id.
///
/// Rules are checked in priority order:
/// 1. handle-based creator: first path segment starts with `@`
/// 2. opaque-id creator: `/channel/<id>`
/// 3. collection: `/playlist` with a `list` query parameter
/// 4. item: `/watch` with a `v` query parameter
///
/// # Errors
///
/// Returns [`ClassifyError`] for malformed or unrecognized URLs. Callers are
/// expected to log and skip; classification failures never abort a run.
pub fn classify(url: &str) -> Result<Classified, ClassifyError> {
    let parsed = Url::parse(url).map_err(|_| ClassifyError::Malformed {
        url: url.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host().is_none() {
        return Err(ClassifyError::Malformed {
            url: url.to_string(),
        });
    }

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    // Handle-based creator: /@handle[/videos|/releases|...]
    if let Some(first) = segments.first()
        && let Some(handle) = first.strip_prefix('@')
    {
        return non_empty_id(url, EntityKind::Creator, handle);
    }

    // Opaque-channel-id creator: /channel/<id>[/...]
    if segments.first() == Some(&"channel") {
        let id = segments.get(1).copied().unwrap_or_default();
        return non_empty_id(url, EntityKind::CreatorAlt, id);
    }

    // Collection: /playlist?list=<id>
    if segments.first() == Some(&"playlist") {
        let id = query_param(&parsed, "list").unwrap_or_default();
        return non_empty_id(url, EntityKind::Collection, &id);
    }

    // Item: /watch?v=<id>
    if segments.first() == Some(&"watch") {
        let id = query_param(&parsed, "v").unwrap_or_default();
        return non_empty_id(url, EntityKind::Item, &id);
    }

    Err(ClassifyError::Unrecognized {
        url: url.to_string(),
    })
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn non_empty_id(url: &str, kind: EntityKind, id: &str) -> Result<Classified, ClassifyError> {
    if id.is_empty() {
        return Err(ClassifyError::MissingId {
            url: url.to_string(),
        });
    }
    Ok(Classified {
        kind,
        id: id.to_string(),
    })
}
