//! Opaque metadata documents and defensive structural accessors.
//!
//! The metadata provider returns arbitrarily-shaped JSON. The cache stores it
//! verbatim; the flattener consumes it structurally. Every accessor here is
//! missing-field tolerant: absent or differently-typed fields yield `None` or
//! an empty list, never a panic.

use serde_json::Value;

/// A raw metadata document as returned by the provider.
///
/// The document is treated as an opaque snapshot for storage purposes. The
/// accessors below encode the only structural assumptions the pipeline makes.
#[derive(Debug, Clone)]
pub struct Document(Value);

/// Discriminator for children of a creator-alt root.
///
/// The provider tags each child entry with an extractor key; the flattener
/// dispatches on this closed set instead of branching on raw strings at each
/// call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    /// A nested sub-catalog (playlist tab) that must be expanded recursively.
    SubCatalog,
    /// A directly downloadable item.
    Direct,
    /// Anything else; skipped by the flattener.
    Other,
}

/// A child reference extracted from a document's entry list.
#[derive(Debug, Clone)]
pub struct ChildRef {
    pub url: String,
    pub kind: ChildKind,
}

/// Kinds of creator-level artwork the provider exposes as tagged thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatorArtKind {
    Avatar,
    Banner,
}

impl CreatorArtKind {
    /// File name the asset is stored under inside the creator directory.
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Avatar => "artist.jpg",
            Self::Banner => "backdrop.jpg",
        }
    }
}

/// A creator-level artwork reference (avatar or banner).
#[derive(Debug, Clone)]
pub struct CreatorArt {
    pub kind: CreatorArtKind,
    pub url: String,
}

impl Document {
    /// Wraps an already-parsed JSON value.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Parses a raw document as stored in the cache.
    ///
    /// # Errors
    ///
    /// Returns the underlying JSON error when the stored text is not valid
    /// JSON. Callers treat this as a cache miss.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw).map(Self)
    }

    /// Serializes the document back to the raw form stored in the cache.
    #[must_use]
    pub fn to_raw(&self) -> String {
        self.0.to_string()
    }

    /// Returns a borrowed string field, if present.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Creator (channel) display name. Required on every usable root.
    #[must_use]
    pub fn creator(&self) -> Option<&str> {
        self.str_field("channel")
    }

    /// Item or collection title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    /// Album name carried on an item document.
    #[must_use]
    pub fn album(&self) -> Option<&str> {
        self.str_field("album")
    }

    /// Stable provider-side id.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    /// Release year, normalized to a string. The provider emits either a
    /// number or a string here.
    #[must_use]
    pub fn release_year(&self) -> Option<String> {
        match self.0.get("release_year") {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    /// Year derived from the leading four characters of the upload date.
    #[must_use]
    pub fn upload_year(&self) -> Option<String> {
        let date = self.str_field("upload_date")?;
        let year: String = date.chars().take(4).collect();
        (year.chars().count() == 4).then_some(year)
    }

    /// Child references from the document's entry list, in provider order.
    ///
    /// Entries without a usable `url` are dropped.
    #[must_use]
    pub fn entries(&self) -> Vec<ChildRef> {
        let Some(entries) = self.0.get("entries").and_then(Value::as_array) else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| {
                let url = entry.get("url").and_then(Value::as_str)?;
                Some(ChildRef {
                    url: url.to_string(),
                    kind: child_kind(entry),
                })
            })
            .collect()
    }

    /// The penultimate thumbnail URL.
    ///
    /// The provider orders thumbnails smallest-first with a final entry in a
    /// different format/aspect ratio, so the second-from-last entry is the
    /// best square/JPEG candidate. Returns `None` when fewer than two
    /// thumbnails are present.
    #[must_use]
    pub fn penultimate_thumbnail(&self) -> Option<String> {
        let thumbnails = self.0.get("thumbnails").and_then(Value::as_array)?;
        let index = thumbnails.len().checked_sub(2)?;
        thumbnails
            .get(index)
            .and_then(|t| t.get("url"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
    }

    /// Creator-level artwork references (uncropped avatar and banner).
    #[must_use]
    pub fn creator_art(&self) -> Vec<CreatorArt> {
        let Some(thumbnails) = self.0.get("thumbnails").and_then(Value::as_array) else {
            return Vec::new();
        };

        thumbnails
            .iter()
            .filter_map(|thumbnail| {
                let kind = match thumbnail.get("id").and_then(Value::as_str) {
                    Some("avatar_uncropped") => CreatorArtKind::Avatar,
                    Some("banner_uncropped") => CreatorArtKind::Banner,
                    _ => return None,
                };
                let url = thumbnail.get("url").and_then(Value::as_str)?;
                Some(CreatorArt {
                    kind,
                    url: url.to_string(),
                })
            })
            .collect()
    }
}

/// Maps the provider's extractor-key discriminator onto [`ChildKind`].
fn child_kind(entry: &Value) -> ChildKind {
    match entry.get("ie_key").and_then(Value::as_str) {
        Some("YoutubeTab") => ChildKind::SubCatalog,
        Some("Youtube") => ChildKind::Direct,
        _ => ChildKind::Other,
    }
}
