//! In-place audio tag application backed by `lofty`.

use std::path::Path;

use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use tracing::instrument;

use super::{ProviderError, TagWriter, TrackTags};

/// Tag writer that reads the existing tag (if any), overwrites the track
/// fields, and saves the file in place. Existing unrelated tag items are
/// preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagWriter;

impl TagWriter for LoftyTagWriter {
    #[instrument(skip(self, tags), fields(path = %path.display()))]
    fn apply(&self, path: &Path, tags: &TrackTags) -> Result<(), ProviderError> {
        let mut tagged = Probe::open(path)
            .and_then(Probe::read)
            .map_err(|error| tag_error(path, &error))?;

        if tagged.primary_tag().is_none() {
            tagged.insert_tag(Tag::new(tagged.primary_tag_type()));
        }
        let Some(tag) = tagged.primary_tag_mut() else {
            return Err(ProviderError::Tag {
                path: path.to_path_buf(),
                message: "file format supports no tag".to_string(),
            });
        };

        if let Some(track_number) = tags.track_number {
            tag.set_track(track_number);
        }
        tag.set_artist(tags.artist.clone());
        tag.set_album(tags.album.clone());
        tag.set_title(tags.title.clone());
        if let Some(year) = &tags.year {
            if let Ok(numeric) = year.parse::<u32>() {
                tag.set_year(numeric);
            } else {
                tag.insert_text(ItemKey::RecordingDate, year.clone());
            }
        }

        tagged
            .save_to_path(path, WriteOptions::default())
            .map_err(|error| tag_error(path, &error))
    }
}

fn tag_error(path: &Path, error: &dyn std::fmt::Display) -> ProviderError {
    ProviderError::Tag {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_to_missing_file_reports_tag_error() {
        let writer = LoftyTagWriter;
        let tags = TrackTags {
            track_number: Some(1),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            title: "Title".to_string(),
            year: Some("2020".to_string()),
        };

        let err = writer
            .apply(Path::new("/nonexistent/file.ogg"), &tags)
            .unwrap_err();
        assert!(matches!(err, ProviderError::Tag { .. }));
    }
}
