//! Cover art post-processing.

use std::path::{Path, PathBuf};

use image::GenericImageView;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors produced by artwork post-processing.
#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("artwork image error on {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Center-crops the image at `path` to a square, in place.
///
/// The crop side is the smaller dimension; there is no resizing or
/// upscaling. Already-square images are left untouched.
///
/// # Errors
///
/// Returns [`ArtworkError`] if the image cannot be decoded or re-encoded.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn crop_square(path: &Path) -> Result<(), ArtworkError> {
    let img = image::open(path).map_err(|source| ArtworkError::Image {
        path: path.to_path_buf(),
        source,
    })?;

    let (width, height) = img.dimensions();
    if width == height {
        debug!("image already square");
        return Ok(());
    }

    let side = width.min(height);
    let left = (width - side) / 2;
    let top = (height - side) / 2;

    let cropped = img.crop_imm(left, top, side, side);
    cropped.save(path).map_err(|source| ArtworkError::Image {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(side, "cropped image to square");
    Ok(())
}
