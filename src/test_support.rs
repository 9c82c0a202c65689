//! Shared mock collaborators for unit and integration tests.
//!
//! Compiled into unit tests directly and, behind the `test-util` feature,
//! into the crate's integration tests. Not part of the public API.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::document::Document;
use crate::provider::{
    AUDIO_EXTENSION, ArtFetcher, AudioOptions, AudioProvider, ExtractOptions, MetadataProvider,
    ProviderError, TagWriter, TrackTags,
};

fn mock_failure(what: &str) -> ProviderError {
    ProviderError::Failed {
        program: "mock".to_string(),
        status: Some(1),
        stderr: what.to_string(),
    }
}

/// Metadata provider with canned per-URL responses and call counting.
#[derive(Debug, Default)]
pub struct MockMetadataProvider {
    responses: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_response(self, url: &str, value: Value) -> Self {
        self.responses.lock().unwrap().insert(url.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_failure(self, url: &str) -> Self {
        self.failures.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn set_response(&self, url: &str, value: Value) {
        self.responses.lock().unwrap().insert(url.to_string(), value);
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    async fn extract(
        &self,
        url: &str,
        _options: &ExtractOptions,
    ) -> Result<Document, ProviderError> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

        if self.failures.lock().unwrap().contains(url) {
            return Err(mock_failure("canned extract failure"));
        }

        let value = self
            .responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| mock_failure("no canned response"))?;
        Ok(Document::from_value(value))
    }
}

/// Audio provider that writes a placeholder artifact instead of downloading.
#[derive(Debug, Default)]
pub struct MockAudioProvider {
    failures: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockAudioProvider {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_failure(self, url: &str) -> Self {
        self.failures.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioProvider for MockAudioProvider {
    async fn fetch_audio(
        &self,
        url: &str,
        dest_stem: &Path,
        _options: &AudioOptions,
    ) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(url.to_string());

        if self.failures.lock().unwrap().contains(url) {
            return Err(mock_failure("canned audio failure"));
        }

        let dest = PathBuf::from(format!("{}.{AUDIO_EXTENSION}", dest_stem.display()));
        std::fs::write(&dest, b"fake audio").map_err(|source| ProviderError::Io {
            path: dest,
            source,
        })
    }
}

/// Art fetcher serving canned bodies from memory.
#[derive(Debug, Default)]
pub struct MockArtFetcher {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockArtFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_body(self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.lock().unwrap().insert(url.to_string(), body);
        self
    }

    #[must_use]
    pub fn with_failure(self, url: &str) -> Self {
        self.failures.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtFetcher for MockArtFetcher {
    async fn fetch_bytes(&self, url: &str, dest: &Path) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(url.to_string());

        if dest.exists() {
            return Ok(());
        }
        if self.failures.lock().unwrap().contains(url) {
            return Err(mock_failure("canned fetch failure"));
        }

        let body = self
            .bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| mock_failure("no canned body"))?;
        std::fs::write(dest, body).map_err(|source| ProviderError::Io {
            path: dest.to_path_buf(),
            source,
        })
    }
}

/// Tag writer that records applications instead of touching files.
#[derive(Debug, Default)]
pub struct MockTagWriter {
    applied: Mutex<Vec<(PathBuf, TrackTags)>>,
    fail: Mutex<bool>,
}

impl MockTagWriter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(self) -> Self {
        *self.fail.lock().unwrap() = true;
        self
    }

    pub fn applied(&self) -> Vec<(PathBuf, TrackTags)> {
        self.applied.lock().unwrap().clone()
    }
}

impl TagWriter for MockTagWriter {
    fn apply(&self, path: &Path, tags: &TrackTags) -> Result<(), ProviderError> {
        if *self.fail.lock().unwrap() {
            return Err(ProviderError::Tag {
                path: path.to_path_buf(),
                message: "canned tag failure".to_string(),
            });
        }
        self.applied
            .lock()
            .unwrap()
            .push((path.to_path_buf(), tags.clone()));
        Ok(())
    }
}

/// Encodes a small solid-color JPEG for artwork tests.
pub fn tiny_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([120, 30, 60]),
    ));
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Jpeg,
    )
    .unwrap();
    bytes
}
