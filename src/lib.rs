//! Tunemirror Core Library
//!
//! This library mirrors hierarchical music-catalog metadata (creators,
//! collections, items) into a flat, deduplicated local library. A persistent
//! metadata cache avoids redundant remote lookups and an append-only ledger
//! keeps completed or permanently failed references from being reprocessed
//! across runs.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`classify`] - Catalog URL classification into entity kinds
//! - [`db`] - Database connection and per-kind schema management
//! - [`cache`] - Typed metadata cache over the database
//! - [`ledger`] - Append-only dedup ledger
//! - [`provider`] - External metadata/content/tagging collaborators
//! - [`resolver`] - Cache-or-fetch metadata resolution
//! - [`flatten`] - Hierarchy flattening into ordered track records
//! - [`materialize`] - Idempotent on-disk materialization
//! - [`pipeline`] - Target iteration and run statistics

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod classify;
pub mod config;
pub mod db;
pub mod document;
pub mod flatten;
pub mod ledger;
pub mod materialize;
pub mod pipeline;
pub mod provider;
pub mod resolver;

#[cfg(any(test, feature = "test-util"))]
pub mod test_support;

// Re-export commonly used types
pub use cache::{CacheError, MetadataCache};
pub use classify::{Classified, ClassifyError, EntityKind, classify};
pub use config::Settings;
pub use db::Database;
pub use document::{ChildKind, ChildRef, CreatorArt, CreatorArtKind, Document};
pub use flatten::{FlattenOutput, Flattener, TrackRecord, UNKNOWN_ALBUM};
pub use ledger::{Ledger, LedgerError};
pub use materialize::{Orchestrator, Outcome, crop_square, sanitize_component, strip_promotional};
pub use pipeline::{Pipeline, RunStats, read_targets};
pub use provider::{
    AUDIO_EXTENSION, ArtFetcher, AudioOptions, AudioProvider, ExtractOptions, HttpFetcher,
    LoftyTagWriter, MetadataProvider, PacingOptions, ProviderError, TagWriter, TrackTags,
    YtDlpProvider,
};
pub use resolver::{MetadataResolver, ResolveError};
