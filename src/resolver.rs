//! Cache-or-fetch metadata resolution.
//!
//! The resolver is the only component that talks to the external metadata
//! provider. Every resolution goes: classify, consult the cache (unless a
//! refresh is forced), fetch with conservative pacing, write through.
//!
//! A provider failure appends the *raw URL* to the dedup ledger so the same
//! reference is not retried on a later run; within a run the failure is
//! non-fatal and per-item.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::cache::MetadataCache;
use crate::classify::{ClassifyError, classify};
use crate::document::Document;
use crate::ledger::Ledger;
use crate::provider::{ExtractOptions, MetadataProvider, ProviderError};

/// Errors produced by metadata resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The URL could not be classified.
    #[error("bad catalog URL: {0}")]
    BadUrl(#[from] ClassifyError),

    /// The external provider call failed; the URL has been ledgered.
    #[error("metadata fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: ProviderError,
    },
}

/// Cache-backed metadata resolver.
#[derive(Clone)]
pub struct MetadataResolver {
    cache: MetadataCache,
    ledger: Arc<Ledger>,
    provider: Arc<dyn MetadataProvider>,
    options: ExtractOptions,
}

impl MetadataResolver {
    /// Creates a resolver over the given cache, ledger, and provider.
    #[must_use]
    pub fn new(
        cache: MetadataCache,
        ledger: Arc<Ledger>,
        provider: Arc<dyn MetadataProvider>,
        options: ExtractOptions,
    ) -> Self {
        Self {
            cache,
            ledger,
            provider,
            options,
        }
    }

    /// Resolves a catalog URL to its metadata document.
    ///
    /// Without `force_refresh`, repeated calls for the same key are pure
    /// cache reads after the first resolution: the external provider is
    /// contacted at most once per key. With `force_refresh` the provider is
    /// always contacted and the cached snapshot overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::BadUrl`] for unclassifiable URLs and
    /// [`ResolveError::Fetch`] when the provider call fails (in which case
    /// the raw URL is appended to the ledger). Cache write faults are logged
    /// and swallowed; the freshly fetched document is still returned.
    #[instrument(skip(self), fields(url = %url, force_refresh))]
    pub async fn resolve(&self, url: &str, force_refresh: bool) -> Result<Document, ResolveError> {
        let classified = classify(url)?;

        if !force_refresh {
            if let Some(doc) = self.cache.get(classified.kind, &classified.id).await {
                debug!(kind = %classified.kind, id = %classified.id, "cache hit");
                return Ok(doc);
            }
        } else {
            info!("forcing cache refresh");
        }

        info!(kind = %classified.kind, id = %classified.id, "fetching metadata");
        let doc = match self.provider.extract(url, &self.options).await {
            Ok(doc) => doc,
            Err(source) => {
                warn!(error = %source, "metadata fetch failed; ledgering reference");
                if let Err(ledger_error) = self.ledger.append(url) {
                    warn!(error = %ledger_error, "could not ledger failed reference");
                }
                return Err(ResolveError::Fetch {
                    url: url.to_string(),
                    source,
                });
            }
        };

        // Write through. A storage fault here is a data-loss risk we accept:
        // the document is still good for this run.
        let write_result = if force_refresh {
            self.cache.update(classified.kind, &classified.id, &doc).await
        } else {
            self.cache.insert(classified.kind, &classified.id, &doc).await
        };
        if let Err(error) = write_result {
            warn!(%error, "cache write-through failed; continuing");
        }

        Ok(doc)
    }
}
