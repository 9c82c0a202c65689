//! Typed metadata cache over the per-kind SQLite tables.
//!
//! The cache is a persistent mapping `(entity kind, canonical id) -> raw JSON
//! document`. One table per kind, one row per observed entity, document
//! written atomically per call. Rows are created on first successful fetch,
//! overwritten only on an explicit forced refresh, and never deleted (the
//! cache is unbounded; eviction/TTL is out of scope).
//!
//! Ids and documents are untrusted strings: titles and ids may contain quotes
//! or separator characters, so every statement binds them as parameters.
//! Table names are the only interpolated fragment and come from the closed
//! [`EntityKind`] enum.

use sqlx::Row;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::classify::EntityKind;
use crate::db::Database;
use crate::document::Document;

/// Errors produced by cache write operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An insert targeted a key that already has a row.
    #[error("duplicate cache key {kind}/{id}")]
    DuplicateKey { kind: EntityKind, id: String },

    /// Underlying storage failure.
    #[error("cache storage error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Persistent metadata cache keyed by `(kind, canonical id)`.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    db: Database,
}

impl MetadataCache {
    /// Creates a cache over an initialized database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Looks up the cached document for a key.
    ///
    /// Returns `None` on a miss *and* on any storage-layer fault: a fault is
    /// logged, never propagated, so callers uniformly treat the result as
    /// "must fetch". A row whose stored text no longer parses as JSON is also
    /// reported as a miss.
    #[instrument(skip(self), fields(kind = %kind, id = %id))]
    pub async fn get(&self, kind: EntityKind, id: &str) -> Option<Document> {
        let query = format!("SELECT document FROM {} WHERE item_id = ?", kind.table());

        let row = match sqlx::query(&query)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await
        {
            Ok(row) => row?,
            Err(error) => {
                warn!(%error, "cache read failed; treating as miss");
                return None;
            }
        };

        let raw: String = match row.try_get("document") {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "cache row unreadable; treating as miss");
                return None;
            }
        };

        match Document::parse(&raw) {
            Ok(doc) => Some(doc),
            Err(error) => {
                warn!(%error, "cached document is not valid JSON; treating as miss");
                None
            }
        }
    }

    /// Inserts the document for a key that must not already exist.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::DuplicateKey`] if a row already exists for the
    /// key, or [`CacheError::Database`] on any other storage failure.
    #[instrument(skip(self, doc), fields(kind = %kind, id = %id))]
    pub async fn insert(&self, kind: EntityKind, id: &str, doc: &Document) -> Result<()> {
        let query = format!(
            "INSERT INTO {} (item_id, document) VALUES (?, ?)",
            kind.table()
        );

        sqlx::query(&query)
            .bind(id)
            .bind(doc.to_raw())
            .execute(self.db.pool())
            .await
            .map_err(|error| classify_insert_error(error, kind, id))?;

        Ok(())
    }

    /// Unconditionally overwrites the document for an existing key.
    ///
    /// When the key does not exist this is a silent no-op that succeeds;
    /// long-standing callers rely on that, so it is preserved as-is.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Database`] if the statement fails.
    #[instrument(skip(self, doc), fields(kind = %kind, id = %id))]
    pub async fn update(&self, kind: EntityKind, id: &str, doc: &Document) -> Result<()> {
        let query = format!("UPDATE {} SET document = ? WHERE item_id = ?", kind.table());

        sqlx::query(&query)
            .bind(doc.to_raw())
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }
}

fn classify_insert_error(error: sqlx::Error, kind: EntityKind, id: &str) -> CacheError {
    if let sqlx::Error::Database(db_error) = &error
        && db_error.is_unique_violation()
    {
        return CacheError::DuplicateKey {
            kind,
            id: id.to_string(),
        };
    }
    CacheError::Database(error)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn cache() -> MetadataCache {
        let db = Database::new_in_memory().await.unwrap();
        MetadataCache::new(db)
    }

    fn doc(value: serde_json::Value) -> Document {
        Document::from_value(value)
    }

    #[tokio::test]
    async fn test_cache_get_miss_returns_none() {
        let cache = cache().await;
        assert!(cache.get(EntityKind::Item, "missing").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_insert_then_get_round_trips() {
        let cache = cache().await;
        let document = doc(json!({ "title": "A Song", "id": "abc" }));

        cache
            .insert(EntityKind::Item, "abc", &document)
            .await
            .unwrap();

        let fetched = cache.get(EntityKind::Item, "abc").await.unwrap();
        assert_eq!(fetched.title(), Some("A Song"));
    }

    #[tokio::test]
    async fn test_cache_insert_duplicate_key_fails() {
        let cache = cache().await;
        let document = doc(json!({}));

        cache
            .insert(EntityKind::Collection, "dup", &document)
            .await
            .unwrap();

        let err = cache
            .insert(EntityKind::Collection, "dup", &document)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn test_cache_update_overwrites_existing_document() {
        let cache = cache().await;

        cache
            .insert(EntityKind::Creator, "band", &doc(json!({ "title": "v1" })))
            .await
            .unwrap();
        cache
            .update(EntityKind::Creator, "band", &doc(json!({ "title": "v2" })))
            .await
            .unwrap();

        let fetched = cache.get(EntityKind::Creator, "band").await.unwrap();
        assert_eq!(fetched.title(), Some("v2"));
    }

    #[tokio::test]
    async fn test_cache_update_missing_key_is_silent_noop() {
        let cache = cache().await;

        cache
            .update(EntityKind::Creator, "ghost", &doc(json!({})))
            .await
            .unwrap();

        assert!(cache.get(EntityKind::Creator, "ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_kinds_are_separate_partitions() {
        let cache = cache().await;

        cache
            .insert(EntityKind::Item, "shared-id", &doc(json!({ "title": "item" })))
            .await
            .unwrap();

        assert!(cache.get(EntityKind::Collection, "shared-id").await.is_none());
        assert!(cache.get(EntityKind::Item, "shared-id").await.is_some());
    }

    #[tokio::test]
    async fn test_cache_key_with_quotes_is_injection_safe() {
        let cache = cache().await;
        let hostile_id = r#"x' OR '1'='1"#;
        let document = doc(json!({ "title": r#"She said "hi" / he said 'yo'"# }));

        cache
            .insert(EntityKind::Item, hostile_id, &document)
            .await
            .unwrap();
        cache
            .insert(EntityKind::Item, "innocent", &doc(json!({ "title": "safe" })))
            .await
            .unwrap();

        // Exact-key retrieval returns the original document unaltered.
        let fetched = cache.get(EntityKind::Item, hostile_id).await.unwrap();
        assert_eq!(fetched.title(), Some(r#"She said "hi" / he said 'yo'"#));

        // The hostile update path must not leak into other rows either.
        cache
            .update(
                EntityKind::Item,
                hostile_id,
                &doc(json!({ "title": "updated'; DROP TABLE item; --" })),
            )
            .await
            .unwrap();

        let innocent = cache.get(EntityKind::Item, "innocent").await.unwrap();
        assert_eq!(innocent.title(), Some("safe"));
    }
}
