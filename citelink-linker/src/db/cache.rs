//! Shared resolution cache in `resolution_cache`

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use citelink_common::{Error, Result};
use sqlx::SqlitePool;
use std::time::Duration;

use super::retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT};
use crate::models::{CacheEntry, ResolutionResult};
use crate::services::cache::{new_entry, ResultCache};

/// SQLite-backed result cache shared by all documents
pub struct SqliteResultCache {
    pool: SqlitePool,
}

impl SqliteResultCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("Invalid cache timestamp '{}': {}", value, e)))
}

#[async_trait]
impl ResultCache for SqliteResultCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT result, created_at, expires_at FROM resolution_cache WHERE text_hash = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some((result_json, created_at, expires_at)) = row else {
            return Ok(None);
        };

        let entry = CacheEntry {
            key: key.to_string(),
            result: serde_json::from_str(&result_json)
                .map_err(|e| Error::InvalidInput(format!("Corrupt cache entry: {}", e)))?,
            created_at: parse_timestamp(&created_at)?,
            expires_at: parse_timestamp(&expires_at)?,
        };

        if entry.is_expired_at(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn put(&self, key: &str, result: &ResolutionResult, ttl: Duration) -> Result<()> {
        let entry = new_entry(key, result, ttl)?;
        let result_json = serde_json::to_string(&entry.result)
            .map_err(|e| Error::Internal(format!("Failed to serialize result: {}", e)))?;
        let created_at = format_timestamp(entry.created_at);
        let expires_at = format_timestamp(entry.expires_at);

        retry_on_lock("cache_put", DEFAULT_MAX_LOCK_WAIT, || async {
            sqlx::query(
                r#"
                INSERT INTO resolution_cache (text_hash, result, created_at, expires_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(text_hash) DO UPDATE SET
                    result = excluded.result,
                    created_at = excluded.created_at,
                    expires_at = excluded.expires_at
                "#,
            )
            .bind(key)
            .bind(&result_json)
            .bind(&created_at)
            .bind(&expires_at)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            Ok(())
        })
        .await
    }

    async fn purge_expired(&self) -> Result<u64> {
        // RFC 3339 in UTC with a fixed format sorts lexically
        let now = format_timestamp(Utc::now());
        let result = sqlx::query("DELETE FROM resolution_cache WHERE expires_at <= ?")
            .bind(&now)
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            tracing::info!(purged, "Expired cache entries purged");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::DEFAULT_CACHE_TTL;
    use crate::services::normalizer::key_for;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        citelink_common::db::init::create_resolution_cache_table(&pool)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_put_get() {
        let cache = SqliteResultCache::new(setup_test_db().await);
        let key = key_for("Smith (2020) Theory");
        let result = ResolutionResult::found("core", "https://x/a.pdf", vec!["core".into()]);

        cache.put(&key, &result, DEFAULT_CACHE_TTL).await.unwrap();

        let entry = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(entry.result, result);
        assert_eq!(entry.key, key);
    }

    #[tokio::test]
    async fn test_expired_is_miss_and_purged() {
        let cache = SqliteResultCache::new(setup_test_db().await);
        let old = key_for("old");
        let fresh = key_for("fresh");
        let negative = ResolutionResult::not_found(vec!["open_library".into()]);

        cache.put(&old, &negative, Duration::ZERO).await.unwrap();
        cache.put(&fresh, &negative, DEFAULT_CACHE_TTL).await.unwrap();

        assert!(cache.get(&old).await.unwrap().is_none());
        assert!(cache.get(&fresh).await.unwrap().unwrap().is_negative());
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejects_malformed_key() {
        let cache = SqliteResultCache::new(setup_test_db().await);
        let result = cache
            .put("short", &ResolutionResult::not_found(vec![]), DEFAULT_CACHE_TTL)
            .await;
        assert!(matches!(result, Err(Error::Database(_))));
    }
}
