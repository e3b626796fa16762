//! Resolution result cache
//!
//! Entries are keyed only by normalized-text hash and shared by every
//! document. An expired entry is indistinguishable from a missing one.

use async_trait::async_trait;
use chrono::Utc;
use citelink_common::{Error, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::models::{CacheEntry, ResolutionResult};

/// Default lifetime of positive and negative entries
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Store for resolution outcomes
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Unexpired entry for `key`
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Insert or replace the entry for `key`
    async fn put(&self, key: &str, result: &ResolutionResult, ttl: Duration) -> Result<()>;

    /// Drop expired entries, returning how many were removed
    async fn purge_expired(&self) -> Result<u64>;
}

/// Build an entry expiring `ttl` from now
pub fn new_entry(key: &str, result: &ResolutionResult, ttl: Duration) -> Result<CacheEntry> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| Error::InvalidInput(format!("Cache TTL out of range: {}", e)))?;
    let created_at = Utc::now();
    let expires_at = created_at
        .checked_add_signed(ttl)
        .ok_or_else(|| Error::InvalidInput("Cache TTL overflows the calendar".to_string()))?;

    Ok(CacheEntry {
        key: key.to_string(),
        result: result.clone(),
        created_at,
        expires_at,
    })
}

/// Process-local cache
#[derive(Default)]
pub struct MemoryResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResultCache for MemoryResultCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().await;
        let now = Utc::now();
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .cloned())
    }

    async fn put(&self, key: &str, result: &ResolutionResult, ttl: Duration) -> Result<()> {
        let entry = new_entry(key, result, ttl)?;
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = MemoryResultCache::new();
        let result = ResolutionResult::found("core", "https://x/a.pdf", vec!["core".into()]);

        cache.put("k", &result, DEFAULT_CACHE_TTL).await.unwrap();

        let entry = cache.get("k").await.unwrap().unwrap();
        assert_eq!(entry.result, result);
        assert!(entry.expires_at > entry.created_at);
    }

    #[test]
    fn test_ttl_past_calendar_end_is_error() {
        let result = ResolutionResult::not_found(vec![]);
        // Representable as a chrono duration, but ~285,000 years from now
        let err = new_entry("k", &result, Duration::from_secs(9_000_000_000_000)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_negative_results_are_cached() {
        let cache = MemoryResultCache::new();
        let negative = ResolutionResult::not_found(vec!["open_library".into()]);

        cache.put("k", &negative, DEFAULT_CACHE_TTL).await.unwrap();

        let entry = cache.get("k").await.unwrap().unwrap();
        assert!(entry.is_negative());
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss_and_purged() {
        let cache = MemoryResultCache::new();
        let result = ResolutionResult::not_found(vec![]);

        cache.put("old", &result, Duration::ZERO).await.unwrap();
        cache.put("new", &result, DEFAULT_CACHE_TTL).await.unwrap();

        assert!(cache.get("old").await.unwrap().is_none());
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let cache = MemoryResultCache::new();
        cache
            .put("k", &ResolutionResult::not_found(vec![]), DEFAULT_CACHE_TTL)
            .await
            .unwrap();
        let found = ResolutionResult::found("core", "https://x/a.pdf", vec![]);
        cache.put("k", &found, DEFAULT_CACHE_TTL).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().unwrap().result, found);
    }
}
