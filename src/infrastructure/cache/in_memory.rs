//! In-memory cache implementation using moka

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use moka::future::Cache as MokaCache;

use crate::domain::DomainError;
use crate::domain::cache::{Cache, CacheStats, KeyPattern, KeyStream};

/// Configuration for in-memory cache
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
    /// Upper bound on any entry's lifetime, whatever TTL it was given
    pub max_ttl: Duration,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            max_ttl: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl InMemoryCacheConfig {
    /// Creates a new configuration with specified max capacity
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }
}

/// Cache entry stored in moka
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Serialized JSON value
    data: String,
    /// Expiration timestamp (millis since epoch)
    expires_at: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Thread-safe in-memory cache implementation using moka
///
/// Features:
/// - TTL per entry, checked on every read
/// - LRU-like eviction when capacity is reached
/// - Keyspace hit/miss counters, like the ones Redis reports in `INFO`
///
/// Clones share the same entries and counters; each live clone counts as one
/// connected client in [`Cache::stats`].
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    cache: MokaCache<String, CacheEntry>,
    counters: Arc<Counters>,
}

impl InMemoryCache {
    /// Creates a new in-memory cache with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    /// Creates a new in-memory cache with the given configuration
    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.max_ttl)
            .build();

        Self {
            cache,
            counters: Arc::new(Counters::default()),
        }
    }

    fn current_time_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn is_expired(entry: &CacheEntry) -> bool {
        Self::current_time_millis() >= entry.expires_at
    }

    fn used_memory_bytes(&self) -> u64 {
        self.cache
            .iter()
            .map(|(key, entry)| (key.len() + entry.data.len()) as u64)
            .sum()
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        let live = match self.cache.get(key).await {
            Some(entry) if Self::is_expired(&entry) => {
                self.cache.remove(key).await;
                None
            }
            other => other,
        };

        match live {
            Some(entry) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.data))
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let expires_at = Self::current_time_millis() + ttl.as_millis() as u64;
        let entry = CacheEntry {
            data: value.to_string(),
            expires_at,
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self
            .cache
            .remove(key)
            .await
            .is_some_and(|entry| !Self::is_expired(&entry)))
    }

    fn scan(&self, pattern: &str) -> KeyStream {
        let pattern = match KeyPattern::new(pattern) {
            Ok(pattern) => pattern,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        // moka iterates its shards without a global lock; expired entries are skipped
        let keys: Vec<Result<String, DomainError>> = self
            .cache
            .iter()
            .filter(|(key, entry)| !Self::is_expired(entry) && pattern.matches(key))
            .map(|(key, _)| Ok(key.as_str().to_string()))
            .collect();

        stream::iter(keys).boxed()
    }

    async fn stats(&self) -> Result<CacheStats, DomainError> {
        Ok(CacheStats {
            connected_clients: Arc::strong_count(&self.counters) as u64,
            used_memory_bytes: self.used_memory_bytes(),
            keyspace_hits: self.counters.hits.load(Ordering::Relaxed),
            keyspace_misses: self.counters.misses.load(Ordering::Relaxed),
        })
    }

    async fn flush_all(&self) -> Result<(), DomainError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError> {
        match self.cache.get(key).await {
            Some(entry) => {
                let now = Self::current_time_millis();

                if entry.expires_at <= now {
                    self.cache.remove(key).await;
                    Ok(None)
                } else {
                    let remaining = entry.expires_at - now;
                    Ok(Some(Duration::from_millis(remaining)))
                }
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheExt;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = InMemoryCache::new();

        let result: Option<String> = cache.get("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = InMemoryCache::new();

        cache
            .set("short", &"value", Duration::from_millis(50))
            .await
            .unwrap();
        assert!(cache.exists("short").await.unwrap());

        tokio::time::sleep(Duration::from_millis(80)).await;

        let result: Option<String> = cache.get("short").await.unwrap();
        assert!(result.is_none());
        assert!(cache.ttl("short").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.delete("key1").await.unwrap());
        assert!(!cache.delete("key1").await.unwrap());

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_scan_matches_pattern() {
        let cache = InMemoryCache::new();

        for key in ["users:age:20-30", "users:age:0-10", "user:1"] {
            cache.set(key, &"v", Duration::from_secs(60)).await.unwrap();
        }

        let mut keys: Vec<String> = cache
            .scan("users:age:*")
            .map(|k| k.unwrap())
            .collect()
            .await;
        keys.sort();

        assert_eq!(keys, vec!["users:age:0-10", "users:age:20-30"]);
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = InMemoryCache::new();

        for key in ["users:age:20-30", "users:age:0-10", "user:1"] {
            cache.set(key, &"v", Duration::from_secs(60)).await.unwrap();
        }

        let deleted = cache.delete_pattern("users:age:*").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(cache.exists("user:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_count_hits_and_misses() {
        let cache = InMemoryCache::new();
        cache.set("k", &1, Duration::from_secs(60)).await.unwrap();

        let _: Option<i32> = cache.get("k").await.unwrap();
        let _: Option<i32> = cache.get("k").await.unwrap();
        let _: Option<i32> = cache.get("nope").await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.keyspace_hits, 2);
        assert_eq!(stats.keyspace_misses, 1);
        assert_eq!(stats.connected_clients, 1);
        assert!(stats.used_memory_bytes > 0);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = InMemoryCache::new();
        let other = cache.clone();

        cache.set("k", &"v", Duration::from_secs(60)).await.unwrap();

        assert!(other.exists("k").await.unwrap());
        assert_eq!(other.stats().await.unwrap().connected_clients, 2);
    }

    #[tokio::test]
    async fn test_flush_all() {
        let cache = InMemoryCache::new();
        cache.set("a", &1, Duration::from_secs(60)).await.unwrap();
        cache.set("b", &2, Duration::from_secs(60)).await.unwrap();

        cache.flush_all().await.unwrap();

        assert!(!cache.exists("a").await.unwrap());
        assert!(!cache.exists("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl() {
        let cache = InMemoryCache::new();
        cache.set("k", &1, Duration::from_secs(120)).await.unwrap();

        let ttl = cache.ttl("k").await.unwrap().unwrap();
        assert!(ttl > Duration::from_secs(110));
        assert!(ttl <= Duration::from_secs(120));
    }
}
