//! Cache trait definition - the cache store contract

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::domain::DomainError;

/// Lazily produced keys from a pattern scan
pub type KeyStream = BoxStream<'static, Result<String, DomainError>>;

/// Snapshot of the cache store's own operational counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub connected_clients: u64,
    pub used_memory_bytes: u64,
    /// Cumulative lookups that found a live entry
    pub keyspace_hits: u64,
    /// Cumulative lookups that found nothing
    pub keyspace_misses: u64,
}

/// Volatile key-value store with per-entry expiry
///
/// This trait uses JSON strings internally to be dyn-compatible.
/// Use the helper methods in [`CacheExt`] for typed get/set operations.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Gets a raw JSON value from the cache. Expired entries are absent.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Sets a raw JSON value in the cache with a TTL
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;

    /// Deletes a value from the cache
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Lazily iterates keys matching a glob pattern.
    ///
    /// Implementations walk the keyspace in cursor-sized batches instead of one
    /// blocking bulk command. Keys added or removed during the scan may or may
    /// not be reported.
    fn scan(&self, pattern: &str) -> KeyStream;

    /// Reads the store's own counters
    async fn stats(&self) -> Result<CacheStats, DomainError>;

    /// Drops every entry. Administrative only.
    async fn flush_all(&self) -> Result<(), DomainError>;

    /// Gets the remaining TTL for a key
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError>;

    /// Checks if a key exists in the cache
    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    /// Deletes every key matching the pattern as the scan yields it, returning
    /// how many were removed
    async fn delete_pattern(&self, pattern: &str) -> Result<usize, DomainError> {
        let mut keys = self.scan(pattern);
        let mut deleted = 0;

        while let Some(key) = keys.next().await {
            if self.delete(&key?).await? {
                deleted += 1;
            }
        }

        Ok(deleted)
    }
}

/// Extension trait providing typed get/set operations
pub trait CacheExt: Cache {
    /// Gets a typed value from the cache.
    ///
    /// A payload that does not deserialize is reported as
    /// [`DomainError::Serialization`], distinct from store failures.
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(|e| {
                        DomainError::serialization(format!(
                            "Failed to deserialize cache value for '{}': {}",
                            key, e
                        ))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    /// Sets a typed value in the cache with a TTL
    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let data = serde_json::to_string(value).map_err(|e| {
                DomainError::serialization(format!("Failed to serialize cache value: {}", e))
            })?;
            self.set_raw(key, &data, ttl).await
        }
    }
}

// Blanket implementation for all types implementing Cache
impl<T: Cache + ?Sized> CacheExt for T {}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::cache::KeyPattern;
    use futures::stream;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    /// Mock cache for testing. Entries never expire on their own; each kind of
    /// operation can be made to fail independently.
    #[derive(Debug, Default)]
    pub struct MockCache {
        entries: Mutex<HashMap<String, (String, Duration)>>,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
        fail_deletes: AtomicBool,
        hits: AtomicU64,
        misses: AtomicU64,
    }

    impl MockCache {
        pub fn new() -> Self {
            Self::default()
        }

        /// Store a raw payload as if another writer had put it there
        pub fn with_raw_entry(self, key: &str, value: &str, ttl: Duration) -> Self {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl));
            self
        }

        pub fn with_counters(self, hits: u64, misses: u64) -> Self {
            self.hits.store(hits, Ordering::SeqCst);
            self.misses.store(misses, Ordering::SeqCst);
            self
        }

        /// get_raw fails
        pub fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        /// set_raw fails
        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// delete and scan fail
        pub fn set_fail_deletes(&self, fail: bool) {
            self.fail_deletes.store(fail, Ordering::SeqCst);
        }

        pub fn contains(&self, key: &str) -> bool {
            self.entries.lock().unwrap().contains_key(key)
        }

        pub fn ttl_of(&self, key: &str) -> Option<Duration> {
            self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
        }

        pub fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }

        fn check(flag: &AtomicBool, op: &str) -> Result<(), DomainError> {
            if flag.load(Ordering::SeqCst) {
                return Err(DomainError::cache(format!("Mock cache {} failure", op)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Cache for MockCache {
        async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
            Self::check(&self.fail_reads, "read")?;
            let entries = self.entries.lock().unwrap();

            match entries.get(key) {
                Some((json, _)) => {
                    self.hits.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(json.clone()))
                }
                None => {
                    self.misses.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }
            }
        }

        async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
            Self::check(&self.fail_writes, "write")?;
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl));
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<bool, DomainError> {
            Self::check(&self.fail_deletes, "delete")?;
            Ok(self.entries.lock().unwrap().remove(key).is_some())
        }

        fn scan(&self, pattern: &str) -> KeyStream {
            if let Err(e) = Self::check(&self.fail_deletes, "scan") {
                return stream::once(async move { Err(e) }).boxed();
            }

            let pattern = match KeyPattern::new(pattern) {
                Ok(pattern) => pattern,
                Err(e) => return stream::once(async move { Err(e) }).boxed(),
            };

            let keys: Vec<Result<String, DomainError>> = self
                .entries
                .lock()
                .unwrap()
                .keys()
                .filter(|k| pattern.matches(k))
                .cloned()
                .map(Ok)
                .collect();

            stream::iter(keys).boxed()
        }

        async fn stats(&self) -> Result<CacheStats, DomainError> {
            Self::check(&self.fail_reads, "stats")?;
            Ok(CacheStats {
                connected_clients: 1,
                used_memory_bytes: 0,
                keyspace_hits: self.hits.load(Ordering::SeqCst),
                keyspace_misses: self.misses.load(Ordering::SeqCst),
            })
        }

        async fn flush_all(&self) -> Result<(), DomainError> {
            Self::check(&self.fail_deletes, "flush")?;
            self.entries.lock().unwrap().clear();
            Ok(())
        }

        async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError> {
            Self::check(&self.fail_reads, "ttl")?;
            Ok(self.ttl_of(key))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_cache_set_get() {
            let cache = MockCache::new();
            cache
                .set("key1", &"value1", Duration::from_secs(60))
                .await
                .unwrap();

            let result: Option<String> = cache.get("key1").await.unwrap();
            assert_eq!(result, Some("value1".to_string()));
        }

        #[tokio::test]
        async fn test_mock_cache_malformed_payload() {
            let cache = MockCache::new().with_raw_entry("key1", "{not json", Duration::from_secs(1));

            let result: Result<Option<Vec<u32>>, _> = cache.get("key1").await;
            assert!(matches!(result, Err(DomainError::Serialization { .. })));
        }

        #[tokio::test]
        async fn test_mock_cache_read_failure() {
            let cache = MockCache::new();
            cache.set_fail_reads(true);

            let result: Result<Option<String>, _> = cache.get("key").await;
            assert!(matches!(result, Err(DomainError::Cache { .. })));
        }

        #[tokio::test]
        async fn test_mock_cache_delete_pattern() {
            let cache = MockCache::new();
            for key in ["users:age:1-2", "users:age:3-4", "user:1"] {
                cache.set(key, &"data", Duration::from_secs(60)).await.unwrap();
            }

            let deleted = cache.delete_pattern("users:age:*").await.unwrap();
            assert_eq!(deleted, 2);
            assert_eq!(cache.len(), 1);
            assert!(cache.contains("user:1"));
        }

        #[tokio::test]
        async fn test_mock_cache_delete_pattern_failure() {
            let cache = MockCache::new();
            cache.set_fail_deletes(true);

            assert!(cache.delete_pattern("users:*").await.is_err());
        }

        #[tokio::test]
        async fn test_mock_cache_counts_hits_and_misses() {
            let cache = MockCache::new();
            cache.set("k", &1, Duration::from_secs(60)).await.unwrap();

            let _: Option<i32> = cache.get("k").await.unwrap();
            let _: Option<i32> = cache.get("missing").await.unwrap();

            let stats = cache.stats().await.unwrap();
            assert_eq!(stats.keyspace_hits, 1);
            assert_eq!(stats.keyspace_misses, 1);
        }
    }
}
