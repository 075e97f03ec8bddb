//! Redis cache implementation

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, InfoDict};

use crate::domain::DomainError;
use crate::domain::cache::{Cache, CacheStats, KeyStream};

/// Configuration for Redis cache
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Connection timeout
    pub connection_timeout: Duration,
    /// COUNT hint passed to each SCAN call
    pub scan_batch_size: usize,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            connection_timeout: Duration::from_secs(5),
            scan_batch_size: 100,
        }
    }
}

impl RedisCacheConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Sets the connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_scan_batch_size(mut self, size: usize) -> Self {
        self.scan_batch_size = size.max(1);
        self
    }
}

/// Redis cache implementation
///
/// Features:
/// - TTL per entry via `PSETEX` (millisecond precision)
/// - Cursor-based `SCAN` for pattern iteration, never `KEYS`
/// - Stats straight from `INFO`
/// - Connection pooling via ConnectionManager
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

type ScanState = (ConnectionManager, Option<u64>);

impl RedisCache {
    /// Creates a new Redis cache connection
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        let connection =
            tokio::time::timeout(config.connection_timeout, ConnectionManager::new(client))
                .await
                .map_err(|_| {
                    DomainError::cache(format!(
                        "Timed out connecting to Redis after {:?}",
                        config.connection_timeout
                    ))
                })?
                .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection, config })
    }

    fn prefix_key(&self, key: &str) -> String {
        prefix_key(self.config.key_prefix.as_deref(), key)
    }

    async fn next_batch(
        state: ScanState,
        pattern: String,
        batch_size: usize,
    ) -> Result<Option<(Vec<String>, ScanState)>, DomainError> {
        let (mut conn, cursor) = state;

        let Some(cursor) = cursor else {
            return Ok(None);
        };

        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(&pattern)
            .arg("COUNT")
            .arg(batch_size)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::cache(format!(
                    "Failed to scan keys with pattern '{}': {}",
                    pattern, e
                ))
            })?;

        // Cursor 0 means the iteration is complete
        let next_cursor = (next_cursor != 0).then_some(next_cursor);
        Ok(Some((keys, (conn, next_cursor))))
    }
}

fn prefix_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, key),
        None => key.to_string(),
    }
}

/// PSETEX milliseconds; Redis rejects zero, so anything shorter becomes 1 ms
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn unprefix_key(prefix: Option<&str>, key: String) -> String {
    match prefix {
        Some(prefix) => key
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(':'))
            .map(str::to_string)
            .unwrap_or(key),
        None => key,
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let result: Option<String> = conn
            .get(&prefixed_key)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to get key '{}': {}", key, e)))?;

        Ok(result)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let _: () = conn
            .pset_ex(&prefixed_key, value, ttl_millis(ttl))
            .await
            .map_err(|e| DomainError::cache(format!("Failed to set key '{}': {}", key, e)))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let deleted: i32 = conn
            .del(&prefixed_key)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to delete key '{}': {}", key, e)))?;

        Ok(deleted > 0)
    }

    fn scan(&self, pattern: &str) -> KeyStream {
        let prefixed_pattern = self.prefix_key(pattern);
        let prefix = self.config.key_prefix.clone();
        let batch_size = self.config.scan_batch_size;
        let start: ScanState = (self.connection.clone(), Some(0));

        stream::try_unfold(start, move |state| {
            Self::next_batch(state, prefixed_pattern.clone(), batch_size)
        })
        .map_ok(move |keys| {
            let prefix = prefix.clone();
            stream::iter(
                keys.into_iter()
                    .map(move |key| Ok::<_, DomainError>(unprefix_key(prefix.as_deref(), key))),
            )
        })
        .try_flatten()
        .boxed()
    }

    async fn stats(&self) -> Result<CacheStats, DomainError> {
        let mut conn = self.connection.clone();

        let info: InfoDict = redis::cmd("INFO")
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to read INFO: {}", e)))?;

        Ok(CacheStats {
            connected_clients: info.get("connected_clients").unwrap_or(0),
            used_memory_bytes: info.get("used_memory").unwrap_or(0),
            keyspace_hits: info.get("keyspace_hits").unwrap_or(0),
            keyspace_misses: info.get("keyspace_misses").unwrap_or(0),
        })
    }

    async fn flush_all(&self) -> Result<(), DomainError> {
        // With a prefix only our own keys go; otherwise the whole database
        match &self.config.key_prefix {
            Some(_) => {
                self.delete_pattern("*").await?;
            }
            None => {
                let mut conn = self.connection.clone();
                redis::cmd("FLUSHDB")
                    .query_async::<()>(&mut conn)
                    .await
                    .map_err(|e| DomainError::cache(format!("Failed to flush database: {}", e)))?;
            }
        }

        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let ttl_ms: i64 = conn.pttl(&prefixed_key).await.map_err(|e| {
            DomainError::cache(format!("Failed to get TTL for key '{}': {}", key, e))
        })?;

        // Redis returns -2 if key doesn't exist, -1 if no TTL
        if ttl_ms < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_millis(ttl_ms as u64)))
        }
    }
}
