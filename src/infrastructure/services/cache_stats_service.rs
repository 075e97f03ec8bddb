//! Cache store statistics reporting

use std::sync::Arc;

use serde::Serialize;

use crate::domain::DomainError;
use crate::domain::cache::{Cache, CacheStats};

/// Operational snapshot of the cache store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatsReport {
    pub connected_clients: u64,
    pub used_memory_bytes: u64,
    /// Memory usage in the cache store's own notation, e.g. `1.50K`
    pub used_memory_human: String,
    pub keyspace_hits: u64,
    pub keyspace_misses: u64,
    /// Percentage of lookups that hit, `0.0` before any lookup
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheStatsReport {
    fn from(stats: CacheStats) -> Self {
        Self {
            connected_clients: stats.connected_clients,
            used_memory_bytes: stats.used_memory_bytes,
            used_memory_human: format_bytes(stats.used_memory_bytes),
            keyspace_hits: stats.keyspace_hits,
            keyspace_misses: stats.keyspace_misses,
            hit_rate: hit_rate(stats.keyspace_hits, stats.keyspace_misses),
        }
    }
}

/// Reads the cache store's counters. Keeps no state of its own.
#[derive(Debug)]
pub struct CacheStatsService {
    cache: Arc<dyn Cache>,
}

impl CacheStatsService {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    pub async fn get_stats(&self) -> Result<CacheStatsReport, DomainError> {
        let stats = self.cache.stats().await?;
        Ok(CacheStatsReport::from(stats))
    }
}

/// `hits / (hits + misses) * 100`
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits as f64 + misses as f64;

    if total == 0.0 {
        return 0.0;
    }

    hits as f64 / total * 100.0
}

/// Formats a byte count with two decimals and a binary unit suffix (`B`, `K`, `M`, `G`, `T`)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["K", "M", "G", "T"];

    if bytes < 1024 {
        return format!("{}B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = UNITS[0];

    for candidate in UNITS {
        value /= 1024.0;
        unit = candidate;

        if value < 1024.0 {
            break;
        }
    }

    format!("{:.2}{}", value, unit)
}
