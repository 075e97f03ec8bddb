//! Infrastructure services

mod cache_stats_service;
mod user_cache_service;

pub use cache_stats_service::{CacheStatsReport, CacheStatsService, format_bytes, hit_rate};
pub use user_cache_service::{CachePolicy, UserCacheService, WriteResult};
