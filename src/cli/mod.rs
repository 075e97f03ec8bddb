//! CLI module for PMP Cache-Aside
//!
//! Provides subcommands for exercising the cache-aside layer:
//! - `demo`: walkthrough of cached reads, a write and its invalidation
//! - `stats`: cache store statistics
//! - `flush`: drop every cache entry

pub mod demo;
pub mod flush;
pub mod stats;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::AppConfig;
use crate::infrastructure::logging::LoggingConfig;
use crate::infrastructure::observability;

/// PMP Cache-Aside - Redis-style caching in front of PostgreSQL
#[derive(Parser)]
#[command(name = "pmp-cache-aside")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Walk through cache misses, hits and invalidation
    Demo(demo::DemoArgs),

    /// Print cache store statistics
    Stats(stats::StatsArgs),

    /// Drop every entry in the cache store
    Flush,
}

/// Load `.env` and layered configuration, then start logging and tracing
pub(crate) fn bootstrap() -> AppConfig {
    dotenvy::dotenv().ok();

    let loaded = AppConfig::load();
    let config = loaded.as_ref().cloned().unwrap_or_default();

    observability::init_tracing(
        &LoggingConfig::from(&config.logging),
        &config.observability.tracing,
    );

    if let Err(e) = loaded {
        warn!("Failed to load configuration, using defaults: {}", e);
    }

    config
}

/// Flush pending spans if export was enabled
pub(crate) fn shutdown(config: &AppConfig) {
    if config.observability.tracing.enabled {
        observability::shutdown_tracing();
    }
}
