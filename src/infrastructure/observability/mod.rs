//! Observability infrastructure - Tracing and Metrics

mod config;
mod metrics;
mod tracing_setup;

pub use config::{MetricsConfig, ObservabilityConfig, TracingConfig};
pub use metrics::{
    LookupOutcome, LookupShape, PrometheusMetrics, init_metrics, record_cache_lookup,
    record_invalidation, record_store_latency,
};
pub use tracing_setup::{init_tracing, shutdown_tracing};
