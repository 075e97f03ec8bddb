//! Prometheus metrics infrastructure

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

/// Prometheus metrics handle; `render` produces the text exposition format
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

impl PrometheusMetrics {
    /// Get the metrics as a string in Prometheus text format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_default_metrics();

            tracing::info!("Prometheus metrics recorder installed");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

fn register_default_metrics() {
    gauge!("cache_aside_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Shape of a coordinated read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupShape {
    Point,
    Range,
}

impl LookupShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupShape::Point => "point",
            LookupShape::Range => "range",
        }
    }
}

/// Where a coordinated read was answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Hit,
    Miss,
    /// The cache failed and the read fell back to the record store
    Degraded,
}

impl LookupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupOutcome::Hit => "hit",
            LookupOutcome::Miss => "miss",
            LookupOutcome::Degraded => "degraded",
        }
    }
}

/// Record a coordinated read
pub fn record_cache_lookup(shape: LookupShape, outcome: LookupOutcome) {
    let labels = [
        ("shape", shape.as_str().to_string()),
        ("result", outcome.as_str().to_string()),
    ];

    counter!("cache_aside_lookups_total", &labels).increment(1);
}

/// Record an invalidation attempt after a write
pub fn record_invalidation(kind: &str, success: bool) {
    let labels = [
        ("kind", kind.to_string()),
        ("status", if success { "success" } else { "error" }.to_string()),
    ];

    counter!("cache_aside_invalidations_total", &labels).increment(1);
}

/// Record how long a record store call took
pub fn record_store_latency(operation: &str, duration: Duration, success: bool) {
    let labels = [
        ("operation", operation.to_string()),
        ("status", if success { "success" } else { "error" }.to_string()),
    ];

    histogram!("cache_aside_store_duration_seconds", &labels).record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_values() {
        assert_eq!(LookupShape::Point.as_str(), "point");
        assert_eq!(LookupShape::Range.as_str(), "range");
        assert_eq!(LookupOutcome::Hit.as_str(), "hit");
        assert_eq!(LookupOutcome::Degraded.as_str(), "degraded");
    }

    #[test]
    fn test_init_metrics_disabled() {
        let config = MetricsConfig { enabled: false };

        assert!(init_metrics(&config).is_none());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_cache_lookup(LookupShape::Point, LookupOutcome::Miss);
        record_invalidation("point", true);
        record_store_latency("get", Duration::from_millis(3), true);
    }
}
