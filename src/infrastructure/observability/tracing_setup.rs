//! OpenTelemetry distributed tracing setup

use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource, runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use super::config::TracingConfig;
use crate::infrastructure::logging::{self, LoggingConfig};

/// Initialize console logging, plus OTLP span export when enabled.
///
/// Falls back to console logging alone if the exporter cannot be built.
pub fn init_tracing(logging_config: &LoggingConfig, tracing_config: &TracingConfig) {
    if !tracing_config.enabled {
        logging::init_logging(logging_config);
        return;
    }

    let provider = match build_tracer_provider(tracing_config) {
        Ok(provider) => provider,
        Err(e) => {
            logging::init_logging(logging_config);
            tracing::warn!(
                "Failed to initialize OpenTelemetry: {}. Span export disabled.",
                e
            );
            return;
        }
    };

    let tracer = provider.tracer(tracing_config.service_name.clone());
    let _ = global::set_tracer_provider(provider);

    tracing_subscriber::registry()
        .with(logging::env_filter(&logging_config.level))
        .with(logging::fmt_layer(&logging_config.format))
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();

    tracing::info!(
        "Tracing initialized with OpenTelemetry export to {}",
        tracing_config.otlp_endpoint
    );
}

fn sampler_for(ratio: f64) -> Sampler {
    if ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(ratio)
    }
}

fn build_tracer_provider(
    config: &TracingConfig,
) -> Result<TracerProvider, opentelemetry::trace::TraceError> {
    let resource = Resource::new(vec![KeyValue::new(
        "service.name",
        config.service_name.clone(),
    )]);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_sampler(sampler_for(config.sampling_ratio))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .with_batch_exporter(exporter, runtime::Tokio)
        .build();

    Ok(provider)
}

/// Shutdown tracing and flush pending spans
pub fn shutdown_tracing() {
    global::shutdown_tracer_provider();
    tracing::info!("Tracing shutdown complete");
}
