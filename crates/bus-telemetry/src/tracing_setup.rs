//! OpenTelemetry span export.
//!
//! Spans are batched and exported over OTLP/gRPC. Sampling is decided once,
//! at the root: a responder continuing a propagated trace follows the
//! requester's decision, so a request and its handling are exported together
//! or not at all.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::runtime;
use opentelemetry_sdk::trace::{Config, RandomIdGenerator, Sampler, TracerProvider};
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::logging::{env_filter, fmt_layer};
use crate::{TelemetryConfig, TelemetryError};

/// Flushes buffered spans and shuts the provider down when dropped.
pub struct TracingGuard {
    provider: TracerProvider,
}

impl TracingGuard {
    pub fn provider(&self) -> &TracerProvider {
        &self.provider
    }
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        for result in self.provider.force_flush() {
            if let Err(e) = result {
                eprintln!("Failed to flush spans: {e:?}");
            }
        }
        if let Err(e) = self.provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {e:?}");
        }
    }
}

/// Install the OTLP exporter plus the log layer as the global subscriber.
pub async fn init_tracing(config: &TelemetryConfig) -> Result<TracingGuard, TelemetryError> {
    let provider = build_provider(config)?;
    let otel_layer = tracing_opentelemetry::layer().with_tracer(provider.tracer(config.full_service_name()));

    tracing_subscriber::registry()
        .with(env_filter(config)?)
        .with(otel_layer)
        .with(fmt_layer(config))
        .try_init()
        .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

    tracing::info!(
        service = %config.full_service_name(),
        otlp_endpoint = %config.otlp_endpoint,
        sample_ratio = config.trace_sample_ratio,
        "OpenTelemetry tracing initialized"
    );

    Ok(TracingGuard { provider })
}

fn build_provider(config: &TelemetryConfig) -> Result<TracerProvider, TelemetryError> {
    if config.otlp_endpoint.is_empty() {
        return Err(TelemetryError::Config("OTLP endpoint is empty".into()));
    }

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(&config.otlp_endpoint);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            Config::default()
                .with_sampler(sampler(config.trace_sample_ratio))
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource(config)),
        )
        .install_batch(runtime::Tokio)
        .map_err(|e| TelemetryError::TracerInit(e.to_string()))
}

/// Attributes identifying this bus node on every exported span.
pub(crate) fn resource(config: &TelemetryConfig) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", config.full_service_name()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        KeyValue::new("deployment.environment", config.environment.clone()),
        KeyValue::new("qb.node_id", config.node_id.clone()),
    ])
}

/// Root sampler for `ratio`; child spans inherit the parent's decision.
pub(crate) fn sampler(ratio: f64) -> Sampler {
    if ratio <= 0.0 {
        Sampler::AlwaysOff
    } else if ratio >= 1.0 {
        Sampler::ParentBased(Box::new(Sampler::AlwaysOn))
    } else {
        Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(ratio)))
    }
}
