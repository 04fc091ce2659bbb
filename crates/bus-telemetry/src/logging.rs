//! Structured logging.
//!
//! Logs carry consistent fields so aggregators can index them:
//! - `level`, `target`, `message`
//! - `component`: bus component (dispatcher, router, sweeper, responder)
//! - `correlation_id`: present on every per-request log line

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{TelemetryConfig, TelemetryError};

/// Structured logger handle
pub struct StructuredLogger {
    json: bool,
}

impl StructuredLogger {
    /// Whether logs are emitted as JSON.
    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Initialize console logging without span export.
///
/// Used when OTLP export is disabled; `init_tracing` installs the same
/// format layer together with the OpenTelemetry layer.
pub fn init_logging(config: &TelemetryConfig) -> Result<StructuredLogger, TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter(config)?)
        .with(fmt_layer(config))
        .try_init()
        .map_err(|e| TelemetryError::LoggerInit(e.to_string()))?;

    tracing::debug!(
        json_logs = config.json_logs,
        log_level = %config.log_level,
        "Structured logging configured"
    );

    Ok(StructuredLogger {
        json: config.json_logs,
    })
}

pub(crate) fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Config(e.to_string()))
}

/// Console layer: JSON for containers, pretty for development, absent when
/// console output is disabled.
pub(crate) fn fmt_layer<S>(config: &TelemetryConfig) -> Option<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    if !config.console_output {
        return None;
    }

    let layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(true)
            .boxed()
    };

    Some(layer)
}

/// Log a request-scoped event with standard fields.
#[macro_export]
macro_rules! log_request_event {
    ($level:ident, $component:expr, $msg:expr, $correlation_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            correlation_id = %$correlation_id,
            $($($field)*,)?
            $msg
        )
    };
}
