//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging, tracing and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for traces and logs
    pub service_name: String,

    /// Bus node identifier, distinguishes instances sharing a service name
    pub node_id: String,

    /// OpenTelemetry OTLP endpoint
    pub otlp_endpoint: String,

    /// Export spans over OTLP (console logging works without it)
    pub otlp_enabled: bool,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to enable console output (for development)
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Deployment environment (dev, staging, prod)
    pub environment: String,

    /// Fraction of root traces exported, 0.0 to 1.0
    pub trace_sample_ratio: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "quantum-bus".to_string(),
            node_id: "local".to_string(),
            otlp_endpoint: "http://localhost:4317".to_string(),
            otlp_enabled: false,
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            environment: "dev".to_string(),
            trace_sample_ratio: 1.0,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: quantum-bus)
    /// - `QB_NODE_ID`: Node identifier (default: local)
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: http://localhost:4317)
    /// - `QB_OTLP_ENABLED`: Export spans via OTLP (default: false)
    /// - `QB_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `QB_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `QB_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `QB_ENVIRONMENT`: Deployment environment (default: dev)
    /// - `QB_TRACE_SAMPLE_RATIO`: Fraction of root traces exported (default: 1.0)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "quantum-bus".to_string()),

            node_id: env::var("QB_NODE_ID").unwrap_or_else(|_| "local".to_string()),

            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),

            otlp_enabled: env::var("QB_OTLP_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),

            log_level: env::var("QB_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("QB_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("QB_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            environment: env::var("QB_ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()),

            trace_sample_ratio: env::var("QB_TRACE_SAMPLE_RATIO")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|r| r.is_finite())
                .map(|r| r.clamp(0.0, 1.0))
                .unwrap_or(1.0),
        }
    }

    /// Create configuration for a named bus node.
    pub fn for_node(node_id: &str) -> Self {
        let mut config = Self::from_env();
        config.node_id = node_id.to_string();
        config
    }

    /// Get the full service name including the node id.
    pub fn full_service_name(&self) -> String {
        if self.node_id == "local" {
            self.service_name.clone()
        } else {
            format!("{}-{}", self.service_name, self.node_id)
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
