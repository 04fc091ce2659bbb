//! # Quantum-Bus Runtime
//!
//! Wires the in-memory message bus, the request/response service and the
//! built-in responders into one process.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, optional JSON file, environment)
//! 2. Initialize telemetry
//! 3. Start the request/response service (sweeper + response listener)
//! 4. Start responders
//! 5. Probe the round trip with an echo request

pub mod handlers;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bus_telemetry::{encode_metrics, register_metrics};
use parking_lot::Mutex;
use qb_request_response::{
    CancellationToken, RequestResponder, RequestResponseBus, RequestResponseConfig,
    RequestMessage, RequestTypeSettings,
};
use shared_bus::{InMemoryMessageBus, DEFAULT_CHANNEL_CAPACITY};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::handlers::{Echo, EchoHandler, EchoReply, ECHO_TOPIC};

/// The runtime owning the bus and everything attached to it.
pub struct BusRuntime {
    bus: Arc<InMemoryMessageBus>,
    requests: Arc<RequestResponseBus>,
    shutdown: CancellationToken,
    responders: Mutex<Vec<JoinHandle<()>>>,
}

impl BusRuntime {
    /// Create the runtime. Nothing runs until [`BusRuntime::start`].
    pub fn new(config: RequestResponseConfig, channel_capacity: usize) -> Result<Self> {
        let bus = Arc::new(InMemoryMessageBus::with_capacity(channel_capacity));
        let requests = RequestResponseBus::over_shared_bus(Arc::clone(&bus), config)
            .context("invalid request/response configuration")?;

        Ok(Self {
            bus,
            requests: Arc::new(requests),
            shutdown: CancellationToken::new(),
            responders: Mutex::new(Vec::new()),
        })
    }

    /// Start the request/response service and the built-in responders.
    pub fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Quantum-Bus Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        self.requests
            .start()
            .context("failed to start request/response service")?;

        let echo = RequestResponder::new(Arc::clone(&self.bus), ECHO_TOPIC, EchoHandler);
        self.responders
            .lock()
            .push(echo.spawn(self.shutdown.child_token()));

        info!(
            subscribers = self.bus.subscriber_count(),
            "Runtime started"
        );
        Ok(())
    }

    /// Send an echo request through the bus and wait for the reply.
    pub async fn probe(&self, message: &str) -> Result<EchoReply> {
        let reply = self
            .requests
            .send(
                Echo {
                    message: message.to_string(),
                },
                self.shutdown.child_token(),
            )
            .await
            .context("echo probe failed")?;
        Ok(reply)
    }

    /// Current Prometheus metrics in text exposition format.
    pub fn metrics_text(&self) -> Result<String> {
        register_metrics().context("failed to register metrics")?;
        encode_metrics().context("failed to encode metrics")
    }

    pub fn requests(&self) -> Arc<RequestResponseBus> {
        Arc::clone(&self.requests)
    }

    pub fn bus(&self) -> Arc<InMemoryMessageBus> {
        Arc::clone(&self.bus)
    }

    /// Stop responders and the request/response service.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        self.shutdown.cancel();
        let responders = std::mem::take(&mut *self.responders.lock());
        for task in responders {
            if let Err(e) = task.await {
                warn!(error = %e, "Responder ended abnormally");
            }
        }
        self.requests.shutdown().await;

        info!("Shutdown complete");
    }
}

/// Load configuration from defaults, an optional JSON file and environment.
///
/// - `QB_CONFIG`: path to a JSON `RequestResponseConfig`
/// - `QB_RESPONSE_TOPIC`: reply-to topic override
/// - `QB_CHANNEL_CAPACITY`: bus channel capacity
pub fn load_config() -> Result<(RequestResponseConfig, usize)> {
    let mut config = match std::env::var("QB_CONFIG") {
        Ok(path) => read_config_file(Path::new(&path))?,
        Err(_) => RequestResponseConfig::default(),
    };

    if let Ok(topic) = std::env::var("QB_RESPONSE_TOPIC") {
        config.response_topic = topic;
    }

    let capacity = match std::env::var("QB_CHANNEL_CAPACITY") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("QB_CHANNEL_CAPACITY is not a number: {value}"))?,
        Err(_) => DEFAULT_CHANNEL_CAPACITY,
    };

    config
        .requests
        .entry(Echo::request_type().to_string())
        .or_insert_with(|| RequestTypeSettings {
            topic: Some(ECHO_TOPIC.to_string()),
            timeout: Some(Duration::from_secs(5)),
        });

    Ok((config, capacity))
}

fn read_config_file(path: &Path) -> Result<RequestResponseConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_round_trip() {
        let (config, capacity) = load_config().unwrap();
        let runtime = BusRuntime::new(config, capacity).unwrap();
        runtime.start().unwrap();

        let reply = runtime.probe("ping").await.unwrap();
        assert_eq!(reply.message, "ping");
        assert_eq!(runtime.requests().pending_table().pending_count(), 0);

        let metrics = runtime.metrics_text().unwrap();
        assert!(metrics.contains("qb_requests_sent_total"));
        assert!(metrics.contains("system.Echo"));

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_probe_is_faulted() {
        let (config, capacity) = load_config().unwrap();
        let runtime = BusRuntime::new(config, capacity).unwrap();
        runtime.start().unwrap();

        let err = runtime.probe("").await.unwrap_err();
        let request_error = err
            .downcast_ref::<qb_request_response::RequestError>()
            .unwrap();
        assert!(matches!(
            request_error,
            qb_request_response::RequestError::HandlerFaulted(_)
        ));

        runtime.shutdown().await;
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RequestResponseConfig {
            sweep_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(BusRuntime::new(config, 16).is_err());
    }

    #[test]
    fn test_echo_route_registered_by_default() {
        let (config, _) = load_config().unwrap();
        let settings = config.settings_for("system.Echo").unwrap();
        assert_eq!(settings.topic.as_deref(), Some(ECHO_TOPIC));
    }
}
