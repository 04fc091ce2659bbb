//! Shared fixtures for integration tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use qb_request_response::{
    CancellationToken, CorrelationEvent, FanoutSink, FaultDetail, ObservabilitySink, OrphanReason,
    RequestHandler, RequestMessage, RequestResponder, RequestResponseBus, RequestResponseConfig,
    TracingSink,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_bus::InMemoryMessageBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const ORDERS_TOPIC: &str = "orders";
pub const SLOW_TOPIC: &str = "slow";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOrder {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub total_cents: u64,
}

impl RequestMessage for GetOrder {
    type Response = Order;

    fn request_type() -> &'static str {
        "orders.GetOrder"
    }

    fn response_type() -> &'static str {
        "orders.Order"
    }
}

/// Request answered after a delay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowPing {
    pub delay_ms: u64,
}

impl RequestMessage for SlowPing {
    type Response = String;

    fn request_type() -> &'static str {
        "test.SlowPing"
    }
}

/// Order 0 does not exist.
pub struct OrderHandler;

#[async_trait]
impl RequestHandler<GetOrder> for OrderHandler {
    async fn handle(&self, request: GetOrder) -> Result<Order, FaultDetail> {
        if request.id == 0 {
            return Err(FaultDetail::new(404, "order not found")
                .with_data(serde_json::json!({ "id": request.id })));
        }
        Ok(Order {
            id: request.id,
            total_cents: request.id * 100,
        })
    }
}

pub struct SlowHandler;

#[async_trait]
impl RequestHandler<SlowPing> for SlowHandler {
    async fn handle(&self, request: SlowPing) -> Result<String, FaultDetail> {
        tokio::time::sleep(Duration::from_millis(request.delay_ms)).await;
        Ok("pong".to_string())
    }
}

/// Sink that keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CorrelationEvent>>,
}

impl ObservabilitySink for RecordingSink {
    fn record(&self, event: &CorrelationEvent) {
        self.events.lock().push(event.clone());
    }
}

impl RecordingSink {
    pub fn events(&self) -> Vec<CorrelationEvent> {
        self.events.lock().clone()
    }

    pub fn orphans(&self, reason: OrphanReason) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                CorrelationEvent::OrphanResponse {
                    correlation_id,
                    reason: r,
                } if *r == reason => Some(correlation_id.clone()),
                _ => None,
            })
            .collect()
    }
}

/// A bus with a started request/response service and optional responders.
pub struct Harness {
    pub bus: Arc<InMemoryMessageBus>,
    pub requests: Arc<RequestResponseBus>,
    pub sink: Arc<RecordingSink>,
    shutdown: CancellationToken,
    responders: Vec<JoinHandle<()>>,
}

impl Harness {
    pub fn new(config: RequestResponseConfig) -> Self {
        let bus = Arc::new(InMemoryMessageBus::new());
        let sink = Arc::new(RecordingSink::default());
        let fanout = FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(sink.clone());

        let requests = RequestResponseBus::over_shared_bus(Arc::clone(&bus), config)
            .expect("valid config")
            .with_sink(Arc::new(fanout));
        requests.start().expect("valid sweep interval");

        Self {
            bus,
            requests: Arc::new(requests),
            sink,
            shutdown: CancellationToken::new(),
            responders: Vec::new(),
        }
    }

    /// Harness with the order and slow-ping routes configured.
    pub fn standard() -> Self {
        Self::new(standard_config())
    }

    pub fn serve<R, H>(&mut self, topic: &str, handler: H)
    where
        R: RequestMessage + DeserializeOwned + 'static,
        R::Response: Serialize,
        H: RequestHandler<R> + 'static,
    {
        let responder = RequestResponder::new(Arc::clone(&self.bus), topic, handler);
        self.responders
            .push(responder.spawn(self.shutdown.child_token()));
    }

    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for responder in self.responders {
            let _ = responder.await;
        }
        self.requests.shutdown().await;
    }
}

pub fn standard_config() -> RequestResponseConfig {
    RequestResponseConfig::builder()
        .sweep_interval(Duration::from_millis(100))
        .default_timeout(Some(Duration::from_secs(2)))
        .with_request::<GetOrder>(Some(ORDERS_TOPIC), None)
        .with_request::<SlowPing>(Some(SLOW_TOPIC), Some(Duration::from_millis(500)))
        .build()
        .expect("valid config")
}
