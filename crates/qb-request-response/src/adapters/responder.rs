//! Request Responder.
//!
//! Consumer side of the protocol: subscribes to a request topic, hands each
//! request of type `R` to a [`RequestHandler`] and publishes the result to
//! the request's reply-to topic.
//!
//! ```text
//! requester ──Request──▶ [topic] ──▶ RequestResponder ──▶ handler
//!     ▲                                     │
//!     └────────Response◀── [reply_to] ◀─────┘
//! ```
//!
//! Requests whose `expires_at_ms` has already passed are skipped: nobody is
//! waiting for them any more.

use crate::domain::{FaultDetail, RequestMessage};
use crate::ports::{SystemTimeSource, TimeSource};
use async_trait::async_trait;
use bus_telemetry::{metrics, PropagatedContext};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_bus::{BusMessage, InMemoryMessageBus, MessageFilter, MessagePublisher, Subscription};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Handles one request type.
#[async_trait]
pub trait RequestHandler<R: RequestMessage>: Send + Sync {
    async fn handle(&self, request: R) -> Result<R::Response, FaultDetail>;
}

pub struct RequestResponder<R, H> {
    bus: Arc<InMemoryMessageBus>,
    handler: Arc<H>,
    subscription: Subscription,
    topic: String,
    time: Arc<dyn TimeSource>,
    _request: PhantomData<fn() -> R>,
}

impl<R, H> RequestResponder<R, H>
where
    R: RequestMessage + DeserializeOwned + 'static,
    R::Response: Serialize,
    H: RequestHandler<R> + 'static,
{
    /// Subscribe to requests on `topic`.
    pub fn new(bus: Arc<InMemoryMessageBus>, topic: impl Into<String>, handler: H) -> Self {
        let topic = topic.into();
        let subscription = bus.subscribe(MessageFilter::requests_on(topic.clone()));

        Self {
            bus,
            handler: Arc::new(handler),
            subscription,
            topic,
            time: Arc::new(SystemTimeSource),
            _request: PhantomData,
        }
    }

    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Run until `shutdown` is cancelled or the bus closes. Each request is
    /// handled on its own task.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            topic = %self.topic,
            request_type = R::request_type(),
            "Request responder started"
        );

        loop {
            let message = tokio::select! {
                _ = shutdown.cancelled() => break,
                message = self.subscription.recv() => message,
            };

            let Some(message) = message else {
                warn!(topic = %self.topic, "Message bus closed, stopping responder");
                break;
            };

            if let Some(task) = self.accept(message) {
                tokio::spawn(task);
            }
        }

        info!(topic = %self.topic, "Request responder stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Decide whether to handle `message`; returns the handling task if so.
    fn accept(
        &self,
        message: BusMessage,
    ) -> Option<impl std::future::Future<Output = ()> + Send + 'static> {
        let BusMessage::Request {
            correlation_id,
            reply_to,
            request_type,
            expires_at_ms,
            headers,
            payload,
            ..
        } = message
        else {
            return None;
        };

        if request_type != R::request_type() {
            debug!(
                correlation_id = %correlation_id,
                request_type = %request_type,
                "Ignoring request of another type"
            );
            return None;
        }

        let now_ms = self.time.now_millis();
        if expires_at_ms <= now_ms {
            warn!(
                correlation_id = %correlation_id,
                request_type = %request_type,
                expired_ms_ago = now_ms - expires_at_ms,
                "Dropping expired request"
            );
            metrics::EXPIRED_REQUESTS_SKIPPED.inc();
            return None;
        }

        let span = PropagatedContext::extract(&headers)
            .to_context()
            .child_span("responder", R::request_type());
        let bus = Arc::clone(&self.bus);
        let handler = Arc::clone(&self.handler);

        Some(
            async move {
                let result = match serde_json::from_value::<R>(payload) {
                    Ok(request) => handler.handle(request).await.and_then(|response| {
                        serde_json::to_value(response)
                            .map_err(|e| FaultDetail::handler_error(format!("failed to encode response: {e}")))
                    }),
                    Err(e) => Err(FaultDetail::invalid_request(format!(
                        "failed to decode request: {e}"
                    ))),
                };

                let label = if result.is_ok() { "ok" } else { "fault" };
                metrics::REQUESTS_HANDLED
                    .with_label_values(&[R::request_type(), label])
                    .inc();

                let response = BusMessage::Response {
                    correlation_id: correlation_id.clone(),
                    topic: reply_to.clone(),
                    response_type: Some(R::response_type().to_string()),
                    headers: BTreeMap::new(),
                    result: result.map_err(Into::into),
                };

                match bus.publish(response).await {
                    Ok(receivers) => debug!(
                        correlation_id = %correlation_id,
                        reply_to = %reply_to,
                        receivers = receivers,
                        "Published response"
                    ),
                    Err(e) => warn!(
                        correlation_id = %correlation_id,
                        reply_to = %reply_to,
                        error = %e,
                        "Failed to publish response"
                    ),
                }
            }
            .instrument(span),
        )
    }
}
