//! Shared-bus adapter.
//!
//! [`SharedBusTransport`] publishes requests onto the in-memory bus and
//! [`ResponseListener`] feeds responses from the reply-to topic into the
//! [`ResponseRouter`].

use crate::adapters::router::{ResponseRouter, RouteOutcome};
use crate::domain::{
    CorrelationId, RequestEnvelope, ResponseBody, ResponseEnvelope, TransportError,
};
use crate::ports::Transport;
use async_trait::async_trait;
use shared_bus::{BusMessage, InMemoryMessageBus, MessageFilter, MessagePublisher, MessageStream, PublishError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Transport that publishes requests onto an [`InMemoryMessageBus`].
#[derive(Clone)]
pub struct SharedBusTransport {
    bus: Arc<InMemoryMessageBus>,
}

impl SharedBusTransport {
    pub fn new(bus: Arc<InMemoryMessageBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Transport for SharedBusTransport {
    async fn publish(&self, topic: &str, request: RequestEnvelope) -> Result<(), TransportError> {
        let correlation_id = request.correlation_id;
        let message = request_to_message(topic, request);

        let receivers = self.bus.publish(message).await.map_err(|e| match e {
            PublishError::NoSubscribers { topic } => TransportError::NoRoute(topic),
            PublishError::Closed => TransportError::Closed,
        })?;

        debug!(
            correlation_id = %correlation_id,
            topic = topic,
            receivers = receivers,
            "Request delivered to {} subscriber(s)",
            receivers
        );

        Ok(())
    }
}

fn request_to_message(topic: &str, request: RequestEnvelope) -> BusMessage {
    BusMessage::Request {
        correlation_id: request.correlation_id.to_string(),
        topic: topic.to_string(),
        reply_to: request.reply_to,
        request_type: request.request_type,
        expires_at_ms: request.expires_at_ms,
        headers: request.headers,
        payload: request.payload,
    }
}

/// Listens on the reply-to topic and routes responses to pending requests.
///
/// The subscription is taken in [`ResponseListener::new`], so responses
/// published after construction are never missed.
pub struct ResponseListener {
    stream: MessageStream,
    router: ResponseRouter,
    topic: String,
}

impl ResponseListener {
    pub fn new(bus: &InMemoryMessageBus, topic: impl Into<String>, router: ResponseRouter) -> Self {
        let topic = topic.into();
        let stream = bus.message_stream(MessageFilter::responses_on(topic.clone()));

        Self {
            stream,
            router,
            topic,
        }
    }

    /// Route one bus message. Non-response messages are ignored.
    pub fn handle_message(&self, message: BusMessage) -> Option<RouteOutcome> {
        match message {
            BusMessage::Response {
                correlation_id,
                response_type,
                headers,
                result,
                ..
            } => {
                let Ok(id) = CorrelationId::parse(&correlation_id) else {
                    warn!(
                        correlation_id = %correlation_id,
                        "Failed to parse correlation ID from response"
                    );
                    return Some(self.router.on_malformed_response(&correlation_id));
                };

                let body = match result {
                    Ok(payload) => ResponseBody::Payload(payload),
                    Err(fault) => ResponseBody::Fault(fault.into()),
                };

                Some(self.router.on_response_received(ResponseEnvelope {
                    correlation_id: id,
                    response_type,
                    headers,
                    body,
                }))
            }
            BusMessage::Request { .. } => None,
        }
    }

    /// Run until `shutdown` is cancelled or the bus closes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(topic = %self.topic, "Response listener started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.stream.next() => match next {
                    Some(message) => {
                        self.handle_message(message);
                    }
                    None => {
                        warn!(topic = %self.topic, "Message stream ended, stopping listener");
                        break;
                    }
                },
            }
        }

        info!(topic = %self.topic, "Response listener stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
