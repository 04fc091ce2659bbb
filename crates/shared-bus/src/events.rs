//! # Bus Messages
//!
//! Defines the message types that flow through the shared bus.
//!
//! The bus only knows about two shapes of traffic: requests published onto a
//! service topic, and responses published back onto the requester's reply-to
//! topic. Correlation ids travel as plain strings; interpreting them is the
//! job of the request/response core, not the bus.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All messages that can be published to the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusMessage {
    /// A request expecting a correlated response on `reply_to`.
    Request {
        /// Unique correlation ID to match request/response.
        correlation_id: String,
        /// Topic the request was published to.
        topic: String,
        /// Topic the responder must publish the response to.
        reply_to: String,
        /// Request type tag (e.g., "orders.GetOrder").
        request_type: String,
        /// Wall-clock deadline in unix milliseconds. Responders drop
        /// requests that are already past it.
        expires_at_ms: u64,
        /// Free-form headers (trace context, etc.).
        headers: BTreeMap<String, String>,
        /// Request body as JSON.
        payload: serde_json::Value,
    },

    /// Response to an earlier request.
    Response {
        /// Correlation ID matching the original request.
        correlation_id: String,
        /// Topic the response is published to (the request's reply-to).
        topic: String,
        /// Response type tag, when the responder knows it.
        response_type: Option<String>,
        /// Free-form headers.
        headers: BTreeMap<String, String>,
        /// Result (Ok payload or Err with a handler fault).
        result: Result<serde_json::Value, MessageFault>,
    },
}

/// Handler-side failure carried inside a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageFault {
    /// Application error code.
    pub code: i32,
    /// Error message.
    pub message: String,
    /// Optional structured details.
    pub data: Option<serde_json::Value>,
}

/// Message kinds for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// `BusMessage::Request`
    Request,
    /// `BusMessage::Response`
    Response,
}

impl BusMessage {
    /// Get the topic this message was published to.
    #[must_use]
    pub fn topic(&self) -> &str {
        match self {
            Self::Request { topic, .. } | Self::Response { topic, .. } => topic,
        }
    }

    /// Get the correlation id carried by this message.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Request { correlation_id, .. } | Self::Response { correlation_id, .. } => {
                correlation_id
            }
        }
    }

    /// Get the message kind.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Request { .. } => MessageKind::Request,
            Self::Response { .. } => MessageKind::Response,
        }
    }
}

/// Filter for subscribing to specific messages.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<String>,
    /// Kinds to include. Empty means all kinds.
    pub kinds: Vec<MessageKind>,
}

impl MessageFilter {
    /// Create a filter that accepts all messages.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
            kinds: Vec::new(),
        }
    }

    /// Restrict the filter to one message kind.
    #[must_use]
    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kinds.push(kind);
        self
    }

    /// Requests on a single topic.
    #[must_use]
    pub fn requests_on(topic: impl Into<String>) -> Self {
        Self::topics([topic]).with_kind(MessageKind::Request)
    }

    /// Responses on a single topic.
    #[must_use]
    pub fn responses_on(topic: impl Into<String>) -> Self {
        Self::topics([topic]).with_kind(MessageKind::Response)
    }

    /// Check if the filter accepts messages on `topic`, ignoring kind.
    #[must_use]
    pub fn accepts_topic(&self, topic: &str) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| t == topic)
    }

    /// Check if a message matches this filter.
    #[must_use]
    pub fn matches(&self, message: &BusMessage) -> bool {
        let kind_match = self.kinds.is_empty() || self.kinds.contains(&message.kind());
        kind_match && self.accepts_topic(message.topic())
    }
}
