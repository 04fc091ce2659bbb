//! Error types surfaced by `send`.

use crate::domain::correlation::CorrelationId;
use crate::domain::envelope::FaultDetail;
use std::time::Duration;
use thiserror::Error;

/// Result type for request/response operations
pub type RequestResult<T> = Result<T, RequestError>;

/// Terminal failures of a single `send` call.
#[derive(Debug, Error)]
pub enum RequestError {
    /// No topic or timeout could be resolved for the request type.
    #[error("invalid request configuration: {0}")]
    InvalidConfiguration(#[from] ConfigurationError),

    /// The transport rejected the request. No waiter outlives the call.
    #[error("failed to publish request to '{topic}': {source}")]
    PublishFailed {
        topic: String,
        #[source]
        source: TransportError,
    },

    /// The remote handler reported an error inside its response.
    #[error("request handler faulted: {0}")]
    HandlerFaulted(FaultDetail),

    /// No response arrived within the effective timeout.
    #[error("request {correlation_id} timed out after {timeout:?}")]
    Timeout {
        correlation_id: CorrelationId,
        timeout: Duration,
    },

    /// The caller withdrew interest before a response arrived.
    #[error("request cancelled")]
    Cancelled {
        /// Absent when cancellation happened before registration.
        correlation_id: Option<CorrelationId>,
    },

    /// Request encoding or response decoding failed (typed API only).
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RequestError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::PublishFailed { .. } => "publish_failed",
            Self::HandlerFaulted(_) => "handler_faulted",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Whether this is a `Timeout`.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether this is a `Cancelled`.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Default-resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("no topic configured for request type '{request_type}'")]
    NoTopicConfigured { request_type: String },

    #[error("no timeout configured for request type '{request_type}'")]
    NoTimeoutConfigured { request_type: String },
}

/// Errors reported by a transport's publish primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("no route to topic '{0}'")]
    NoRoute(String),

    #[error("transport closed")]
    Closed,

    #[error("publish rejected: {0}")]
    Rejected(String),
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
