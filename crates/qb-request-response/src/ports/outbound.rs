//! Outbound ports (driven side): transport, configuration, observability, time.

use crate::domain::{
    ConfigurationError, CorrelationId, OutcomeKind, RequestEnvelope, RequestResponseConfig,
    TransportError,
};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Publish primitive of the underlying bus.
///
/// The transport is also responsible for delivering responses to the
/// router; see `ResponseListener` for the shared-bus wiring.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, topic: &str, request: RequestEnvelope) -> Result<(), TransportError>;
}

/// Source of per-request-type and global defaults.
pub trait ConfigurationProvider: Send + Sync {
    /// Topic this instance receives responses on
    fn response_topic(&self) -> &str;

    fn topic_for(&self, request_type: &str) -> Option<String>;

    fn timeout_for(&self, request_type: &str) -> Option<Duration>;

    fn default_topic(&self) -> Option<String>;

    fn default_timeout(&self) -> Option<Duration>;

    fn sweep_interval(&self) -> Duration;

    /// Explicit topic, then the type-level topic, then the global default.
    fn resolve_topic(
        &self,
        request_type: &str,
        explicit: Option<&str>,
    ) -> Result<String, ConfigurationError> {
        explicit
            .map(str::to_string)
            .or_else(|| self.topic_for(request_type))
            .or_else(|| self.default_topic())
            .ok_or_else(|| ConfigurationError::NoTopicConfigured {
                request_type: request_type.to_string(),
            })
    }

    /// Explicit timeout, then the type-level timeout, then the global default.
    fn resolve_timeout(
        &self,
        request_type: &str,
        explicit: Option<Duration>,
    ) -> Result<Duration, ConfigurationError> {
        explicit
            .or_else(|| self.timeout_for(request_type))
            .or_else(|| self.default_timeout())
            .ok_or_else(|| ConfigurationError::NoTimeoutConfigured {
                request_type: request_type.to_string(),
            })
    }
}

impl ConfigurationProvider for RequestResponseConfig {
    fn response_topic(&self) -> &str {
        &self.response_topic
    }

    fn topic_for(&self, request_type: &str) -> Option<String> {
        self.settings_for(request_type)
            .and_then(|s| s.topic.clone())
    }

    fn timeout_for(&self, request_type: &str) -> Option<Duration> {
        self.settings_for(request_type).and_then(|s| s.timeout)
    }

    fn default_topic(&self) -> Option<String> {
        self.default_topic.clone()
    }

    fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

/// Why a response could not be routed to a waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrphanReason {
    /// No pending request with that id (expired, cancelled, never issued)
    Unknown,
    /// The request was completed by someone else first
    AlreadyCompleted,
    /// The correlation id could not be parsed
    MalformedId,
}

impl OrphanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::AlreadyCompleted => "already_completed",
            Self::MalformedId => "malformed_id",
        }
    }
}

impl fmt::Display for OrphanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notable events in the life of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationEvent {
    RequestSent {
        correlation_id: CorrelationId,
        request_type: String,
        topic: String,
    },
    RequestCompleted {
        correlation_id: CorrelationId,
        request_type: String,
        outcome: OutcomeKind,
        elapsed: Duration,
    },
    /// The sweeper expired a request
    RequestExpired { correlation_id: CorrelationId },
    /// A response arrived that no waiter could take. The id is kept as
    /// received since it may not parse.
    OrphanResponse {
        correlation_id: String,
        reason: OrphanReason,
    },
    /// A completion attempt found the request already completed
    RaceLost {
        correlation_id: CorrelationId,
        attempted: OutcomeKind,
    },
    /// One sweeper pass finished
    SweepCompleted { expired: usize, pending: usize },
}

/// Fire-and-forget event sink
pub trait ObservabilitySink: Send + Sync {
    fn record(&self, event: &CorrelationEvent);
}

/// Wall-clock source for expiry headers
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> u64;
}

/// System time implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            // Clock before Unix epoch
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
