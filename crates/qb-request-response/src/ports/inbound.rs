//! Inbound port (driving side): the request/response API.

use crate::domain::RequestResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-call options for `send`.
///
/// Unset topic and timeout fall back to the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub topic: Option<String>,
    pub timeout: Option<Duration>,
    pub cancellation: CancellationToken,
    /// Extra headers published with the request
    pub headers: BTreeMap<String, String>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Untyped request/response API.
///
/// Typed helpers (`send`, `send_to_topic`, `send_with_timeout`) live on
/// `RequestResponseBus` and route through the same dispatch path.
#[async_trait]
pub trait RequestResponseApi: Send + Sync {
    /// Publish a request and wait for its response payload.
    async fn send_raw(
        &self,
        request_type: &str,
        response_type: &str,
        payload: serde_json::Value,
        options: SendOptions,
    ) -> RequestResult<serde_json::Value>;

    /// Number of requests currently awaiting a response
    fn pending_count(&self) -> usize;
}
