//! Request/response configuration with validation.
//!
//! Topic and timeout resolution falls back in a fixed order:
//! call-site override, then the per-request-type entry, then the global
//! default.

use crate::domain::message::RequestMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Default reply-to topic
pub const DEFAULT_RESPONSE_TOPIC: &str = "responses";

/// Main request/response configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestResponseConfig {
    /// Topic this bus instance receives responses on
    pub response_topic: String,
    /// Fallback topic for request types without their own entry
    pub default_topic: Option<String>,
    /// Fallback timeout for request types without their own entry
    #[serde(with = "humantime_serde")]
    pub default_timeout: Option<Duration>,
    /// How often the sweeper scans for expired requests
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Per-request-type settings, keyed by request type tag
    pub requests: HashMap<String, RequestTypeSettings>,
}

impl Default for RequestResponseConfig {
    fn default() -> Self {
        Self {
            response_topic: DEFAULT_RESPONSE_TOPIC.to_string(),
            default_topic: None,
            default_timeout: Some(Duration::from_secs(20)),
            sweep_interval: Duration::from_secs(1),
            requests: HashMap::new(),
        }
    }
}

/// Settings for one request type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestTypeSettings {
    pub topic: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl RequestResponseConfig {
    pub fn builder() -> RequestResponseConfigBuilder {
        RequestResponseConfigBuilder::default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.response_topic.trim().is_empty() {
            return Err(ConfigError::EmptyTopic("response_topic".into()));
        }

        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidInterval(
                "sweep_interval cannot be 0".into(),
            ));
        }

        if let Some(topic) = &self.default_topic {
            if topic.trim().is_empty() {
                return Err(ConfigError::EmptyTopic("default_topic".into()));
            }
        }

        if self.default_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::InvalidTimeout(
                "default_timeout cannot be 0".into(),
            ));
        }

        for (request_type, settings) in &self.requests {
            if settings.topic.as_deref().is_some_and(|t| t.trim().is_empty()) {
                return Err(ConfigError::EmptyTopic(format!(
                    "requests.{request_type}.topic"
                )));
            }
            if settings.timeout.is_some_and(|t| t.is_zero()) {
                return Err(ConfigError::InvalidTimeout(format!(
                    "requests.{request_type}.timeout cannot be 0"
                )));
            }
        }

        Ok(())
    }

    /// Settings registered for a request type, if any
    pub fn settings_for(&self, request_type: &str) -> Option<&RequestTypeSettings> {
        self.requests.get(request_type)
    }
}

/// Fluent builder for [`RequestResponseConfig`]
#[derive(Debug, Clone, Default)]
pub struct RequestResponseConfigBuilder {
    config: RequestResponseConfig,
}

impl RequestResponseConfigBuilder {
    pub fn response_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.response_topic = topic.into();
        self
    }

    pub fn default_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.default_topic = Some(topic.into());
        self
    }

    pub fn default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Register settings under an explicit request type tag
    pub fn request(mut self, request_type: impl Into<String>, settings: RequestTypeSettings) -> Self {
        self.config.requests.insert(request_type.into(), settings);
        self
    }

    /// Register settings for a typed request
    pub fn with_request<R: RequestMessage>(
        self,
        topic: Option<&str>,
        timeout: Option<Duration>,
    ) -> Self {
        self.request(
            R::request_type(),
            RequestTypeSettings {
                topic: topic.map(str::to_string),
                timeout,
            },
        )
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<RequestResponseConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Empty topic: {0}")]
    EmptyTopic(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),
}
