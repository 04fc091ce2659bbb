//! Request and response envelopes exchanged with the transport.

use crate::domain::correlation::CorrelationId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A request as handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub correlation_id: CorrelationId,
    /// Topic the request is published to
    pub topic: String,
    /// Topic the responder publishes the response to
    pub reply_to: String,
    pub request_type: String,
    /// Wall-clock deadline (unix milliseconds)
    pub expires_at_ms: u64,
    pub headers: BTreeMap<String, String>,
    pub payload: serde_json::Value,
}

/// A response as delivered to the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub correlation_id: CorrelationId,
    /// Response type tag, if the responder attached one
    pub response_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: ResponseBody,
}

impl ResponseEnvelope {
    /// Successful response.
    pub fn payload(correlation_id: CorrelationId, payload: serde_json::Value) -> Self {
        Self {
            correlation_id,
            response_type: None,
            headers: BTreeMap::new(),
            body: ResponseBody::Payload(payload),
        }
    }

    /// Fault response.
    pub fn fault(correlation_id: CorrelationId, fault: FaultDetail) -> Self {
        Self {
            correlation_id,
            response_type: None,
            headers: BTreeMap::new(),
            body: ResponseBody::Fault(fault),
        }
    }

    /// Attach a response type tag.
    pub fn with_response_type(mut self, response_type: impl Into<String>) -> Self {
        self.response_type = Some(response_type.into());
        self
    }
}

/// Body of a response: either the handler's payload or its fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseBody {
    Payload(serde_json::Value),
    Fault(FaultDetail),
}

/// Handler-side failure reported inside a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultDetail {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl FaultDetail {
    /// Generic handler failure
    pub const HANDLER_ERROR: i32 = -32000;
    /// Handler could not decode the request payload
    pub const INVALID_REQUEST: i32 = -32600;
    /// Response carried a type tag other than the one the caller expects
    pub const RESPONSE_TYPE_MISMATCH: i32 = -32010;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn handler_error(message: impl Into<String>) -> Self {
        Self::new(Self::HANDLER_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, message)
    }

    pub fn response_type_mismatch(expected: &str, actual: &str) -> Self {
        Self::new(
            Self::RESPONSE_TYPE_MISMATCH,
            format!("expected response type '{expected}', got '{actual}'"),
        )
        .with_data(serde_json::json!({ "expected": expected, "actual": actual }))
    }
}

impl fmt::Display for FaultDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for FaultDetail {}

impl From<shared_bus::MessageFault> for FaultDetail {
    fn from(fault: shared_bus::MessageFault) -> Self {
        Self {
            code: fault.code,
            message: fault.message,
            data: fault.data,
        }
    }
}

impl From<FaultDetail> for shared_bus::MessageFault {
    fn from(fault: FaultDetail) -> Self {
        Self {
            code: fault.code,
            message: fault.message,
            data: fault.data,
        }
    }
}
