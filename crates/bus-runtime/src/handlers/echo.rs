//! Echo handler: replies with the request's message.
//!
//! Useful as a liveness probe for the request/response path.

use async_trait::async_trait;
use qb_request_response::{FaultDetail, RequestHandler, RequestMessage, SystemTimeSource, TimeSource};
use serde::{Deserialize, Serialize};

/// Topic the echo responder listens on
pub const ECHO_TOPIC: &str = "system.echo";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Echo {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoReply {
    pub message: String,
    pub handled_at_ms: u64,
}

impl RequestMessage for Echo {
    type Response = EchoReply;

    fn request_type() -> &'static str {
        "system.Echo"
    }

    fn response_type() -> &'static str {
        "system.EchoReply"
    }
}

#[derive(Debug, Default)]
pub struct EchoHandler;

#[async_trait]
impl RequestHandler<Echo> for EchoHandler {
    async fn handle(&self, request: Echo) -> Result<EchoReply, FaultDetail> {
        if request.message.is_empty() {
            return Err(FaultDetail::invalid_request("message cannot be empty"));
        }

        Ok(EchoReply {
            message: request.message,
            handled_at_ms: SystemTimeSource.now_millis(),
        })
    }
}
