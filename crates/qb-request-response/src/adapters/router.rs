//! Response Router.
//!
//! Resolves pending requests from inbound responses. Responses that find no
//! waiter are dropped and reported to the observability sink; nothing is
//! raised to callers.

use crate::adapters::pending::PendingRequestTable;
use crate::domain::{FaultDetail, Outcome, OutcomeKind, ResponseBody, ResponseEnvelope};
use crate::ports::{CorrelationEvent, ObservabilitySink, OrphanReason};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to one inbound response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A waiter was completed with this outcome
    Delivered(OutcomeKind),
    Dropped(OrphanReason),
}

#[derive(Clone)]
pub struct ResponseRouter {
    table: Arc<PendingRequestTable>,
    sink: Arc<dyn ObservabilitySink>,
}

impl ResponseRouter {
    pub fn new(table: Arc<PendingRequestTable>, sink: Arc<dyn ObservabilitySink>) -> Self {
        Self { table, sink }
    }

    pub fn on_response_received(&self, response: ResponseEnvelope) -> RouteOutcome {
        let correlation_id = response.correlation_id;

        let Some(expected) = self.table.expected_response_type(&correlation_id) else {
            return self.drop_orphan(correlation_id.to_string(), OrphanReason::Unknown);
        };

        let outcome = match (response.response_type, response.body) {
            (Some(actual), _) if actual != expected => {
                warn!(
                    correlation_id = %correlation_id,
                    expected = %expected,
                    actual = %actual,
                    "Response type mismatch"
                );
                Outcome::Faulted(FaultDetail::response_type_mismatch(&expected, &actual))
            }
            (_, ResponseBody::Payload(payload)) => Outcome::Resolved(payload),
            (_, ResponseBody::Fault(fault)) => Outcome::Faulted(fault),
        };
        let kind = outcome.kind();

        if self.table.try_complete(correlation_id, outcome) {
            debug!(correlation_id = %correlation_id, outcome = %kind, "Routed response");
            RouteOutcome::Delivered(kind)
        } else {
            // Expired or cancelled between lookup and completion
            self.sink.record(&CorrelationEvent::RaceLost {
                correlation_id,
                attempted: kind,
            });
            self.drop_orphan(correlation_id.to_string(), OrphanReason::AlreadyCompleted)
        }
    }

    /// Report a response whose correlation id did not parse.
    pub fn on_malformed_response(&self, raw_correlation_id: &str) -> RouteOutcome {
        self.drop_orphan(raw_correlation_id.to_string(), OrphanReason::MalformedId)
    }

    fn drop_orphan(&self, correlation_id: String, reason: OrphanReason) -> RouteOutcome {
        self.sink.record(&CorrelationEvent::OrphanResponse {
            correlation_id,
            reason,
        });
        RouteOutcome::Dropped(reason)
    }
}
