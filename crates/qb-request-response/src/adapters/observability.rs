//! Observability sinks: structured logs, Prometheus metrics, fan-out.

use crate::ports::{CorrelationEvent, ObservabilitySink};
use bus_telemetry::metrics;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn record(&self, event: &CorrelationEvent) {
        match event {
            CorrelationEvent::RequestSent {
                correlation_id,
                request_type,
                topic,
            } => {
                debug!(
                    correlation_id = %correlation_id,
                    request_type = %request_type,
                    topic = %topic,
                    "Request published"
                );
            }
            CorrelationEvent::RequestCompleted {
                correlation_id,
                request_type,
                outcome,
                elapsed,
            } => {
                debug!(
                    correlation_id = %correlation_id,
                    request_type = %request_type,
                    outcome = %outcome,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Request completed"
                );
            }
            CorrelationEvent::RequestExpired { correlation_id } => {
                warn!(correlation_id = %correlation_id, "Request expired by sweeper");
            }
            CorrelationEvent::OrphanResponse {
                correlation_id,
                reason,
            } => {
                warn!(
                    correlation_id = %correlation_id,
                    reason = %reason,
                    "Dropping orphan response"
                );
            }
            CorrelationEvent::RaceLost {
                correlation_id,
                attempted,
            } => {
                debug!(
                    correlation_id = %correlation_id,
                    attempted = %attempted,
                    "Completion race lost"
                );
            }
            CorrelationEvent::SweepCompleted { expired, pending } => {
                trace!(expired = expired, pending = pending, "Sweep completed");
            }
        }
    }
}

/// Updates the Prometheus collectors in `bus_telemetry::metrics`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSink;

impl ObservabilitySink for MetricsSink {
    fn record(&self, event: &CorrelationEvent) {
        match event {
            CorrelationEvent::RequestSent { request_type, .. } => {
                metrics::REQUESTS_SENT
                    .with_label_values(&[request_type.as_str()])
                    .inc();
            }
            CorrelationEvent::RequestCompleted {
                request_type,
                outcome,
                elapsed,
                ..
            } => {
                metrics::REQUEST_OUTCOMES
                    .with_label_values(&[request_type.as_str(), outcome.as_str()])
                    .inc();
                metrics::REQUEST_DURATION
                    .with_label_values(&[request_type.as_str()])
                    .observe(elapsed.as_secs_f64());
            }
            CorrelationEvent::RequestExpired { .. } => {}
            CorrelationEvent::OrphanResponse { reason, .. } => {
                metrics::ORPHAN_RESPONSES
                    .with_label_values(&[reason.as_str()])
                    .inc();
            }
            CorrelationEvent::RaceLost { .. } => {
                metrics::COMPLETION_RACES_LOST.inc();
            }
            CorrelationEvent::SweepCompleted { pending, .. } => {
                metrics::PENDING_REQUESTS.set(*pending as f64);
            }
        }
    }
}

/// Forwards each event to every inner sink, in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ObservabilitySink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Tracing plus metrics
    pub fn standard() -> Self {
        Self::new()
            .with(Arc::new(TracingSink))
            .with(Arc::new(MetricsSink))
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ObservabilitySink for FanoutSink {
    fn record(&self, event: &CorrelationEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}
