//! Prometheus metrics for the request/response bus.
//!
//! All metrics follow the naming convention: `qb_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., qb_requests_sent_total)
//! - **Gauge**: Value that can go up or down (e.g., qb_requests_pending)
//! - **Histogram**: Distribution of values (e.g., qb_request_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter,
    Opts, Registry, TextEncoder, DEFAULT_BUCKETS,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // REQUESTER SIDE
    // =========================================================================

    /// Requests published, by request type
    pub static ref REQUESTS_SENT: CounterVec = CounterVec::new(
        Opts::new("qb_requests_sent_total", "Total requests published to the bus"),
        &["request_type"]
    ).expect("metric creation failed");

    /// Terminal outcomes observed by callers
    pub static ref REQUEST_OUTCOMES: CounterVec = CounterVec::new(
        Opts::new("qb_request_outcomes_total", "Terminal request outcomes"),
        &["request_type", "outcome"]  // outcome: resolved/faulted/expired/cancelled
    ).expect("metric creation failed");

    /// Time from registration to terminal outcome
    pub static ref REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "qb_request_duration_seconds",
            "Time between publishing a request and its terminal outcome"
        ).buckets(exponential_buckets(0.001, 2.0, 15).unwrap_or_else(|_| DEFAULT_BUCKETS.to_vec())),
        &["request_type"]
    ).expect("metric creation failed");

    /// Requests currently awaiting a response
    pub static ref PENDING_REQUESTS: Gauge = Gauge::new(
        "qb_requests_pending",
        "Requests currently registered in the pending table"
    ).expect("metric creation failed");

    /// Responses that matched no pending request
    pub static ref ORPHAN_RESPONSES: CounterVec = CounterVec::new(
        Opts::new("qb_orphan_responses_total", "Responses dropped without a waiting caller"),
        &["reason"]
    ).expect("metric creation failed");

    /// Completion attempts that lost a first-writer-wins race
    pub static ref COMPLETION_RACES_LOST: IntCounter = IntCounter::new(
        "qb_completion_races_lost_total",
        "Completion attempts that found the request already settled"
    ).expect("metric creation failed");

    // =========================================================================
    // RESPONDER SIDE
    // =========================================================================

    /// Requests dropped by responders because their deadline had passed
    pub static ref EXPIRED_REQUESTS_SKIPPED: IntCounter = IntCounter::new(
        "qb_responder_expired_requests_total",
        "Requests a responder skipped because they had already expired"
    ).expect("metric creation failed");

    /// Requests handled by responders
    pub static ref REQUESTS_HANDLED: CounterVec = CounterVec::new(
        Opts::new("qb_responder_requests_handled_total", "Requests processed by responders"),
        &["request_type", "result"]  // result: ok/fault
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(REQUESTS_SENT.clone()),
        Box::new(REQUEST_OUTCOMES.clone()),
        Box::new(REQUEST_DURATION.clone()),
        Box::new(PENDING_REQUESTS.clone()),
        Box::new(ORPHAN_RESPONSES.clone()),
        Box::new(COMPLETION_RACES_LOST.clone()),
        Box::new(EXPIRED_REQUESTS_SKIPPED.clone()),
        Box::new(REQUESTS_HANDLED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
