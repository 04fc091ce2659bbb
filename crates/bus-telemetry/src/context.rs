//! Trace context propagation across the bus.
//!
//! A request and the response it triggers are handled by different tasks,
//! often in different processes. The requester injects its span context into
//! the request headers; the responder extracts it and parents its handling
//! span on it, so both halves land in the same trace.
//!
//! Headers use the W3C `traceparent` layout:
//! `00-<32 hex trace id>-<16 hex span id>-<2 hex flags>`.
//!
//! ## Example
//!
//! ```rust,ignore
//! // Requester
//! let mut headers = BTreeMap::new();
//! TraceContext::extract_current().to_propagated().inject(&mut headers);
//!
//! // Responder
//! let parent = PropagatedContext::extract(&headers).to_context();
//! let span = parent.child_span("orders-service", "handle_request");
//! let _guard = span.enter();
//! ```

use opentelemetry::trace::{
    SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Header carrying the W3C trace parent.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Header carrying vendor trace state, passed through untouched.
pub const TRACESTATE_HEADER: &str = "tracestate";

const INVALID_TRACE_ID: &str = "00000000000000000000000000000000";
const INVALID_SPAN_ID: &str = "0000000000000000";

/// Trace context that can be serialized and sent across process boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagatedContext {
    /// Trace ID (32 hex characters)
    pub trace_id: String,
    /// Parent span ID (16 hex characters)
    pub span_id: String,
    /// Trace flags (sampled, etc.)
    pub trace_flags: u8,
    /// Optional trace state (vendor-specific data)
    pub trace_state: Option<String>,
}

impl PropagatedContext {
    /// Create an empty context (no parent trace)
    pub fn empty() -> Self {
        Self {
            trace_id: INVALID_TRACE_ID.to_string(),
            span_id: INVALID_SPAN_ID.to_string(),
            trace_flags: 0,
            trace_state: None,
        }
    }

    /// Check if this context is valid (has a real trace)
    pub fn is_valid(&self) -> bool {
        !self.trace_id.chars().all(|c| c == '0')
    }

    /// Render as a `traceparent` header value.
    pub fn to_traceparent(&self) -> String {
        format!("00-{}-{}-{:02x}", self.trace_id, self.span_id, self.trace_flags)
    }

    /// Parse a `traceparent` header value. Returns `None` when malformed.
    pub fn from_traceparent(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let (version, trace_id, span_id, flags) =
            (parts.next()?, parts.next()?, parts.next()?, parts.next()?);

        if parts.next().is_some() || version != "00" {
            return None;
        }
        if trace_id.len() != 32 || span_id.len() != 16 || flags.len() != 2 {
            return None;
        }
        if !trace_id
            .chars()
            .chain(span_id.chars())
            .all(|c| c.is_ascii_hexdigit())
        {
            return None;
        }

        Some(Self {
            trace_id: trace_id.to_ascii_lowercase(),
            span_id: span_id.to_ascii_lowercase(),
            trace_flags: u8::from_str_radix(flags, 16).ok()?,
            trace_state: None,
        })
    }

    /// Write this context into message headers. Empty contexts write nothing.
    pub fn inject(&self, headers: &mut BTreeMap<String, String>) {
        if !self.is_valid() {
            return;
        }
        headers.insert(TRACEPARENT_HEADER.to_string(), self.to_traceparent());
        if let Some(state) = &self.trace_state {
            headers.insert(TRACESTATE_HEADER.to_string(), state.clone());
        }
    }

    /// Read a context from message headers, falling back to an empty one.
    pub fn extract(headers: &BTreeMap<String, String>) -> Self {
        let Some(mut ctx) = headers
            .get(TRACEPARENT_HEADER)
            .and_then(|v| Self::from_traceparent(v))
        else {
            return Self::empty();
        };
        ctx.trace_state = headers.get(TRACESTATE_HEADER).cloned();
        ctx
    }

    /// Convert to an OpenTelemetry span context for creating child spans.
    pub fn to_context(&self) -> TraceContext {
        if !self.is_valid() {
            return TraceContext::new();
        }

        let trace_id = TraceId::from_hex(&self.trace_id).unwrap_or(TraceId::INVALID);
        let span_id = SpanId::from_hex(&self.span_id).unwrap_or(SpanId::INVALID);

        let span_context = SpanContext::new(
            trace_id,
            span_id,
            TraceFlags::new(self.trace_flags),
            true, // remote: came from another task or process
            TraceState::default(),
        );

        TraceContext {
            span_context: Some(span_context),
        }
    }
}

impl Default for PropagatedContext {
    fn default() -> Self {
        Self::empty()
    }
}

/// Wrapper for an OpenTelemetry span context with helper methods.
#[derive(Debug, Clone, Default)]
pub struct TraceContext {
    span_context: Option<SpanContext>,
}

impl TraceContext {
    /// Create a new empty trace context.
    pub fn new() -> Self {
        Self { span_context: None }
    }

    /// Extract the trace context of the current `tracing` span.
    pub fn extract_current() -> Self {
        let context = tracing::Span::current().context();
        let span_context = context.span().span_context().clone();

        Self {
            span_context: span_context.is_valid().then_some(span_context),
        }
    }

    /// Convert to a propagatable format for serialization.
    pub fn to_propagated(&self) -> PropagatedContext {
        match &self.span_context {
            Some(ctx) if ctx.is_valid() => PropagatedContext {
                trace_id: ctx.trace_id().to_string(),
                span_id: ctx.span_id().to_string(),
                trace_flags: ctx.trace_flags().to_u8(),
                trace_state: None,
            },
            _ => PropagatedContext::empty(),
        }
    }

    /// Create a span for `operation` in `component`, parented on this context
    /// when it is valid.
    pub fn child_span(&self, component: &str, operation: &str) -> tracing::Span {
        let span = tracing::info_span!(
            "bus_operation",
            component = %component,
            operation = %operation,
        );

        if let Some(ctx) = self.span_context.as_ref().filter(|c| c.is_valid()) {
            let parent = opentelemetry::Context::new().with_remote_span_context(ctx.clone());
            span.set_parent(parent);
        }

        span
    }

    /// Check if this context has a valid trace.
    pub fn is_valid(&self) -> bool {
        self.span_context
            .as_ref()
            .map(|c| c.is_valid())
            .unwrap_or(false)
    }
}
