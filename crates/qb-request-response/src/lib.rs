// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Request/response correlation over the Quantum-Bus.
//!
//! Lets a caller publish a request onto a topic and await the matching
//! response published later by whichever consumer handled it.
//!
//! # Architecture
//!
//! ```text
//!   caller
//!     │ send()
//!     ▼
//! ┌──────────────────────┐  register   ┌──────────────────────┐
//! │  RequestResponseBus  │────────────▶│  PendingRequestTable │◀─── TimeoutSweeper
//! │     (dispatcher)     │◀── outcome ─│  (DashMap + oneshot) │      (Expired)
//! └──────────┬───────────┘             └──────────▲───────────┘
//!            │ publish                            │ try_complete
//!            ▼                                    │
//!        Transport ──▶ [topic] ──▶ responder ──▶ [reply_to] ──▶ ResponseRouter
//! ```
//!
//! Each pending request reaches exactly one outcome: resolved, faulted,
//! expired or cancelled. Whichever of router, sweeper or dispatcher removes
//! the entry first decides it.
//!
//! # Usage
//!
//! ```ignore
//! use qb_request_response::{RequestResponseBus, RequestResponseConfig};
//!
//! let bus = Arc::new(InMemoryMessageBus::new());
//! let config = RequestResponseConfig::builder()
//!     .with_request::<GetOrder>(Some("orders"), None)
//!     .build()?;
//! let requests = RequestResponseBus::over_shared_bus(bus, config)?;
//! requests.start()?;
//!
//! let order = requests.send(GetOrder { id: 7 }, CancellationToken::new()).await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{
    FanoutSink, MetricsSink, PendingRequestTable, RequestHandler, RequestResponder,
    ResponseListener, ResponseRouter, RouteOutcome, SharedBusTransport, TimeoutSweeper,
    TracingSink,
};
pub use domain::{
    ConfigError, ConfigurationError, CorrelationId, FaultDetail, Outcome, OutcomeKind,
    RequestEnvelope, RequestError, RequestMessage, RequestResponseConfig, RequestResult,
    RequestTypeSettings, ResponseBody, ResponseEnvelope, TransportError,
};
pub use ports::{
    ConfigurationProvider, CorrelationEvent, ObservabilitySink, OrphanReason,
    RequestResponseApi, SendOptions, SystemTimeSource, TimeSource, Transport,
};
pub use service::RequestResponseBus;
pub use tokio_util::sync::CancellationToken;
