//! Adapters layer: the pending table and its drivers, plus shared-bus wiring.

pub mod bus_adapter;
pub mod observability;
pub mod pending;
pub mod responder;
pub mod router;
pub mod sweeper;

pub use bus_adapter::{ResponseListener, SharedBusTransport};
pub use observability::{FanoutSink, MetricsSink, TracingSink};
pub use pending::{PendingRequestTable, PendingStats, RegistrationGuard, Waiter};
pub use responder::{RequestHandler, RequestResponder};
pub use router::{ResponseRouter, RouteOutcome};
pub use sweeper::TimeoutSweeper;
