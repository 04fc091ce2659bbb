//! Timeout Sweeper.
//!
//! Periodically expires requests whose deadline has passed. Runs on its own
//! interval; the dispatcher's local deadline covers the gap between ticks.

use crate::adapters::pending::PendingRequestTable;
use crate::domain::{Outcome, OutcomeKind};
use crate::ports::{CorrelationEvent, ObservabilitySink};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct TimeoutSweeper {
    table: Arc<PendingRequestTable>,
    sink: Arc<dyn ObservabilitySink>,
    interval: Duration,
}

impl TimeoutSweeper {
    pub fn new(
        table: Arc<PendingRequestTable>,
        sink: Arc<dyn ObservabilitySink>,
        interval: Duration,
    ) -> Self {
        Self {
            table,
            sink,
            interval,
        }
    }

    /// Expire every request due at `now`. Returns how many this pass expired.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut expired = 0;

        for correlation_id in self.table.expired(now) {
            if self.table.try_complete(correlation_id, Outcome::Expired) {
                expired += 1;
                self.sink
                    .record(&CorrelationEvent::RequestExpired { correlation_id });
            } else {
                self.sink.record(&CorrelationEvent::RaceLost {
                    correlation_id,
                    attempted: OutcomeKind::Expired,
                });
            }
        }

        self.sink.record(&CorrelationEvent::SweepCompleted {
            expired,
            pending: self.table.pending_count(),
        });

        expired
    }

    pub fn sweep_once(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_ms = self.interval.as_millis() as u64, "Timeout sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let expired = self.sweep_once();
                    if expired > 0 {
                        debug!(expired = expired, "Expired pending requests");
                    }
                }
            }
        }

        info!("Timeout sweeper stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
