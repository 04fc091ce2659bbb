//! Pending Request Table.
//!
//! Maps correlation IDs to the completion slot of a waiting `send` call.
//!
//! Flow:
//! 1. Dispatcher calls `register()` and keeps the returned [`Waiter`]
//! 2. Dispatcher publishes the request carrying the correlation ID
//! 3. Router, sweeper or the dispatcher itself calls `try_complete()`
//! 4. Dispatcher receives exactly one [`Completion`]
//!
//! Completion removes the entry before fulfilling it, so whoever removes
//! the entry is the only writer of its outcome.

use crate::domain::{Completion, CorrelationId, Outcome, OutcomeKind};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A request waiting for its outcome
struct PendingRequest {
    sender: oneshot::Sender<Completion>,
    request_type: String,
    response_type: String,
    created_at: Instant,
    expires_at: Instant,
}

/// Dispatcher-side handle of a registered request
#[derive(Debug)]
pub struct Waiter {
    pub correlation_id: CorrelationId,
    pub expires_at: Instant,
    pub receiver: oneshot::Receiver<Completion>,
}

/// Statistics for the pending request table
#[derive(Debug, Default)]
pub struct PendingStats {
    pub total_registered: AtomicU64,
    pub total_resolved: AtomicU64,
    pub total_faulted: AtomicU64,
    pub total_expired: AtomicU64,
    pub total_cancelled: AtomicU64,
    /// Entries unregistered without an outcome (publish failure, dropped caller)
    pub total_removed: AtomicU64,
}

impl PendingStats {
    fn record(&self, kind: OutcomeKind) {
        let counter = match kind {
            OutcomeKind::Resolved => &self.total_resolved,
            OutcomeKind::Faulted => &self.total_faulted,
            OutcomeKind::Expired => &self.total_expired,
            OutcomeKind::Cancelled => &self.total_cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of requests that reached an outcome
    pub fn total_completed(&self) -> u64 {
        self.total_resolved.load(Ordering::Relaxed)
            + self.total_faulted.load(Ordering::Relaxed)
            + self.total_expired.load(Ordering::Relaxed)
            + self.total_cancelled.load(Ordering::Relaxed)
    }
}

/// Concurrent table of outstanding requests.
#[derive(Default)]
pub struct PendingRequestTable {
    pending: DashMap<CorrelationId, PendingRequest>,
    stats: Arc<PendingStats>,
}

impl PendingRequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and get the waiter for its outcome.
    ///
    /// The correlation ID is generated here and is never one already present
    /// in the table.
    pub fn register(&self, request_type: &str, response_type: &str, expires_at: Instant) -> Waiter {
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();

        let correlation_id = loop {
            let candidate = CorrelationId::new();
            match self.pending.entry(candidate) {
                Entry::Occupied(_) => {
                    warn!(correlation_id = %candidate, "Correlation ID collision, regenerating");
                }
                Entry::Vacant(slot) => {
                    slot.insert(PendingRequest {
                        sender: tx,
                        request_type: request_type.to_string(),
                        response_type: response_type.to_string(),
                        created_at: now,
                        expires_at,
                    });
                    break candidate;
                }
            }
        };

        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            correlation_id = %correlation_id,
            request_type = request_type,
            timeout_ms = expires_at.saturating_duration_since(now).as_millis() as u64,
            "Registered pending request"
        );

        Waiter {
            correlation_id,
            expires_at,
            receiver: rx,
        }
    }

    /// Complete a pending request with its outcome.
    ///
    /// Returns true if the request was pending and this call completed it,
    /// false if it was unknown or already completed. A waiter that has
    /// already gone away still counts as completed.
    pub fn try_complete(&self, correlation_id: CorrelationId, outcome: Outcome) -> bool {
        let Some((_, pending)) = self.pending.remove(&correlation_id) else {
            debug!(
                correlation_id = %correlation_id,
                attempted = %outcome.kind(),
                "Completion for unknown or already completed request"
            );
            return false;
        };

        let kind = outcome.kind();
        let elapsed = pending.created_at.elapsed();
        self.stats.record(kind);

        if pending.sender.send(Completion { outcome, elapsed }).is_err() {
            debug!(
                correlation_id = %correlation_id,
                request_type = %pending.request_type,
                "Pending request waiter dropped"
            );
        } else {
            debug!(
                correlation_id = %correlation_id,
                request_type = %pending.request_type,
                outcome = %kind,
                elapsed_ms = elapsed.as_millis() as u64,
                "Completed pending request"
            );
        }

        true
    }

    /// Unregister a request without fulfilling it.
    pub fn remove(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.total_removed.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// IDs of requests whose deadline is at or before `now`.
    pub fn expired(&self, now: Instant) -> Vec<CorrelationId> {
        self.pending
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Response type registered for a pending request
    pub fn expected_response_type(&self, correlation_id: &CorrelationId) -> Option<String> {
        self.pending
            .get(correlation_id)
            .map(|entry| entry.response_type.clone())
    }

    /// Check if a correlation ID is pending
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    /// Get number of currently pending requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Get statistics
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }

    /// Guard that unregisters `correlation_id` when dropped.
    pub fn guard(&self, correlation_id: CorrelationId) -> RegistrationGuard<'_> {
        RegistrationGuard {
            table: self,
            correlation_id,
        }
    }
}

/// Removes a registration on every exit path of the dispatcher, including
/// the caller dropping the `send` future. A no-op once the request has
/// been completed.
pub struct RegistrationGuard<'a> {
    table: &'a PendingRequestTable,
    correlation_id: CorrelationId,
}

impl Drop for RegistrationGuard<'_> {
    fn drop(&mut self) {
        if self.table.remove(&self.correlation_id) {
            debug!(
                correlation_id = %self.correlation_id,
                "Pending request removed without outcome"
            );
        }
    }
}
