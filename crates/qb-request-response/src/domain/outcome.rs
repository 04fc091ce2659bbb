//! Terminal outcomes of a pending request.

use crate::domain::envelope::FaultDetail;
use std::fmt;
use std::time::Duration;

/// The single value a pending request's completion slot is fulfilled with.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Resolved(serde_json::Value),
    Faulted(FaultDetail),
    Expired,
    Cancelled,
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Resolved(_) => OutcomeKind::Resolved,
            Self::Faulted(_) => OutcomeKind::Faulted,
            Self::Expired => OutcomeKind::Expired,
            Self::Cancelled => OutcomeKind::Cancelled,
        }
    }
}

/// Outcome discriminant, used for stats, metrics and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Resolved,
    Faulted,
    Expired,
    Cancelled,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Faulted => "faulted",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the waiter receives: the outcome plus time spent pending.
#[derive(Debug, Clone)]
pub struct Completion {
    pub outcome: Outcome,
    pub elapsed: Duration,
}
