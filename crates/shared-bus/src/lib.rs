//! # Shared Bus - In-Memory Message Bus
//!
//! Topic-addressed publish/subscribe bus used as the transport underneath the
//! request/response core.
//!
//! ```text
//! ┌──────────────┐   Request{topic}    ┌──────────────┐
//! │  Requester   │ ──────┐             │  Responder   │
//! │              │       │             │              │
//! └──────────────┘       ▼             └──────────────┘
//!        ↑         ┌──────────────┐           │
//!        │         │  Message Bus │ ◀─────────┘
//!        └──────── │              │  Response{reply_to}
//!                  └──────────────┘
//! ```
//!
//! ## Delivery Rules
//!
//! - A publish is rejected with `PublishError::NoSubscribers` when no live
//!   subscription accepts the topic (the message would otherwise vanish).
//! - Publishing happens-before delivery to every subscription that existed at
//!   publish time.
//! - Slow subscribers lag and lose the oldest messages instead of blocking
//!   publishers.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{BusMessage, MessageFault, MessageFilter, MessageKind};
pub use publisher::{InMemoryMessageBus, MessagePublisher, PublishError};
pub use subscriber::{MessageStream, Subscription, SubscriptionError};

/// Maximum messages to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
