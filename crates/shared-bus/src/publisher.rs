//! # Message Publisher
//!
//! Defines the publishing side of the bus.

use crate::events::{BusMessage, MessageFilter};
use crate::subscriber::{MessageStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors from publish operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// No subscription accepts the message's topic, so it would be lost.
    #[error("no subscribers for topic '{topic}'")]
    NoSubscribers {
        /// Topic the message was published to.
        topic: String,
    },

    /// The bus was closed.
    #[error("message bus closed")]
    Closed,
}

/// Trait for publishing messages to the bus.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish a message to the bus.
    ///
    /// # Returns
    ///
    /// The number of active subscriptions whose topic filter accepts the message.
    async fn publish(&self, message: BusMessage) -> Result<usize, PublishError>;

    /// Get the total number of messages published.
    fn messages_published(&self) -> u64;
}

/// Registered subscription filters, keyed by subscription id.
pub(crate) type FilterRegistry = Arc<RwLock<Vec<(u64, MessageFilter)>>>;

/// In-memory implementation of the message bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
/// Suitable for single-node operation and tests; a broker-backed transport
/// would replace it in a distributed deployment.
pub struct InMemoryMessageBus {
    /// Broadcast sender for messages.
    sender: broadcast::Sender<BusMessage>,

    /// Active subscription filters.
    filters: FilterRegistry,

    /// Next subscription id.
    next_subscription: AtomicU64,

    /// Total messages published.
    messages_published: AtomicU64,

    /// Set once `close()` has been called.
    closed: AtomicBool,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryMessageBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            filters: Arc::new(RwLock::new(Vec::new())),
            next_subscription: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            capacity,
        }
    }

    /// Subscribe to messages matching a filter.
    ///
    /// Returns a `Subscription` handle that can be used to receive messages.
    #[must_use]
    pub fn subscribe(&self, filter: MessageFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut filters) = self.filters.write() {
            filters.push((id, filter.clone()));
        }

        debug!(topics = ?filter.topics, kinds = ?filter.kinds, "New subscription created");

        Subscription::new(receiver, filter, self.filters.clone(), id)
    }

    /// Get a stream of messages matching a filter.
    #[must_use]
    pub fn message_stream(&self, filter: MessageFilter) -> MessageStream {
        MessageStream::new(self.subscribe(filter))
    }

    /// Number of live subscriptions whose topic filter accepts `topic`.
    #[must_use]
    pub fn subscribers_for(&self, topic: &str) -> usize {
        self.filters
            .read()
            .map(|filters| filters.iter().filter(|(_, f)| f.accepts_topic(topic)).count())
            .unwrap_or(0)
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reject all further publishes.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        debug!("Message bus closed");
    }

    /// Whether `close()` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryMessageBus {
    async fn publish(&self, message: BusMessage) -> Result<usize, PublishError> {
        if self.is_closed() {
            return Err(PublishError::Closed);
        }

        let topic = message.topic().to_string();
        let interested = self.subscribers_for(&topic);

        // Always increment counter (message was attempted)
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        if interested == 0 {
            warn!(
                topic = %topic,
                correlation_id = %message.correlation_id(),
                "Message dropped (no subscribers for topic)"
            );
            return Err(PublishError::NoSubscribers { topic });
        }

        match self.sender.send(message) {
            Ok(receivers) => {
                debug!(
                    topic = %topic,
                    receivers = receivers,
                    interested = interested,
                    "Message published"
                );
                Ok(interested)
            }
            Err(_) => {
                // Filters were registered but every receiver has since been dropped
                warn!(topic = %topic, "Message dropped (receivers gone)");
                Err(PublishError::NoSubscribers { topic })
            }
        }
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}
