use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_core::Stream;

use crate::Result;

/// Where the bus stored an acknowledged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Marks a received message as handled for its consumer group.
///
/// Until a message is committed the bus may deliver it again, for example
/// when the consumer restarts or the group is rebalanced. Committing twice
/// is harmless.
#[derive(Clone, Default)]
pub struct CommitHandle {
    commit: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl CommitHandle {
    pub fn new(commit: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            commit: Some(Arc::new(commit)),
        }
    }

    pub fn commit(&self) {
        if let Some(commit) = &self.commit {
            commit();
        }
    }
}

impl fmt::Debug for CommitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitHandle")
            .field("attached", &self.commit.is_some())
            .finish()
    }
}

/// A message received from a subscription.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub committer: CommitHandle,
}

impl BusMessage {
    /// Returns the `(topic, partition, offset)` position of this message.
    pub fn delivery(&self) -> Delivery {
        Delivery {
            topic: self.topic.clone(),
            partition: self.partition,
            offset: self.offset,
        }
    }

    /// Commits this message's offset for the group it was delivered to.
    ///
    /// Call only once the message has been fully handled.
    pub fn commit(&self) {
        self.committer.commit();
    }
}

/// Resolves once the bus acknowledges (or rejects) a sent message.
pub type DeliveryFuture = Pin<Box<dyn Future<Output = Result<Delivery>> + Send + 'static>>;

/// A stream of received messages.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<BusMessage>> + Send>>;

/// Core trait for event bus transports.
///
/// All implementations must be thread-safe (Send + Sync).
pub trait EventBus: Send + Sync {
    /// Enqueues a message on `topic` with the given partition key.
    ///
    /// The message is handed to the transport before this returns, so two
    /// sends with the same key from one caller keep their order. The returned
    /// future only reports the acknowledgment; the caller may drop it without
    /// cancelling the send.
    fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> DeliveryFuture;

    /// Subscribes to `topic` as a member of consumer group `group`.
    ///
    /// Every group receives every message. Within a group each partition is
    /// consumed by one member, in offset order. Delivery resumes from the
    /// group's last committed offset, so messages the subscriber never
    /// [committed](BusMessage::commit) are delivered again.
    fn subscribe(&self, topic: &str, group: &str) -> Result<MessageStream>;
}

impl<T: EventBus + ?Sized> EventBus for Arc<T> {
    fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> DeliveryFuture {
        (**self).send(topic, key, payload)
    }

    fn subscribe(&self, topic: &str, group: &str) -> Result<MessageStream> {
        (**self).subscribe(topic, group)
    }
}
