//! Lifecycle event publishing.

use std::sync::Arc;

use common::LifecycleEvent;
use event_bus::{Delivery, EventBus};
use metrics::counter;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::PublishError;

/// Handle to the task observing the outcome of one publish.
///
/// Dropping the handle does not cancel delivery or its logging.
#[derive(Debug)]
pub struct PublishHandle(JoinHandle<Result<Delivery, PublishError>>);

impl PublishHandle {
    /// Waits for the bus to acknowledge or reject the event.
    pub async fn outcome(self) -> Result<Delivery, PublishError> {
        self.0
            .await
            .map_err(|e| PublishError::Task(e.to_string()))?
    }
}

impl From<JoinHandle<Result<Delivery, PublishError>>> for PublishHandle {
    fn from(handle: JoinHandle<Result<Delivery, PublishError>>) -> Self {
        Self(handle)
    }
}

/// Announces lifecycle events to downstream consumers.
///
/// `publish` never blocks on delivery and never fails to the caller. The
/// outcome is observed on a separate task; failed events are logged and
/// dropped, never retried.
pub trait EventPublisher: Send + Sync {
    /// Hands `event` to the transport and returns immediately.
    ///
    /// Must be called from within a Tokio runtime.
    fn publish(&self, event: LifecycleEvent) -> PublishHandle;
}

impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    fn publish(&self, event: LifecycleEvent) -> PublishHandle {
        (**self).publish(event)
    }
}

/// Publishes lifecycle events as JSON on a bus topic, keyed by order id.
///
/// All events for one order share a key and therefore a partition, so they
/// reach consumers in the order they were published.
#[derive(Debug, Clone)]
pub struct OrderEventPublisher<B: EventBus> {
    bus: B,
    topic: String,
}

impl<B: EventBus> OrderEventPublisher<B> {
    /// Creates a publisher sending to `topic` on `bus`.
    pub fn new(bus: B, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
        }
    }
}

impl<B: EventBus> EventPublisher for OrderEventPublisher<B> {
    fn publish(&self, event: LifecycleEvent) -> PublishHandle {
        let key = event.partition_key();
        let span = tracing::info_span!(
            "publish",
            topic = %self.topic,
            key = %key,
            event_type = %event.event_type,
        );

        // The send itself happens here, before returning, so that two
        // publishes for the same order keep their relative order.
        let sent = span.in_scope(|| match serde_json::to_vec(&event) {
            Ok(payload) => Ok(self.bus.send(&self.topic, &key, payload)),
            Err(e) => Err(PublishError::Serialization(e)),
        });

        let notify = async move {
            let outcome = match sent {
                Ok(delivery) => delivery.await.map_err(PublishError::from),
                Err(e) => Err(e),
            };

            match &outcome {
                Ok(delivery) => {
                    tracing::info!(
                        partition = delivery.partition,
                        offset = delivery.offset,
                        "Lifecycle event published"
                    );
                    counter!("order_events_published_total").increment(1);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to publish lifecycle event");
                    counter!("order_events_publish_failures_total").increment(1);
                }
            }

            outcome
        };

        tokio::spawn(notify.instrument(span)).into()
    }
}
