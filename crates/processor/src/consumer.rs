//! Bus consumer feeding lifecycle events to the processor.

use std::collections::HashMap;
use std::sync::Arc;

use common::LifecycleEvent;
use event_bus::{BusMessage, EventBus, MessageStream};
use futures_util::StreamExt;
use metrics::counter;
use order_store::OrderStore;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::error::ProcessError;
use crate::processor::OrderEventProcessor;
use crate::work::ProcessingWork;

/// Messages queued per partition worker before routing waits for it.
pub const PARTITION_BUFFER: usize = 64;

/// Consumes lifecycle events from a bus topic as one consumer group member.
///
/// Messages are routed to one worker task per partition. A worker handles its
/// messages strictly one after another, so events for the same order are
/// applied in publish order, while different partitions progress
/// concurrently. A message is committed only after its worker has finished
/// with it, so events still queued or in processing when the consumer stops
/// are redelivered. Failed events are logged and committed, never retried.
pub struct EventConsumer<S: OrderStore, W: ProcessingWork> {
    processor: Arc<OrderEventProcessor<S, W>>,
    topic: String,
    group: String,
}

impl<S, W> EventConsumer<S, W>
where
    S: OrderStore + 'static,
    W: ProcessingWork + 'static,
{
    pub fn new(
        processor: Arc<OrderEventProcessor<S, W>>,
        topic: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            processor,
            topic: topic.into(),
            group: group.into(),
        }
    }

    /// Subscribes to the topic on `bus` and consumes until the subscription ends.
    pub async fn run<B: EventBus>(&self, bus: &B) -> event_bus::Result<()> {
        let messages = bus.subscribe(&self.topic, &self.group)?;
        tracing::info!(topic = %self.topic, group = %self.group, "Event consumer started");
        self.consume(messages).await;
        Ok(())
    }

    /// Consumes `messages` until the stream ends, then waits for the
    /// partition workers to drain.
    pub async fn consume(&self, mut messages: MessageStream) {
        let mut workers: HashMap<i32, mpsc::Sender<BusMessage>> = HashMap::new();
        let mut tasks = JoinSet::new();

        while let Some(received) = messages.next().await {
            let message = match received {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to receive message");
                    continue;
                }
            };

            let partition = message.partition;
            let worker = workers.entry(partition).or_insert_with(|| {
                let (tx, rx) = mpsc::channel(PARTITION_BUFFER);
                tasks.spawn(partition_worker(Arc::clone(&self.processor), partition, rx));
                tx
            });

            if worker.send(message).await.is_err() {
                tracing::error!(partition, "Partition worker stopped, message left uncommitted");
            }
        }

        drop(workers);
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Partition worker panicked");
            }
        }

        tracing::info!(topic = %self.topic, "Event consumer stopped");
    }
}

async fn partition_worker<S, W>(
    processor: Arc<OrderEventProcessor<S, W>>,
    partition: i32,
    mut messages: mpsc::Receiver<BusMessage>,
) where
    S: OrderStore,
    W: ProcessingWork,
{
    tracing::debug!(partition, "Partition worker started");
    while let Some(message) = messages.recv().await {
        handle_message(&processor, &message).await;
        message.commit();
    }
}

#[tracing::instrument(
    skip(processor, message),
    fields(partition = message.partition, offset = message.offset, key = ?message.key)
)]
async fn handle_message<S, W>(processor: &OrderEventProcessor<S, W>, message: &BusMessage)
where
    S: OrderStore,
    W: ProcessingWork,
{
    let event: LifecycleEvent = match serde_json::from_slice(&message.payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Undecodable lifecycle event, skipping");
            counter!("order_events_decode_failures_total").increment(1);
            return;
        }
    };

    match processor.process(&event).await {
        Ok(_) => {}
        Err(ProcessError::OrderNotFound(id)) => {
            tracing::error!(order_id = %id, "Lifecycle event for unknown order consumed");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to process lifecycle event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::{NoDelay, SimulatedDelay};
    use common::{Decimal, EventKind, NewOrder, Order, OrderStatus};
    use event_bus::{CommitHandle, InMemoryEventBus};
    use futures_util::stream;
    use order_store::{InMemoryOrderStore, OrderStoreExt};
    use std::time::Duration;

    fn message(partition: i32, offset: i64, payload: Vec<u8>) -> BusMessage {
        BusMessage {
            topic: "order-events".to_string(),
            partition,
            offset,
            key: None,
            payload,
            committer: CommitHandle::default(),
        }
    }

    fn consumer(store: InMemoryOrderStore) -> EventConsumer<InMemoryOrderStore, NoDelay> {
        let processor = Arc::new(OrderEventProcessor::new(store, NoDelay));
        EventConsumer::new(processor, "order-events", "test-group")
    }

    async fn seed(store: &InMemoryOrderStore) -> Order {
        store
            .save(Order::pending(NewOrder::new("A", "B", 1, Decimal::ONE)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn consume_processes_until_stream_ends() {
        let store = InMemoryOrderStore::new();
        let order = seed(&store).await;
        let payload = serde_json::to_vec(&LifecycleEvent::created(&order)).unwrap();

        let messages: MessageStream = Box::pin(stream::iter(vec![Ok(message(0, 0, payload))]));
        consumer(store.clone()).consume(messages).await;

        let stored = store.find_by_id(order.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.order_status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn undecodable_payload_is_skipped() {
        let store = InMemoryOrderStore::new();
        let order = seed(&store).await;
        let good = serde_json::to_vec(&LifecycleEvent::created(&order)).unwrap();

        let messages: MessageStream = Box::pin(stream::iter(vec![
            Ok(message(0, 0, b"not json".to_vec())),
            Ok(message(0, 1, good)),
        ]));
        consumer(store.clone()).consume(messages).await;

        let stored = store.find_by_id(order.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.order_status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn failed_events_do_not_stop_the_partition() {
        let store = InMemoryOrderStore::new();
        let order = seed(&store).await;
        let missing = LifecycleEvent::bare(Some(common::OrderId::new(999)), EventKind::Create);
        let unknown = LifecycleEvent::bare(order.id, "ARCHIVE");

        let messages: MessageStream = Box::pin(stream::iter(vec![
            Ok(message(1, 0, serde_json::to_vec(&missing).unwrap())),
            Ok(message(1, 1, serde_json::to_vec(&unknown).unwrap())),
            Ok(message(1, 2, serde_json::to_vec(&LifecycleEvent::updated(&order)).unwrap())),
        ]));
        consumer(store.clone()).consume(messages).await;

        let stored = store.find_by_id(order.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.order_status, OrderStatus::Completed);
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn run_subscribes_to_the_topic() {
        let store = InMemoryOrderStore::new();
        let order = seed(&store).await;
        let bus = InMemoryEventBus::new();
        bus.send(
            "order-events",
            &order.id.unwrap().to_string(),
            serde_json::to_vec(&LifecycleEvent::created(&order)).unwrap(),
        )
        .await
        .unwrap();

        let consumer = consumer(store.clone());
        let running = tokio::spawn(async move { consumer.run(&bus).await });

        let id = order.id.unwrap();
        let completed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let stored = store.find_by_id(id).await.unwrap().unwrap();
                if stored.order_status == OrderStatus::Completed {
                    break stored;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(completed.processed_at.is_some());
        running.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn slow_work_does_not_hold_up_other_partitions() {
        let store = InMemoryOrderStore::new();
        let mut messages: Vec<event_bus::Result<BusMessage>> = Vec::new();
        for i in 0..6 {
            let order = seed(&store).await;
            let payload = serde_json::to_vec(&LifecycleEvent::created(&order)).unwrap();
            messages.push(Ok(message(i % 3, i64::from(i / 3), payload)));
        }

        let processor = Arc::new(OrderEventProcessor::new(
            store.clone(),
            SimulatedDelay::new(Duration::from_secs(2)),
        ));
        let consumer = EventConsumer::new(processor, "order-events", "test-group");
        let started = tokio::time::Instant::now();
        consumer.consume(Box::pin(stream::iter(messages))).await;
        let elapsed = started.elapsed();

        // Two orders per partition, partitions in parallel
        assert!(elapsed >= Duration::from_secs(4));
        assert!(elapsed < Duration::from_secs(6), "took {elapsed:?}");
        let completed = store.find_by_status(OrderStatus::Completed).await.unwrap();
        assert_eq!(completed.len(), 6);
    }

    #[tokio::test]
    async fn messages_are_committed_after_processing() {
        let store = InMemoryOrderStore::new();
        let order = seed(&store).await;
        let bus = InMemoryEventBus::with_partitions(1);
        bus.send(
            "order-events",
            &order.id.unwrap().to_string(),
            serde_json::to_vec(&LifecycleEvent::created(&order)).unwrap(),
        )
        .await
        .unwrap();
        bus.send("order-events", "junk", b"not json".to_vec())
            .await
            .unwrap();
        assert_eq!(bus.committed_offset("order-events", "test-group", 0), 0);

        let consumer = consumer(store.clone());
        let running = tokio::spawn({
            let bus = bus.clone();
            async move { consumer.run(&bus).await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while bus.committed_offset("order-events", "test-group", 0) < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let stored = store.find_by_id(order.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.order_status, OrderStatus::Completed);
        running.abort();
    }
}
