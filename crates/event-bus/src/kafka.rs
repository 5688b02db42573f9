use std::time::Duration;

use futures_util::{StreamExt, stream};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::{Offset, TopicPartitionList};

use crate::{
    BusError, BusMessage, CommitHandle, Delivery, DeliveryFuture, EventBus, MessageStream, Result,
};

/// Kafka-compatible event bus.
///
/// Sends go through a [`FutureProducer`]; the record is enqueued in the
/// producer before [`EventBus::send`] returns. Subscriptions use a
/// [`StreamConsumer`] with manual commits: an offset is committed only when
/// the subscriber calls [`BusMessage::commit`], so a message that was received
/// but not fully handled before a crash is redelivered.
pub struct KafkaEventBus {
    producer: FutureProducer,
    brokers: String,
    buffer_size: usize,
    auto_offset_reset: String,
}

impl std::fmt::Debug for KafkaEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaEventBus")
            .field("brokers", &self.brokers)
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}

impl KafkaEventBus {
    /// Creates a producer connected to `brokers` (comma-separated `host:port`).
    pub fn new(brokers: impl Into<String>) -> Result<Self> {
        let brokers = brokers.into();

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()
            .map_err(|e| BusError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        tracing::info!(brokers = %brokers, "Kafka producer created");

        Ok(Self {
            producer,
            brokers,
            buffer_size: 1000,
            auto_offset_reset: "earliest".to_string(),
        })
    }

    /// Sets the number of received messages buffered per subscription.
    #[must_use]
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Sets where a new consumer group starts (`earliest` or `latest`).
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = policy.into();
        self
    }

    /// Creates `topic` with `partitions` partitions if it doesn't exist yet.
    pub async fn ensure_topic(&self, topic: &str, partitions: i32) -> Result<()> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()
            .map_err(|e| BusError::ConnectionFailed(format!("Failed to create admin client: {e}")))?;

        let new_topic = NewTopic::new(topic, partitions, TopicReplication::Fixed(1));
        let options = AdminOptions::new().operation_timeout(Some(Duration::from_secs(10)));

        let results = admin
            .create_topics([&new_topic], &options)
            .await
            .map_err(|e| BusError::ConnectionFailed(format!("Failed to create topic: {e}")))?;

        for result in results {
            match result {
                Ok(name) => tracing::info!(topic = %name, partitions, "Topic created"),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    tracing::debug!(topic = %name, "Topic already exists");
                }
                Err((name, code)) => {
                    return Err(BusError::ConnectionFailed(format!(
                        "Failed to create topic '{name}': {code}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl EventBus for KafkaEventBus {
    fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> DeliveryFuture {
        let record = FutureRecord::to(topic).payload(&payload).key(key);

        let delivery = match self.producer.send_result(record) {
            Ok(delivery) => delivery,
            Err((e, _)) => {
                let err = BusError::PublishFailed {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                };
                return Box::pin(std::future::ready(Err(err)));
            }
        };

        let topic = topic.to_string();
        Box::pin(async move {
            match delivery.await {
                Ok(Ok((partition, offset))) => Ok(Delivery {
                    topic,
                    partition,
                    offset,
                }),
                Ok(Err((e, _))) => Err(BusError::PublishFailed {
                    topic,
                    reason: e.to_string(),
                }),
                Err(_) => Err(BusError::PublishFailed {
                    topic,
                    reason: "delivery cancelled".to_string(),
                }),
            }
        })
    }

    fn subscribe(&self, topic: &str, group: &str) -> Result<MessageStream> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| BusError::SubscriptionFailed {
                topic: topic.to_string(),
                reason: format!("Failed to create consumer: {e}"),
            })?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| BusError::SubscriptionFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(topic, group, buffer_size = self.buffer_size, "Subscribed to topic");

        let (tx, rx) = tokio::sync::mpsc::channel(self.buffer_size);
        let (commit_tx, mut commit_rx) = tokio::sync::mpsc::unbounded_channel::<Delivery>();

        // The task owns the consumer: it forwards messages until the stream is
        // dropped and commits the offsets subscribers hand back
        tokio::spawn(async move {
            let mut messages = consumer.stream();

            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    Some(handled) = commit_rx.recv() => commit(&consumer, &handled, CommitMode::Async),
                    received = messages.next() => {
                        let Some(received) = received else { break };
                        let forwarded = match received {
                            Ok(message) => {
                                let delivery = Delivery {
                                    topic: message.topic().to_string(),
                                    partition: message.partition(),
                                    offset: message.offset(),
                                };
                                let commit_tx = commit_tx.clone();
                                let handled = delivery.clone();
                                Ok(BusMessage {
                                    topic: delivery.topic,
                                    partition: delivery.partition,
                                    offset: delivery.offset,
                                    key: message
                                        .key()
                                        .map(|k| String::from_utf8_lossy(k).into_owned()),
                                    payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                                    committer: CommitHandle::new(move || {
                                        let _ = commit_tx.send(handled.clone());
                                    }),
                                })
                            }
                            Err(e) => Err(BusError::Transport(format!("Failed to receive message: {e}"))),
                        };
                        if tx.send(forwarded).await.is_err() {
                            break;
                        }
                    }
                }
            }

            // Flush commits for messages handled before the subscriber went away
            while let Ok(handled) = commit_rx.try_recv() {
                commit(&consumer, &handled, CommitMode::Sync);
            }
            tracing::debug!("Consumer task exiting");
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(stream))
    }
}

/// Commits the offset after `handled`, so the group resumes past it.
fn commit(consumer: &StreamConsumer, handled: &Delivery, mode: CommitMode) {
    let mut offsets = TopicPartitionList::new();
    let added = offsets.add_partition_offset(
        &handled.topic,
        handled.partition,
        Offset::Offset(handled.offset + 1),
    );
    let result = added.and_then(|()| consumer.commit(&offsets, mode));
    if let Err(e) = result {
        tracing::warn!(
            topic = %handled.topic,
            partition = handled.partition,
            offset = handled.offset,
            error = %e,
            "Failed to commit offset (message may be redelivered)"
        );
    }
}
