use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::stream;
use tokio::sync::mpsc;

use crate::{
    BusError, BusMessage, CommitHandle, Delivery, DeliveryFuture, EventBus, MessageStream, Result,
};

/// Partition count used when a topic is created implicitly.
pub const DEFAULT_PARTITIONS: usize = 3;

type SharedState = Arc<Mutex<BusState>>;

#[derive(Debug, Clone)]
struct StoredRecord {
    key: String,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct Group {
    members: Vec<mpsc::UnboundedSender<BusMessage>>,
    /// Next uncommitted offset per partition.
    committed: HashMap<usize, usize>,
}

impl Group {
    /// Drops members whose stream has been dropped.
    fn prune(&mut self) {
        self.members.retain(|m| !m.is_closed());
    }

    fn member_for(&self, partition: usize) -> Option<&mpsc::UnboundedSender<BusMessage>> {
        if self.members.is_empty() {
            None
        } else {
            self.members.get(partition % self.members.len())
        }
    }

    fn next_offset(&self, partition: usize) -> usize {
        self.committed.get(&partition).copied().unwrap_or(0)
    }

    fn commit(&mut self, partition: usize, offset: usize) {
        let next = self.committed.entry(partition).or_insert(0);
        *next = (*next).max(offset + 1);
    }
}

#[derive(Debug)]
struct Topic {
    partitions: Vec<Vec<StoredRecord>>,
    groups: HashMap<String, Group>,
}

impl Topic {
    fn new(partitions: usize) -> Self {
        Self {
            partitions: vec![Vec::new(); partitions.max(1)],
            groups: HashMap::new(),
        }
    }

    fn partition_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.partitions.len() as u64) as usize
    }

    fn message(&self, topic: &str, partition: usize, offset: usize) -> Option<BusMessage> {
        let record = self.partitions.get(partition)?.get(offset)?;
        Some(BusMessage {
            topic: topic.to_string(),
            partition: partition as i32,
            offset: offset as i64,
            key: Some(record.key.clone()),
            payload: record.payload.clone(),
            committer: CommitHandle::default(),
        })
    }

    /// Hands a stored record to the owning member of every group.
    ///
    /// Groups without a live member keep the record uncommitted; it is
    /// delivered when a member subscribes again.
    fn dispatch(&mut self, bus: &Weak<Mutex<BusState>>, topic: &str, partition: usize, offset: usize) {
        let Some(message) = self.message(topic, partition, offset) else {
            return;
        };
        for (name, group) in &mut self.groups {
            group.prune();
            if let Some(member) = group.member_for(partition) {
                let message = BusMessage {
                    committer: commit_handle(bus, topic, name, partition, offset),
                    ..message.clone()
                };
                // A closed member is pruned on the next dispatch
                let _ = member.send(message);
            }
        }
    }
}

#[derive(Debug, Default)]
struct BusState {
    topics: HashMap<String, Topic>,
    send_failure: Option<String>,
}

impl BusState {
    fn topic_mut(&mut self, name: &str, partitions: usize) -> &mut Topic {
        self.topics
            .entry(name.to_string())
            .or_insert_with(|| Topic::new(partitions))
    }

    fn commit(&mut self, topic: &str, group: &str, partition: usize, offset: usize) {
        if let Some(group) = self
            .topics
            .get_mut(topic)
            .and_then(|t| t.groups.get_mut(group))
        {
            group.commit(partition, offset);
        }
    }
}

fn lock_state(state: &Mutex<BusState>) -> MutexGuard<'_, BusState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn commit_handle(
    bus: &Weak<Mutex<BusState>>,
    topic: &str,
    group: &str,
    partition: usize,
    offset: usize,
) -> CommitHandle {
    let bus = bus.clone();
    let topic = topic.to_string();
    let group = group.to_string();
    CommitHandle::new(move || {
        if let Some(state) = bus.upgrade() {
            lock_state(&state).commit(&topic, &group, partition, offset);
        }
    })
}

/// In-memory event bus implementation.
///
/// Topics are split into a fixed number of partitions; a record's partition
/// is a hash of its key. Each consumer group gets every record, and within a
/// group partition `p` is owned by member `p % members`. Every group tracks
/// a committed offset per partition. A subscribing member is first handed
/// the uncommitted records of the partitions it owns, so a group that joins
/// late starts from the earliest retained offset.
///
/// Used by tests and by the server when no broker is configured.
#[derive(Debug, Clone)]
pub struct InMemoryEventBus {
    state: SharedState,
    default_partitions: usize,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventBus {
    /// Creates a new bus whose topics default to [`DEFAULT_PARTITIONS`] partitions.
    pub fn new() -> Self {
        Self::with_partitions(DEFAULT_PARTITIONS)
    }

    /// Creates a new bus whose topics default to `partitions` partitions.
    pub fn with_partitions(partitions: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
            default_partitions: partitions.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        lock_state(&self.state)
    }

    /// Creates `topic` with `partitions` partitions if it doesn't exist yet.
    ///
    /// An existing topic keeps its partition count.
    pub fn ensure_topic(&self, topic: &str, partitions: usize) {
        self.lock().topic_mut(topic, partitions);
    }

    /// Returns the partition count of `topic`, if it exists.
    pub fn partition_count(&self, topic: &str) -> Option<usize> {
        self.lock().topics.get(topic).map(|t| t.partitions.len())
    }

    /// Makes every following send fail with `reason`, or restores normal
    /// sends when `None`.
    pub fn fail_sends(&self, reason: Option<&str>) {
        self.lock().send_failure = reason.map(str::to_string);
    }

    /// Returns every record stored on `topic`, partition by partition.
    pub fn records(&self, topic: &str) -> Vec<BusMessage> {
        let state = self.lock();
        let Some(t) = state.topics.get(topic) else {
            return Vec::new();
        };
        t.partitions
            .iter()
            .enumerate()
            .flat_map(|(p, log)| (0..log.len()).filter_map(move |o| t.message(topic, p, o)))
            .collect()
    }

    /// Returns the next offset `group` will consume from `partition` of
    /// `topic`, i.e. one past its last committed offset.
    pub fn committed_offset(&self, topic: &str, group: &str, partition: i32) -> i64 {
        let state = self.lock();
        let next = usize::try_from(partition)
            .ok()
            .and_then(|p| Some(state.topics.get(topic)?.groups.get(group)?.next_offset(p)))
            .unwrap_or(0);
        next as i64
    }

    /// Delivers an already stored record again to every group.
    ///
    /// Returns false when no such record exists.
    pub fn redeliver(&self, topic: &str, partition: i32, offset: i64) -> bool {
        let bus = Arc::downgrade(&self.state);
        let mut state = self.lock();
        let Some(t) = state.topics.get_mut(topic) else {
            return false;
        };
        let (Ok(partition), Ok(offset)) = (usize::try_from(partition), usize::try_from(offset))
        else {
            return false;
        };
        if t.message(topic, partition, offset).is_none() {
            return false;
        }
        t.dispatch(&bus, topic, partition, offset);
        true
    }
}

impl EventBus for InMemoryEventBus {
    fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> DeliveryFuture {
        let bus = Arc::downgrade(&self.state);
        let mut state = self.lock();

        if let Some(reason) = state.send_failure.clone() {
            tracing::debug!(topic, key, %reason, "Rejecting send");
            let err = BusError::PublishFailed {
                topic: topic.to_string(),
                reason,
            };
            return Box::pin(std::future::ready(Err(err)));
        }

        let t = state.topic_mut(topic, self.default_partitions);
        let partition = t.partition_for(key);
        let log = &mut t.partitions[partition];
        log.push(StoredRecord {
            key: key.to_string(),
            payload,
        });
        let offset = log.len() - 1;
        t.dispatch(&bus, topic, partition, offset);

        tracing::trace!(topic, key, partition, offset, "Record appended");

        let delivery = Delivery {
            topic: topic.to_string(),
            partition: partition as i32,
            offset: offset as i64,
        };
        Box::pin(std::future::ready(Ok(delivery)))
    }

    fn subscribe(&self, topic: &str, group: &str) -> Result<MessageStream> {
        let bus = Arc::downgrade(&self.state);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let t = state.topic_mut(topic, self.default_partitions);
        let partition_count = t.partitions.len();

        let g = t.groups.entry(group.to_string()).or_default();
        g.prune();
        g.members.push(tx.clone());
        let members = g.members.len();
        let index = members - 1;
        let resume: Vec<(usize, usize)> = (0..partition_count)
            .filter(|p| p % members == index)
            .map(|p| (p, g.next_offset(p)))
            .collect();

        // Catch up on the uncommitted records of the partitions this member now owns
        let mut replayed = 0;
        for (partition, from) in resume {
            for offset in from..t.partitions[partition].len() {
                if let Some(message) = t.message(topic, partition, offset) {
                    let message = BusMessage {
                        committer: commit_handle(&bus, topic, group, partition, offset),
                        ..message
                    };
                    let _ = tx.send(message);
                    replayed += 1;
                }
            }
        }

        tracing::debug!(topic, group, members, replayed, "Subscribed to topic");

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (Ok(message), rx))
        });
        Ok(Box::pin(stream))
    }
}
