//! Event bus abstraction for the order lifecycle.
//!
//! The bus is an ordered, partitioned, at-least-once publish/subscribe
//! channel keyed by string:
//! - messages with the same key land on the same partition and are delivered
//!   to a consumer group in publish order
//! - messages with different keys have no ordering relationship
//! - a message may be delivered more than once, consumers must tolerate it
//! - a message is redelivered until the subscriber commits it
//!
//! Implementations:
//! - [`InMemoryEventBus`] for tests and single-process deployments
//! - `KafkaEventBus` (feature `kafka`) for Kafka-compatible brokers

pub mod bus;
pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

pub use bus::{BusMessage, CommitHandle, Delivery, DeliveryFuture, EventBus, MessageStream};
pub use error::{BusError, Result};
#[cfg(feature = "kafka")]
pub use kafka::KafkaEventBus;
pub use memory::InMemoryEventBus;
