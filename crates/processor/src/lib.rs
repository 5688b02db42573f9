//! Consumption side of the order lifecycle.
//!
//! This crate provides:
//! - [`OrderEventProcessor`], which applies one lifecycle event to the store
//! - [`ProcessingWork`], the unit of work performed between the two status writes
//! - [`EventConsumer`], which feeds bus messages to the processor with one
//!   sequential worker per partition

pub mod consumer;
pub mod error;
pub mod processor;
pub mod work;

pub use consumer::EventConsumer;
pub use error::{ProcessError, Result};
pub use processor::{OrderEventProcessor, ProcessOutcome};
pub use work::{NoDelay, ProcessingWork, SimulatedDelay};
