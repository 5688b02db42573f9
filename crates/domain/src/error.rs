//! Domain error types.

use common::OrderId;
use event_bus::BusError;
use order_store::StoreError;
use thiserror::Error;

/// Errors that can occur during lifecycle operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// An error occurred in the order store.
    #[error("Order store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors observed while delivering a lifecycle event.
///
/// These never reach the caller of the service; they surface only on the
/// notification task.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The bus rejected or failed to acknowledge the event.
    #[error("Event bus error: {0}")]
    Bus(#[from] BusError),

    /// The event could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The notification task ended before reporting an outcome.
    #[error("Notification task failed: {0}")]
    Task(String),
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, DomainError>;
