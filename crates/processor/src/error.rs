//! Processing error types.

use common::OrderId;
use order_store::StoreError;
use thiserror::Error;

/// Errors that can occur while applying a lifecycle event.
///
/// None of these are retried: the event is consumed and the error logged.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The event refers to an order the store doesn't have.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The event carries no order id.
    #[error("Event has no order id")]
    MissingOrderId,

    /// An error occurred in the order store.
    #[error("Order store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for processing operations.
pub type Result<T> = std::result::Result<T, ProcessError>;
