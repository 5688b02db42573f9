//! The order record shared by every component.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderId, OrderStatus};

/// Input for creating a new order.
///
/// Inputs reaching the lifecycle service are assumed to be well-formed:
/// validation is the request layer's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_name: String,
    pub product_name: String,
    pub quantity: u32,
    pub price: Decimal,
}

impl NewOrder {
    /// Creates a new order request.
    pub fn new(
        customer_name: impl Into<String>,
        product_name: impl Into<String>,
        quantity: u32,
        price: Decimal,
    ) -> Self {
        Self {
            customer_name: customer_name.into(),
            product_name: product_name.into(),
            quantity,
            price,
        }
    }
}

/// A customer order.
///
/// `id` and `created_at` are `None` until the store persists the order for
/// the first time. `processed_at` is only set when the event processor
/// completes the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Option<OrderId>,
    pub customer_name: String,
    pub product_name: String,
    pub quantity: u32,
    pub price: Decimal,
    pub order_status: OrderStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Builds an unsaved order in `PENDING` status.
    pub fn pending(new_order: NewOrder) -> Self {
        Self {
            id: None,
            customer_name: new_order.customer_name,
            product_name: new_order.product_name,
            quantity: new_order.quantity,
            price: new_order.price,
            order_status: OrderStatus::Pending,
            created_at: None,
            processed_at: None,
        }
    }

    /// Marks the order as being processed.
    pub fn start_processing(&mut self) {
        self.order_status = OrderStatus::Processing;
    }

    /// Marks the order as completed and stamps the processed timestamp.
    ///
    /// The timestamp is clamped so it never precedes `created_at`.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        let processed_at = match self.created_at {
            Some(created_at) if created_at > now => created_at,
            _ => now,
        };
        self.order_status = OrderStatus::Completed;
        self.processed_at = Some(processed_at);
    }
}
