//! Lifecycle event carried on the event bus.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Order, OrderId};

/// Classification of a lifecycle event.
///
/// Kinds the processor does not know are kept verbatim in [`EventKind::Other`]
/// so they survive decoding and can be skipped explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// The order was just created.
    Create,
    /// The order's status was changed through the direct update entry point.
    Update,
    /// Any other event type string.
    Other(String),
}

impl EventKind {
    /// Returns the wire name of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Create => "CREATE",
            EventKind::Update => "UPDATE",
            EventKind::Other(name) => name,
        }
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "CREATE" => EventKind::Create,
            "UPDATE" => EventKind::Update,
            _ => EventKind::Other(value),
        }
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        EventKind::from(value.to_string())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of an order published whenever its lifecycle changes.
///
/// The business fields are denormalized for consumers that want them; the
/// event processor only uses `order_id` and `event_type` and re-reads the
/// order from the store.
///
/// Field names are part of the wire contract. The price is serialized as a
/// decimal string so it never passes through a binary float.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub price: Decimal,
    pub event_type: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    /// Builds an event from an order snapshot, stamped with the current time.
    pub fn from_order(order: &Order, event_type: EventKind) -> Self {
        Self {
            order_id: order.id,
            customer_name: order.customer_name.clone(),
            product_name: order.product_name.clone(),
            quantity: order.quantity,
            price: order.price,
            event_type,
            timestamp: Utc::now(),
        }
    }

    /// Builds a `CREATE` event for an order.
    pub fn created(order: &Order) -> Self {
        Self::from_order(order, EventKind::Create)
    }

    /// Builds an `UPDATE` event for an order.
    pub fn updated(order: &Order) -> Self {
        Self::from_order(order, EventKind::Update)
    }

    /// Builds a bare event carrying only addressing and classification.
    pub fn bare(order_id: Option<OrderId>, event_type: impl Into<EventKind>) -> Self {
        Self {
            order_id,
            customer_name: String::new(),
            product_name: String::new(),
            quantity: 0,
            price: Decimal::ZERO,
            event_type: event_type.into(),
            timestamp: Utc::now(),
        }
    }

    /// The partition/ordering key for this event.
    ///
    /// Equal to the order id's string form, or the literal `"null"` when the
    /// event carries no order id.
    pub fn partition_key(&self) -> String {
        match self.order_id {
            Some(id) => id.to_string(),
            None => "null".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewOrder, OrderStatus};
    use std::str::FromStr;

    fn persisted_order() -> Order {
        let mut order = Order::pending(NewOrder::new(
            "Test Customer",
            "Test Product",
            2,
            Decimal::from_str("99.99").unwrap(),
        ));
        order.id = Some(OrderId::new(123));
        order.created_at = Some(Utc::now());
        order
    }

    #[test]
    fn event_kind_parses_known_and_unknown_names() {
        assert_eq!(EventKind::from("CREATE"), EventKind::Create);
        assert_eq!(EventKind::from("UPDATE"), EventKind::Update);
        assert_eq!(
            EventKind::from("UNKNOWN_type"),
            EventKind::Other("UNKNOWN_type".to_string())
        );
    }

    #[test]
    fn event_kind_matching_is_case_sensitive() {
        assert_eq!(
            EventKind::from("create"),
            EventKind::Other("create".to_string())
        );
    }

    #[test]
    fn created_event_copies_order_snapshot() {
        let order = persisted_order();
        let event = LifecycleEvent::created(&order);

        assert_eq!(event.order_id, Some(OrderId::new(123)));
        assert_eq!(event.customer_name, "Test Customer");
        assert_eq!(event.quantity, 2);
        assert_eq!(event.price, Decimal::from_str("99.99").unwrap());
        assert_eq!(event.event_type, EventKind::Create);
        assert_eq!(order.order_status, OrderStatus::Pending);
    }

    #[test]
    fn partition_key_is_order_id_string() {
        let event = LifecycleEvent::created(&persisted_order());
        assert_eq!(event.partition_key(), "123");
    }

    #[test]
    fn partition_key_is_literal_null_without_order_id() {
        let event = LifecycleEvent::bare(None, EventKind::Create);
        assert_eq!(event.partition_key(), "null");
    }

    #[test]
    fn wire_format_uses_contract_field_names() {
        let event = LifecycleEvent::updated(&persisted_order());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["orderId"], 123);
        assert_eq!(json["customerName"], "Test Customer");
        assert_eq!(json["productName"], "Test Product");
        assert_eq!(json["price"], "99.99");
        assert_eq!(json["eventType"], "UPDATE");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn decoding_keeps_unknown_kind_and_exact_price() {
        let json = r#"{
            "orderId": 5,
            "customerName": "A",
            "productName": "B",
            "quantity": 1,
            "price": "0.10",
            "eventType": "REFUND",
            "timestamp": "2024-01-01T00:00:00Z"
        }"#;
        let event: LifecycleEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.event_type, EventKind::Other("REFUND".to_string()));
        assert_eq!(event.price.to_string(), "0.10");
    }

    #[test]
    fn decoding_tolerates_missing_business_fields() {
        let json = r#"{"orderId":null,"eventType":"CREATE","timestamp":"2024-01-01T00:00:00Z"}"#;
        let event: LifecycleEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.order_id, None);
        assert_eq!(event.partition_key(), "null");
        assert!(event.customer_name.is_empty());
    }
}
