use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    Order, OrderId, OrderQuery, Result, SortOrder, StoreError,
    store::OrderStore,
};

#[derive(Debug, Default)]
struct InMemoryState {
    orders: BTreeMap<OrderId, Order>,
    last_id: i64,
    last_created_at: Option<DateTime<Utc>>,
}

/// In-memory order store implementation.
///
/// Used by tests and by the server when no database is configured. Provides
/// the same interface as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, mut order: Order) -> Result<Order> {
        let mut state = self.state.write().await;

        match order.id {
            Some(id) => {
                let existing = state
                    .orders
                    .get(&id)
                    .ok_or(StoreError::UnknownOrder(id))?;
                order.created_at = existing.created_at;
            }
            None => {
                // Creation timestamps never go backwards relative to insertion order.
                let now = Utc::now();
                let created_at = match state.last_created_at {
                    Some(last) if last > now => last,
                    _ => now,
                };
                state.last_id += 1;
                state.last_created_at = Some(created_at);
                order.id = Some(OrderId::new(state.last_id));
                order.created_at = Some(created_at);
            }
        }

        if let Some(id) = order.id {
            state.orders.insert(id, order.clone());
            tracing::trace!(order_id = %id, status = %order.order_status, "Order saved");
        }
        metrics::counter!("order_store_writes_total", "backend" => "memory").increment(1);
        Ok(order)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&id).cloned())
    }

    async fn query(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let state = self.state.read().await;

        // BTreeMap iteration is already ascending by id
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();

        if query.sort == SortOrder::CreatedDesc {
            orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        }

        let offset = query.offset.unwrap_or(0);
        let orders = orders.into_iter().skip(offset);
        let orders = match query.limit {
            Some(limit) => orders.take(limit).collect(),
            None => orders.collect(),
        };

        Ok(orders)
    }
}
