use std::sync::Arc;

use async_trait::async_trait;
use common::Decimal;

use crate::{Order, OrderId, OrderQuery, OrderStatus, Result};

/// Core trait for order store implementations.
///
/// The store exclusively owns persisted order records. Callers work on
/// copies; every write is a single-record replace with no optimistic
/// concurrency check, so concurrent writers to the same order can
/// interleave (last write wins).
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists an order and returns the stored copy.
    ///
    /// An order without an id is inserted: the store assigns the id and the
    /// creation timestamp in the same atomic step. An order with an id
    /// replaces the existing record; the stored creation timestamp is kept.
    /// Saving an order whose id is unknown fails with `UnknownOrder`.
    async fn save(&self, order: Order) -> Result<Order>;

    /// Looks up an order by id.
    ///
    /// Returns None if the order doesn't exist.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>>;

    /// Retrieves orders matching a query.
    async fn query(&self, query: OrderQuery) -> Result<Vec<Order>>;
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn save(&self, order: Order) -> Result<Order> {
        (**self).save(order).await
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        (**self).find_by_id(id).await
    }

    async fn query(&self, query: OrderQuery) -> Result<Vec<Order>> {
        (**self).query(query).await
    }
}

/// Extension trait providing the named lookups on top of [`OrderStore::query`].
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Retrieves every order in insertion order.
    async fn find_all(&self) -> Result<Vec<Order>> {
        self.query(OrderQuery::new()).await
    }

    /// Retrieves orders in a given status, in insertion order.
    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        self.query(OrderQuery::for_status(status)).await
    }

    /// Retrieves a customer's orders, newest first.
    async fn find_by_customer(&self, customer_name: &str) -> Result<Vec<Order>> {
        self.query(OrderQuery::for_customer(customer_name)).await
    }

    /// Retrieves orders in a given status priced above `min_price`.
    async fn find_expensive_by_status(
        &self,
        min_price: Decimal,
        status: OrderStatus,
    ) -> Result<Vec<Order>> {
        self.query(OrderQuery::for_status(status).price_above(min_price))
            .await
    }
}

// Blanket implementation for all OrderStore implementations
impl<T: OrderStore + ?Sized> OrderStoreExt for T {}
