//! Order lifecycle service.

use common::{Decimal, LifecycleEvent, NewOrder, Order, OrderId, OrderStatus};
use metrics::counter;
use order_store::{OrderStore, OrderStoreExt};

use crate::error::{DomainError, Result};
use crate::publisher::EventPublisher;

/// Service for creating orders and changing their status.
///
/// Each write path saves the order once and then publishes exactly one
/// lifecycle event. The call returns as soon as the event has been handed to
/// the publisher, before the bus acknowledges it; a publish failure is
/// logged by the publisher and never reaches the caller.
pub struct OrderService<S: OrderStore, P: EventPublisher> {
    store: S,
    publisher: P,
}

impl<S: OrderStore, P: EventPublisher> OrderService<S, P> {
    /// Creates a new service over the given store and publisher.
    pub fn new(store: S, publisher: P) -> Self {
        Self { store, publisher }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a new order in `PENDING` status and announces it with a
    /// `CREATE` event.
    #[tracing::instrument(skip(self, request), fields(customer = %request.customer_name))]
    pub async fn create_order(&self, request: NewOrder) -> Result<Order> {
        let order = self.store.save(Order::pending(request)).await?;

        tracing::info!(order_id = ?order.id, "Order created");
        counter!("orders_created_total").increment(1);

        // Delivery is observed on the notification task
        let _ = self.publisher.publish(LifecycleEvent::created(&order));

        Ok(order)
    }

    /// Sets an order's status directly and announces it with an `UPDATE` event.
    ///
    /// Any target status is accepted, including moves out of a terminal
    /// status, and `PROCESSING` is not passed through.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut order = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(DomainError::NotFound(id))?;

        let previous = order.order_status;
        order.order_status = status;
        let order = self.store.save(order).await?;

        tracing::info!(order_id = %id, from = %previous, to = %status, "Order status updated");
        counter!("order_status_updates_total", "status" => status.as_str()).increment(1);

        let _ = self.publisher.publish(LifecycleEvent::updated(&order));

        Ok(order)
    }

    /// Loads a single order.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(DomainError::NotFound(id))
    }

    /// Lists every order in insertion order.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.store.find_all().await?)
    }

    /// Lists orders in a given status.
    #[tracing::instrument(skip(self))]
    pub async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        Ok(self.store.find_by_status(status).await?)
    }

    /// Lists a customer's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_by_customer(&self, customer_name: &str) -> Result<Vec<Order>> {
        Ok(self.store.find_by_customer(customer_name).await?)
    }

    /// Lists orders in a given status priced strictly above `min_price`.
    #[tracing::instrument(skip(self))]
    pub async fn list_expensive_by_status(
        &self,
        min_price: Decimal,
        status: OrderStatus,
    ) -> Result<Vec<Order>> {
        Ok(self
            .store
            .find_expensive_by_status(min_price, status)
            .await?)
    }
}
