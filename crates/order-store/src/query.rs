use common::Decimal;

use crate::OrderStatus;

/// Result ordering for order queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Insertion order (ascending id).
    #[default]
    IdAsc,
    /// Newest first (descending creation time, then descending id).
    CreatedDesc,
}

/// Builder for constructing order queries.
///
/// Allows filtering orders by status, customer and price, with a sort order
/// and optional paging.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Filter by status.
    pub status: Option<OrderStatus>,

    /// Filter by exact customer name.
    pub customer_name: Option<String>,

    /// Only orders whose unit price is strictly greater than this.
    pub min_price_exclusive: Option<Decimal>,

    /// Result ordering.
    pub sort: SortOrder,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,

    /// Number of orders to skip.
    pub offset: Option<usize>,
}

impl OrderQuery {
    /// Creates a new empty query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for orders in a given status.
    pub fn for_status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Creates a query for a customer's orders, newest first.
    pub fn for_customer(customer_name: impl Into<String>) -> Self {
        Self {
            customer_name: Some(customer_name.into()),
            sort: SortOrder::CreatedDesc,
            ..Default::default()
        }
    }

    /// Filters by status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters by customer name.
    pub fn customer_name(mut self, customer_name: impl Into<String>) -> Self {
        self.customer_name = Some(customer_name.into());
        self
    }

    /// Keeps only orders priced above `price`.
    pub fn price_above(mut self, price: Decimal) -> Self {
        self.min_price_exclusive = Some(price);
        self
    }

    /// Limits the number of orders returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many orders before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the order satisfies every filter of this query.
    pub fn matches(&self, order: &common::Order) -> bool {
        if let Some(status) = self.status
            && order.order_status != status
        {
            return false;
        }
        if let Some(ref name) = self.customer_name
            && &order.customer_name != name
        {
            return false;
        }
        if let Some(min) = self.min_price_exclusive
            && order.price <= min
        {
            return false;
        }
        true
    }
}
