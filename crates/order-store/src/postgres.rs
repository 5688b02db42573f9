use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Decimal;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Order, OrderId, OrderQuery, OrderStatus, Result, SortOrder, StoreError, store::OrderStore,
};

const ORDER_COLUMNS: &str =
    "id, customer_name, product_name, quantity, price, order_status, created_at, processed_at";

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url` and returns a store over a fresh pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("order store migrations applied");
        Ok(())
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity)
            .map_err(|_| StoreError::InvalidRecord(format!("negative quantity {quantity}")))?;
        let status: String = row.try_get("order_status")?;
        let order_status = status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;

        Ok(Order {
            id: Some(OrderId::new(row.try_get("id")?)),
            customer_name: row.try_get("customer_name")?,
            product_name: row.try_get("product_name")?,
            quantity,
            price: row.try_get::<Decimal, _>("price")?,
            order_status,
            created_at: row.try_get::<Option<DateTime<Utc>>, _>("created_at")?,
            processed_at: row.try_get::<Option<DateTime<Utc>>, _>("processed_at")?,
        })
    }

    fn quantity_param(order: &Order) -> Result<i32> {
        i32::try_from(order.quantity)
            .map_err(|_| StoreError::InvalidRecord(format!("quantity {} too large", order.quantity)))
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, order), fields(order_id = ?order.id, status = %order.order_status))]
    async fn save(&self, order: Order) -> Result<Order> {
        let quantity = Self::quantity_param(&order)?;

        let row = match order.id {
            None => {
                // created_at is assigned by the database in the same statement as the id
                sqlx::query(&format!(
                    r#"
                    INSERT INTO orders (customer_name, product_name, quantity, price, order_status, processed_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING {ORDER_COLUMNS}
                    "#
                ))
                .bind(&order.customer_name)
                .bind(&order.product_name)
                .bind(quantity)
                .bind(order.price)
                .bind(order.order_status.as_str())
                .bind(order.processed_at)
                .fetch_one(&self.pool)
                .await?
            }
            Some(id) => sqlx::query(&format!(
                r#"
                    UPDATE orders
                    SET customer_name = $2, product_name = $3, quantity = $4, price = $5,
                        order_status = $6, processed_at = $7
                    WHERE id = $1
                    RETURNING {ORDER_COLUMNS}
                    "#
            ))
            .bind(id.as_i64())
            .bind(&order.customer_name)
            .bind(&order.product_name)
            .bind(quantity)
            .bind(order.price)
            .bind(order.order_status.as_str())
            .bind(order.processed_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::UnknownOrder(id))?,
        };

        metrics::counter!("order_store_writes_total", "backend" => "postgres").increment(1);
        Self::row_to_order(row)
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_order).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn query(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND order_status = ${param_count}"));
        }
        if query.customer_name.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND customer_name = ${param_count}"));
        }
        if query.min_price_exclusive.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND price > ${param_count}"));
        }

        match query.sort {
            SortOrder::IdAsc => sql.push_str(" ORDER BY id ASC"),
            SortOrder::CreatedDesc => sql.push_str(" ORDER BY created_at DESC, id DESC"),
        }

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(customer_name) = query.customer_name {
            sqlx_query = sqlx_query.bind(customer_name);
        }
        if let Some(min_price) = query.min_price_exclusive {
            sqlx_query = sqlx_query.bind(min_price);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }
}
