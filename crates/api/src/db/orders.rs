//! Order repository.
//!
//! Writes that must share a transaction with stock changes take a
//! `&mut PgConnection` rather than the pool.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use atelier_core::{Money, OrderId, OrderStatus, Page, Pagination, UserId};

use super::RepositoryError;
use crate::models::order::{
    Order, OrderItem, PaymentInfo, ShippingAddress, StatusHistoryEntry, generate_order_number,
};

/// Attempts at drawing an unused order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: UserId,
    items: Json<Vec<OrderItem>>,
    shipping_address: Json<ShippingAddress>,
    subtotal: Money,
    shipping_cost: Money,
    total: Money,
    status: OrderStatus,
    status_history: Json<Vec<StatusHistoryEntry>>,
    payment: Json<PaymentInfo>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            items: row.items.0,
            shipping_address: row.shipping_address.0,
            subtotal: row.subtotal,
            shipping_cost: row.shipping_cost,
            total: row.total,
            status: row.status,
            status_history: row.status_history.0,
            payment: row.payment.0,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A priced order ready to be stored.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub status_history: Vec<StatusHistoryEntry>,
    pub payment: PaymentInfo,
    pub notes: Option<String>,
}

/// Filters for order listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order with a freshly drawn order number.
    ///
    /// A colliding number is redrawn; the insert never aborts the
    /// surrounding transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if no free order number was found.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert(conn: &mut PgConnection, new: &NewOrder) -> Result<Order, RepositoryError> {
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let order_number = generate_order_number(Utc::now());

            let row = sqlx::query_as::<_, OrderRow>(
                r"
                INSERT INTO atelier.order
                    (order_number, user_id, items, shipping_address, subtotal,
                     shipping_cost, total, status, status_history, payment, notes)
                VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, $10)
                ON CONFLICT (order_number) DO NOTHING
                RETURNING *
                ",
            )
            .bind(&order_number)
            .bind(new.user_id)
            .bind(Json(&new.items))
            .bind(Json(&new.shipping_address))
            .bind(new.subtotal)
            .bind(new.shipping_cost)
            .bind(new.total)
            .bind(Json(&new.status_history))
            .bind(Json(&new.payment))
            .bind(new.notes.as_deref())
            .fetch_optional(&mut *conn)
            .await?;

            if let Some(row) = row {
                return Ok(row.into());
            }
            tracing::warn!(order_number = %order_number, "Order number collision, retrying");
        }

        Err(RepositoryError::Conflict(
            "could not allocate an order number".to_owned(),
        ))
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(r"SELECT * FROM atelier.order WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Order::from))
    }

    /// Get an order and lock its row for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_update(
        conn: &mut PgConnection,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"SELECT * FROM atelier.order WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(row.map(Order::from))
    }

    /// List orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: OrderFilter,
        pagination: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT * FROM atelier.order
            WHERE ($1::atelier.order_status IS NULL OR status = $1)
              AND ($2::integer IS NULL OR user_id = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(filter.status)
        .bind(filter.user_id)
        .bind(pagination.limit_i64())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM atelier.order
            WHERE ($1::atelier.order_status IS NULL OR status = $1)
              AND ($2::integer IS NULL OR user_id = $2)
            ",
        )
        .bind(filter.status)
        .bind(filter.user_id)
        .fetch_one(self.pool)
        .await?;

        let orders = rows.into_iter().map(Order::from).collect();
        Ok(Page::new(orders, pagination, total))
    }

    /// Most recently placed orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"SELECT * FROM atelier.order ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Store a new status together with its history and payment sub-document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_status(
        conn: &mut PgConnection,
        id: OrderId,
        status: OrderStatus,
        history: &[StatusHistoryEntry],
        payment: &PaymentInfo,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            UPDATE atelier.order SET status = $2, status_history = $3, payment = $4
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(status)
        .bind(Json(history))
        .bind(Json(payment))
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }
}
