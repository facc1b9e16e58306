//! Staged PayU payment attempts.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use atelier_core::{AttemptStatus, Money, OrderId, PaymentAttemptId, UserId};

use super::RepositoryError;
use crate::models::payment_attempt::PaymentAttempt;

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: PaymentAttemptId,
    txn_id: String,
    user_id: UserId,
    cart: Json<serde_json::Value>,
    amount: Money,
    status: AttemptStatus,
    order_id: Option<OrderId>,
    gateway_payment_id: Option<String>,
    error_message: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<AttemptRow> for PaymentAttempt {
    fn from(row: AttemptRow) -> Self {
        Self {
            id: row.id,
            txn_id: row.txn_id,
            user_id: row.user_id,
            cart: row.cart.0,
            amount: row.amount,
            status: row.status,
            order_id: row.order_id,
            gateway_payment_id: row.gateway_payment_id,
            error_message: row.error_message,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

/// Repository for payment attempts.
pub struct PaymentAttemptRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentAttemptRepository<'a> {
    /// Create a new payment attempt repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Stage an attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if `txn_id` is already used.
    pub async fn create(
        &self,
        txn_id: &str,
        user_id: UserId,
        cart: &serde_json::Value,
        amount: Money,
        expires_at: DateTime<Utc>,
    ) -> Result<PaymentAttempt, RepositoryError> {
        let row = sqlx::query_as::<_, AttemptRow>(
            r"
            INSERT INTO atelier.payment_attempt (txn_id, user_id, cart, amount, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(txn_id)
        .bind(user_id)
        .bind(Json(cart))
        .bind(amount)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "transaction id already exists"))?;

        Ok(row.into())
    }

    /// Get an attempt by its gateway transaction id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_txn_id(
        &self,
        txn_id: &str,
    ) -> Result<Option<PaymentAttempt>, RepositoryError> {
        let row = sqlx::query_as::<_, AttemptRow>(
            r"SELECT * FROM atelier.payment_attempt WHERE txn_id = $1",
        )
        .bind(txn_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(PaymentAttempt::from))
    }

    /// Lock an attempt so concurrent callbacks are serialised.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_update(
        conn: &mut PgConnection,
        txn_id: &str,
    ) -> Result<Option<PaymentAttempt>, RepositoryError> {
        let row = sqlx::query_as::<_, AttemptRow>(
            r"SELECT * FROM atelier.payment_attempt WHERE txn_id = $1 FOR UPDATE",
        )
        .bind(txn_id)
        .fetch_optional(conn)
        .await?;

        Ok(row.map(PaymentAttempt::from))
    }

    /// Mark an attempt completed and link the order it produced.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the attempt doesn't exist.
    pub async fn mark_completed(
        conn: &mut PgConnection,
        id: PaymentAttemptId,
        order_id: OrderId,
        gateway_payment_id: Option<&str>,
    ) -> Result<PaymentAttempt, RepositoryError> {
        let row = sqlx::query_as::<_, AttemptRow>(
            r"
            UPDATE atelier.payment_attempt
            SET status = 'completed', order_id = $2, gateway_payment_id = $3, error_message = NULL
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(order_id)
        .bind(gateway_payment_id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Mark an attempt failed with the gateway's reason.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the attempt doesn't exist.
    pub async fn mark_failed(
        conn: &mut PgConnection,
        id: PaymentAttemptId,
        gateway_payment_id: Option<&str>,
        error_message: &str,
    ) -> Result<PaymentAttempt, RepositoryError> {
        let row = sqlx::query_as::<_, AttemptRow>(
            r"
            UPDATE atelier.payment_attempt
            SET status = 'failed', gateway_payment_id = $2, error_message = $3
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(gateway_payment_id)
        .bind(error_message)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete every attempt that expired at or before `cutoff`. Returns the
    /// number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(r"DELETE FROM atelier.payment_attempt WHERE expires_at <= $1")
            .bind(cutoff)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
