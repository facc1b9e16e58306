//! Staged PayU payment attempts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use atelier_core::{AttemptStatus, Money, OrderId, PaymentAttemptId, UserId};

/// A checkout handed to PayU and awaiting its callback.
///
/// `cart` is the checkout request as submitted, replayed to place the order
/// once the gateway reports success.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAttempt {
    pub id: PaymentAttemptId,
    pub txn_id: String,
    pub user_id: UserId,
    #[serde(skip)]
    pub cart: serde_json::Value,
    pub amount: Money,
    pub status: AttemptStatus,
    pub order_id: Option<OrderId>,
    pub gateway_payment_id: Option<String>,
    pub error_message: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PaymentAttempt {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
