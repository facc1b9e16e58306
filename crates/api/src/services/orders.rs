//! Order status updates.
//!
//! Every accepted transition appends a history entry. Side effects run in
//! the same transaction as the status write:
//! - `cancelled` returns the snapshot quantities to product inventory;
//! - `refunded` marks the payment refunded;
//! - `delivered` on a cash-on-delivery order marks the payment paid.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument};

use atelier_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserRole};

use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::models::order::{Order, OrderItem, PaymentInfo, StatusHistoryEntry};
use crate::models::product;
use crate::models::user::CurrentUser;

/// Errors from changing an order's status.
#[derive(Debug, Error)]
pub enum OrderUpdateError {
    #[error("order not found")]
    NotFound,

    #[error("cannot change order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Whether `role` may move an order from `from` to `to`.
///
/// Admins may make any legal transition; warehouse staff only the physical
/// fulfilment steps; customers go through [`OrderService::cancel_own`].
///
/// # Errors
///
/// Returns `OrderUpdateError::Forbidden` if the role may not.
pub fn authorize(
    role: UserRole,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<(), OrderUpdateError> {
    match role {
        UserRole::Admin | UserRole::SuperAdmin => Ok(()),
        UserRole::Warehouse if from.is_fulfilment_step(to) => Ok(()),
        UserRole::Warehouse => Err(OrderUpdateError::Forbidden(
            "warehouse staff may only advance confirmed orders through delivery",
        )),
        UserRole::Customer => Err(OrderUpdateError::Forbidden(
            "customers may only cancel their own pending orders",
        )),
    }
}

/// The history and payment sub-document after moving `order` to `to`.
///
/// # Errors
///
/// Returns `OrderUpdateError::InvalidTransition` if the move isn't allowed.
pub fn apply_transition(
    order: &Order,
    to: OrderStatus,
    actor: &CurrentUser,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<(Vec<StatusHistoryEntry>, PaymentInfo), OrderUpdateError> {
    if !order.status.can_transition_to(to) {
        return Err(OrderUpdateError::InvalidTransition {
            from: order.status,
            to,
        });
    }

    let mut history = order.status_history.clone();
    history.push(StatusHistoryEntry {
        status: to,
        note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        changed_by: Some(actor.id),
        changed_at: now,
    });

    let mut payment = order.payment.clone();
    match to {
        OrderStatus::Refunded => payment.status = PaymentStatus::Refunded,
        OrderStatus::Delivered
            if payment.method == PaymentMethod::Cod && payment.status != PaymentStatus::Paid =>
        {
            payment.status = PaymentStatus::Paid;
            payment.paid_at = Some(now);
        }
        _ => {}
    }

    Ok((history, payment))
}

/// Order status service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Staff status change.
    ///
    /// # Errors
    ///
    /// Returns `OrderUpdateError::NotFound`, `Forbidden` or
    /// `InvalidTransition`, or a database error.
    #[instrument(skip(self, actor, note), fields(actor_id = %actor.id))]
    pub async fn update_status(
        &self,
        actor: &CurrentUser,
        id: OrderId,
        to: OrderStatus,
        note: Option<String>,
    ) -> Result<Order, OrderUpdateError> {
        let mut tx = self.pool.begin().await?;

        let order = OrderRepository::get_for_update(&mut *tx, id)
            .await?
            .ok_or(OrderUpdateError::NotFound)?;
        authorize(actor.role, order.status, to)?;

        let updated = transition(&mut *tx, &order, to, actor, note).await?;
        tx.commit().await?;

        info!(order_id = %id, from = %order.status, to = %to, "Order status changed");
        Ok(updated)
    }

    /// Customer cancellation of their own order, allowed only while pending.
    ///
    /// # Errors
    ///
    /// Returns `OrderUpdateError::NotFound` for someone else's order and
    /// `OrderUpdateError::Forbidden` once the order has left `pending`.
    #[instrument(skip(self, actor, note), fields(actor_id = %actor.id))]
    pub async fn cancel_own(
        &self,
        actor: &CurrentUser,
        id: OrderId,
        note: Option<String>,
    ) -> Result<Order, OrderUpdateError> {
        let mut tx = self.pool.begin().await?;

        let order = OrderRepository::get_for_update(&mut *tx, id)
            .await?
            .filter(|order| order.user_id == actor.id)
            .ok_or(OrderUpdateError::NotFound)?;

        if order.status != OrderStatus::Pending {
            return Err(OrderUpdateError::Forbidden(
                "only pending orders can be cancelled",
            ));
        }

        let note = note.or_else(|| Some("Cancelled by customer".to_string()));
        let updated = transition(&mut *tx, &order, OrderStatus::Cancelled, actor, note).await?;
        tx.commit().await?;

        info!(order_id = %id, "Order cancelled by customer");
        Ok(updated)
    }
}

async fn transition(
    conn: &mut PgConnection,
    order: &Order,
    to: OrderStatus,
    actor: &CurrentUser,
    note: Option<String>,
) -> Result<Order, OrderUpdateError> {
    let (history, payment) = apply_transition(order, to, actor, note, Utc::now())?;

    if to == OrderStatus::Cancelled {
        restock(conn, &order.items).await?;
    }

    Ok(OrderRepository::update_status(conn, order.id, to, &history, &payment).await?)
}

/// Return every line's quantity to its product's inventory.
async fn restock(conn: &mut PgConnection, items: &[OrderItem]) -> Result<(), RepositoryError> {
    let ids: Vec<ProductId> = items.iter().map(|item| item.product_id).collect();
    let mut products = ProductRepository::lock_for_update(conn, &ids).await?;

    for item in items {
        if let Some(product) = products.iter_mut().find(|p| p.id == item.product_id) {
            product::restock(&mut product.inventory, &item.color, &item.size, item.quantity);
        }
    }

    for product in &products {
        ProductRepository::save_inventory(conn, product.id, &product.inventory).await?;
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use atelier_core::{Email, UserId};

    use super::*;
    use crate::models::order::ShippingAddress;

    fn actor(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(9),
            email: Email::parse("staff@atelier.in").unwrap(),
            role,
            name: "Staff".to_string(),
        }
    }

    fn order(status: OrderStatus, method: PaymentMethod) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(1),
            order_number: "ORD-20260301-ABC234".to_string(),
            user_id: UserId::new(2),
            items: vec![],
            shipping_address: ShippingAddress {
                full_name: "Asha Rao".to_string(),
                phone: "9876543210".to_string(),
                line1: "12 MG Road".to_string(),
                line2: None,
                city: "Bengaluru".to_string(),
                state: "Karnataka".to_string(),
                postal_code: "560001".to_string(),
                country: "India".to_string(),
            },
            subtotal: Decimal::new(100, 0),
            shipping_cost: Decimal::ZERO,
            total: Decimal::new(100, 0),
            status,
            status_history: vec![StatusHistoryEntry {
                status: OrderStatus::Pending,
                note: Some("Order placed".to_string()),
                changed_by: Some(UserId::new(2)),
                changed_at: now,
            }],
            payment: PaymentInfo::pending(method),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let order = order(OrderStatus::Pending, PaymentMethod::Cod);
        let result = apply_transition(
            &order,
            OrderStatus::Shipped,
            &actor(UserRole::Admin),
            None,
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(OrderUpdateError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped
            })
        ));
    }

    #[test]
    fn test_transition_appends_history_with_actor() {
        let order = order(OrderStatus::Pending, PaymentMethod::Cod);
        let (history, payment) = apply_transition(
            &order,
            OrderStatus::Confirmed,
            &actor(UserRole::Admin),
            Some("  called customer ".to_string()),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(history.len(), 2);
        let last = history.last().unwrap();
        assert_eq!(last.status, OrderStatus::Confirmed);
        assert_eq!(last.note.as_deref(), Some("called customer"));
        assert_eq!(last.changed_by, Some(UserId::new(9)));
        assert_eq!(payment, order.payment);
    }

    #[test]
    fn test_cod_delivery_marks_payment_paid() {
        let order = order(OrderStatus::Shipped, PaymentMethod::Cod);
        let now = Utc::now();
        let (_, payment) = apply_transition(
            &order,
            OrderStatus::Delivered,
            &actor(UserRole::Warehouse),
            None,
            now,
        )
        .unwrap();

        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.paid_at, Some(now));
    }

    #[test]
    fn test_bank_transfer_delivery_leaves_payment_alone() {
        let order = order(OrderStatus::Shipped, PaymentMethod::BankTransfer);
        let (_, payment) = apply_transition(
            &order,
            OrderStatus::Delivered,
            &actor(UserRole::Admin),
            None,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[test]
    fn test_refund_marks_payment_refunded() {
        let order = order(OrderStatus::Delivered, PaymentMethod::Payu);
        let (_, payment) = apply_transition(
            &order,
            OrderStatus::Refunded,
            &actor(UserRole::Admin),
            None,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(payment.status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_warehouse_limited_to_fulfilment_steps() {
        use OrderStatus::{Cancelled, Confirmed, Delivered, Pending, Processing, Shipped};

        assert!(authorize(UserRole::Warehouse, Confirmed, Processing).is_ok());
        assert!(authorize(UserRole::Warehouse, Shipped, Delivered).is_ok());
        assert!(matches!(
            authorize(UserRole::Warehouse, Pending, Confirmed),
            Err(OrderUpdateError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(UserRole::Warehouse, Processing, Cancelled),
            Err(OrderUpdateError::Forbidden(_))
        ));
        assert!(authorize(UserRole::Admin, Pending, Cancelled).is_ok());
        assert!(authorize(UserRole::Customer, Pending, Cancelled).is_err());
    }
}
