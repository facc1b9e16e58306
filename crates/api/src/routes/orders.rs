//! Order routes: checkout, history and fulfilment.

use axum::{body::Bytes, extract::State};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use atelier_core::{OrderId, OrderStatus, Page, Pagination, PaymentMethod};

use crate::db::OrderRepository;
use crate::db::orders::OrderFilter;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAuth, RequireFulfilmentStaff};
use crate::models::{CurrentUser, Order, PaymentInfo};
use crate::response::{ApiJson, ApiPath, ApiQuery, ApiResponse};
use crate::services::checkout::{CheckoutRequest, CheckoutService};
use crate::services::email::EmailOutcome;
use crate::services::orders::OrderService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub note: Option<String>,
}

/// Offline payment methods only; PayU goes through `/api/payments/payu`.
fn check_offline(method: PaymentMethod) -> Result<()> {
    if method.is_offline() {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "online payments must be started via /api/payments/payu/initiate".to_string(),
        ))
    }
}

/// The optional `{"note": ...}` body of a cancellation.
fn cancel_note(body: &[u8]) -> Result<Option<String>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let request: CancelRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("invalid cancellation body: {e}")))?;
    Ok(request.note.filter(|n| !n.trim().is_empty()))
}

async fn send_confirmation(state: &AppState, order: &Order, customer: &CurrentUser) {
    match state
        .email()
        .send_order_confirmation(order, &customer.email, &customer.name)
        .await
    {
        Ok(EmailOutcome::Failed) => {
            warn!(order_id = %order.id, "Order confirmation email could not be delivered");
        }
        Ok(outcome) => info!(order_id = %order.id, ?outcome, "Order confirmation email"),
        Err(e) => warn!(order_id = %order.id, error = %e, "Order confirmation email failed"),
    }
}

/// POST /api/orders
#[instrument(skip(state, customer, request), fields(user_id = %customer.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> Result<ApiResponse<Order>> {
    check_offline(request.payment_method)?;

    let order = CheckoutService::new(state.pool(), &state.config().store)
        .place_order(
            customer.id,
            &request,
            PaymentInfo::pending(request.payment_method),
        )
        .await?;

    send_confirmation(&state, &order, &customer).await;
    Ok(ApiResponse::created(order))
}

/// GET /api/orders/mine
pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<ApiResponse<Page<Order>>> {
    let filter = OrderFilter {
        status: None,
        user_id: Some(customer.id),
    };
    let orders = OrderRepository::new(state.pool())
        .list(filter, Pagination::new(query.page, query.limit))
        .await?;
    Ok(ApiResponse::ok(orders))
}

/// GET /api/orders
pub async fn list(
    State(state): State<AppState>,
    RequireFulfilmentStaff(_): RequireFulfilmentStaff,
    ApiQuery(query): ApiQuery<OrderListQuery>,
) -> Result<ApiResponse<Page<Order>>> {
    let filter = OrderFilter {
        status: query.status,
        user_id: None,
    };
    let orders = OrderRepository::new(state.pool())
        .list(filter, Pagination::new(query.page, query.limit))
        .await?;
    Ok(ApiResponse::ok(orders))
}

/// GET /api/orders/{id}
///
/// Customers see only their own orders; someone else's reads as missing.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<ApiResponse<Order>> {
    OrderRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(|order| order.user_id == caller.id || caller.role.can_fulfil_orders())
        .map(ApiResponse::ok)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// PATCH /api/orders/{id}/status
#[instrument(skip(state, actor, body), fields(actor_id = %actor.id, to = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireFulfilmentStaff(actor): RequireFulfilmentStaff,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusUpdate>,
) -> Result<ApiResponse<Order>> {
    let note = body.note.filter(|n| !n.trim().is_empty());
    let order = OrderService::new(state.pool())
        .update_status(&actor, id, body.status, note)
        .await?;
    Ok(ApiResponse::ok(order))
}

/// POST /api/orders/{id}/cancel
#[instrument(skip(state, customer, body), fields(user_id = %customer.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
    body: Bytes,
) -> Result<ApiResponse<Order>> {
    let note = cancel_note(&body)?;
    let order = OrderService::new(state.pool())
        .cancel_own(&customer, id, note)
        .await?;
    Ok(ApiResponse::ok(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_accepts_offline_methods_only() {
        assert!(check_offline(PaymentMethod::Cod).is_ok());
        assert!(check_offline(PaymentMethod::BankTransfer).is_ok());
        assert!(matches!(
            check_offline(PaymentMethod::Payu),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_cancel_note_body_is_optional() {
        assert_eq!(cancel_note(b"").unwrap(), None);
        assert_eq!(cancel_note(b"{}").unwrap(), None);
        assert_eq!(
            cancel_note(br#"{"note":"Ordered the wrong size"}"#).unwrap(),
            Some("Ordered the wrong size".to_string())
        );
        assert!(cancel_note(b"not json").is_err());
    }

    #[test]
    fn test_status_update_body() {
        let body: StatusUpdate =
            serde_json::from_str(r#"{"status":"shipped","note":"AWB 1234"}"#).unwrap();
        assert_eq!(body.status, OrderStatus::Shipped);
        assert_eq!(body.note.as_deref(), Some("AWB 1234"));

        assert!(serde_json::from_str::<StatusUpdate>(r#"{"status":"lost"}"#).is_err());
    }
}
