//! PayU hosted-checkout routes.
//!
//! PayU posts the result through the shopper's browser to `surl`/`furl`,
//! both pointing at the callback route. Browsers are redirected back to the
//! SPA; clients asking for JSON get the outcome as data.

use axum::{
    extract::State,
    http::{HeaderMap, header::ACCEPT},
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use tracing::{instrument, warn};
use url::Url;

use atelier_core::OrderId;

use crate::config::PayuConfig;
use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::PaymentAttempt;
use crate::response::{ApiForm, ApiJson, ApiPath, ApiResponse};
use crate::services::checkout::CheckoutRequest;
use crate::services::payu::{
    CallbackForm, CallbackOutcome, InitiatedPayment, PayuError, PayuService,
};
use crate::state::AppState;

/// Callback result returned to JSON clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResult {
    pub txn_id: String,
    pub success: bool,
    pub order_id: Option<OrderId>,
    pub order_number: Option<String>,
    pub reason: Option<String>,
}

impl CallbackResult {
    fn new(txn_id: &str, outcome: CallbackOutcome) -> Self {
        let (success, order_id, order_number, reason) = match outcome {
            CallbackOutcome::Completed(order) => {
                (true, Some(order.id), Some(order.order_number), None)
            }
            CallbackOutcome::AlreadyCompleted { order_id, .. } => (true, order_id, None, None),
            CallbackOutcome::Failed { reason, .. } => (false, None, None, Some(reason)),
        };
        Self {
            txn_id: txn_id.to_string(),
            success,
            order_id,
            order_number,
            reason,
        }
    }
}

fn payu_config(state: &AppState) -> Result<&PayuConfig> {
    state
        .config()
        .payu
        .as_ref()
        .ok_or(AppError::Payu(PayuError::NotConfigured))
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}

/// SPA page for a callback result: `/checkout/success` or `/checkout/failure`.
fn result_url(frontend_url: &str, txn_id: &str, result: Option<&CallbackResult>) -> String {
    let page = if result.is_some_and(|r| r.success) {
        "success"
    } else {
        "failure"
    };
    let base = format!("{frontend_url}/checkout/{page}");
    let Ok(mut url) = Url::parse(&base) else {
        return base;
    };
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("txnid", txn_id);
        if let Some(result) = result {
            if let Some(order_id) = result.order_id {
                query.append_pair("orderId", &order_id.to_string());
            }
            if let Some(reason) = &result.reason {
                query.append_pair("reason", reason);
            }
        }
    }
    url.into()
}

/// POST /api/payments/payu/initiate
#[instrument(skip(state, customer, request), fields(user_id = %customer.id))]
pub async fn initiate(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> Result<ApiResponse<InitiatedPayment>> {
    let config = payu_config(&state)?;
    let user = UserRepository::new(state.pool())
        .get_by_id(customer.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    let payment = PayuService::new(
        state.pool(),
        &state.config().store,
        config,
        &state.config().public_url,
    )
    .initiate(&user, &request)
    .await?;
    Ok(ApiResponse::created(payment))
}

/// POST /api/payments/payu/callback
#[instrument(skip(state, headers, form), fields(txn_id = %form.txnid))]
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiForm(form): ApiForm<CallbackForm>,
) -> Result<Response> {
    let config = payu_config(&state)?;
    let outcome = PayuService::new(
        state.pool(),
        &state.config().store,
        config,
        &state.config().public_url,
    )
    .handle_callback(&form)
    .await;

    if wants_json(&headers) {
        let result = CallbackResult::new(&form.txnid, outcome?);
        return Ok(ApiResponse::ok(result).into_response());
    }

    let frontend = &state.config().frontend_url;
    let location = match outcome {
        Ok(outcome) => {
            let result = CallbackResult::new(&form.txnid, outcome);
            result_url(frontend, &form.txnid, Some(&result))
        }
        Err(e @ (PayuError::InvalidHash | PayuError::AttemptNotFound)) => {
            warn!(error = %e, "Rejected PayU callback");
            result_url(frontend, &form.txnid, None)
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Redirect::to(&location).into_response())
}

/// GET /api/payments/payu/status/{txn_id}
pub async fn status(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    ApiPath(txn_id): ApiPath<String>,
) -> Result<ApiResponse<PaymentAttempt>> {
    let config = payu_config(&state)?;
    let attempt = PayuService::new(
        state.pool(),
        &state.config().store,
        config,
        &state.config().public_url,
    )
    .status(&txn_id, customer.id)
    .await?;
    Ok(ApiResponse::ok(attempt))
}
