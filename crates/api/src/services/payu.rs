//! PayU hosted checkout.
//!
//! `initiate` prices the cart, stages a payment attempt and returns the form
//! the SPA auto-submits to PayU. PayU posts the result back to
//! `/api/payments/payu/callback`; a verified success places the order from
//! the staged cart snapshot and completes the attempt.
//!
//! Hash formats (lowercase hex SHA-512):
//!
//! ```text
//! request:  key|txnid|amount|productinfo|firstname|email|udf1|udf2|udf3|udf4|udf5||||||salt
//! response: salt|status||||||udf5|udf4|udf3|udf2|udf1|email|firstname|productinfo|amount|txnid|key
//! ```

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use atelier_core::{AttemptStatus, Money, OrderId, PaymentMethod, UserId, format_amount};

use crate::config::{PayuConfig, StoreConfig};
use crate::db::{PaymentAttemptRepository, RepositoryError};
use crate::models::order::{Order, PaymentInfo};
use crate::models::payment_attempt::PaymentAttempt;
use crate::models::user::User;
use crate::services::checkout::{CheckoutError, CheckoutRequest, CheckoutService};
use crate::services::constant_time_compare;

/// Status PayU reports for a captured payment.
const STATUS_SUCCESS: &str = "success";

/// Errors from the PayU flow.
#[derive(Debug, Error)]
pub enum PayuError {
    #[error("PayU is not configured")]
    NotConfigured,

    #[error("payment hash verification failed")]
    InvalidHash,

    #[error("payment attempt not found")]
    AttemptNotFound,

    #[error("stored cart is unreadable: {0}")]
    Cart(#[from] serde_json::Error),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The five user-defined fields PayU echoes back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Udf {
    #[serde(default)]
    pub udf1: String,
    #[serde(default)]
    pub udf2: String,
    #[serde(default)]
    pub udf3: String,
    #[serde(default)]
    pub udf4: String,
    #[serde(default)]
    pub udf5: String,
}

/// Form fields posted to PayU's `_payment` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentForm {
    pub key: String,
    pub txnid: String,
    pub amount: String,
    pub productinfo: String,
    pub firstname: String,
    pub email: String,
    pub phone: String,
    pub surl: String,
    pub furl: String,
    #[serde(flatten)]
    pub udf: Udf,
    pub hash: String,
}

/// What the SPA needs to hand the shopper to PayU.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedPayment {
    pub txn_id: String,
    pub action: String,
    pub amount: Money,
    pub expires_at: DateTime<Utc>,
    pub params: PaymentForm,
}

/// The form PayU posts back.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackForm {
    pub txnid: String,
    #[serde(default)]
    pub mihpayid: Option<String>,
    pub status: String,
    pub amount: String,
    #[serde(default)]
    pub productinfo: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub email: String,
    #[serde(flatten)]
    pub udf: Udf,
    pub hash: String,
    #[serde(default, rename = "error_Message")]
    pub error_message: Option<String>,
}

/// Result of processing a callback.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// The order was placed by this callback.
    Completed(Order),
    /// A previous callback already placed the order.
    AlreadyCompleted { txn_id: String, order_id: Option<OrderId> },
    /// The payment did not go through; the attempt is marked failed.
    Failed { txn_id: String, reason: String },
}

fn sha512_hex(input: &str) -> String {
    hex::encode(Sha512::digest(input.as_bytes()))
}

/// Hash signing a payment request.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn request_hash(
    key: &str,
    txnid: &str,
    amount: &str,
    productinfo: &str,
    firstname: &str,
    email: &str,
    udf: &Udf,
    salt: &str,
) -> String {
    sha512_hex(&format!(
        "{key}|{txnid}|{amount}|{productinfo}|{firstname}|{email}|{}|{}|{}|{}|{}||||||{salt}",
        udf.udf1, udf.udf2, udf.udf3, udf.udf4, udf.udf5
    ))
}

/// Reverse hash PayU sends with its response.
#[must_use]
pub fn response_hash(form: &CallbackForm, key: &str, salt: &str) -> String {
    sha512_hex(&format!(
        "{salt}|{}||||||{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{key}",
        form.status,
        form.udf.udf5,
        form.udf.udf4,
        form.udf.udf3,
        form.udf.udf2,
        form.udf.udf1,
        form.email,
        form.firstname,
        form.productinfo,
        form.amount,
        form.txnid,
    ))
}

/// Check a callback's hash in constant time.
///
/// # Errors
///
/// Returns `PayuError::InvalidHash` on mismatch.
pub fn verify_callback(config: &PayuConfig, form: &CallbackForm) -> Result<(), PayuError> {
    let expected = response_hash(
        form,
        &config.merchant_key,
        config.merchant_salt.expose_secret(),
    );
    if constant_time_compare(&expected, &form.hash.to_ascii_lowercase()) {
        Ok(())
    } else {
        Err(PayuError::InvalidHash)
    }
}

/// A fresh transaction id: `ATL` + milliseconds + 4 hex digits (≤ 25 chars).
#[must_use]
pub fn generate_txn_id(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::rng().random();
    format!("ATL{}{suffix:04X}", now.timestamp_millis())
}

/// Whether the amount PayU reports equals the staged amount.
fn amount_matches(reported: &str, staged: Money) -> bool {
    reported
        .trim()
        .parse::<Decimal>()
        .is_ok_and(|amount| format_amount(amount) == format_amount(staged))
}

/// What a verified callback does to its attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallbackAction {
    /// The order already exists.
    Replay,
    /// PayU reported a non-success status.
    Declined(String),
    /// PayU captured a different amount than was staged.
    AmountMismatch(String),
    /// Place the order from the staged cart.
    PlaceOrder,
}

fn callback_action(status: AttemptStatus, staged: Money, form: &CallbackForm) -> CallbackAction {
    if status == AttemptStatus::Completed {
        return CallbackAction::Replay;
    }
    if !form.status.eq_ignore_ascii_case(STATUS_SUCCESS) {
        let reason = form
            .error_message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("payment {}", form.status));
        return CallbackAction::Declined(reason);
    }
    if !amount_matches(&form.amount, staged) {
        return CallbackAction::AmountMismatch(format!(
            "amount mismatch: expected {}, got {}",
            format_amount(staged),
            form.amount
        ));
    }
    CallbackAction::PlaceOrder
}

/// Whether a placement failure leaves a captured payment without an order,
/// as opposed to a database fault that should surface as an error.
fn is_unfulfillable(error: &CheckoutError) -> bool {
    !matches!(error, CheckoutError::Repository(_) | CheckoutError::Database(_))
}

/// PayU service.
pub struct PayuService<'a> {
    pool: &'a PgPool,
    store: &'a StoreConfig,
    config: &'a PayuConfig,
    public_url: &'a str,
}

impl<'a> PayuService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        store: &'a StoreConfig,
        config: &'a PayuConfig,
        public_url: &'a str,
    ) -> Self {
        Self {
            pool,
            store,
            config,
            public_url,
        }
    }

    fn callback_url(&self) -> String {
        format!("{}/api/payments/payu/callback", self.public_url)
    }

    /// Price the cart and stage an attempt.
    ///
    /// # Errors
    ///
    /// Returns `PayuError::Checkout` if the cart can't be fulfilled.
    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn initiate(
        &self,
        user: &User,
        request: &CheckoutRequest,
    ) -> Result<InitiatedPayment, PayuError> {
        let quote = CheckoutService::new(self.pool, self.store)
            .quote(request)
            .await?;

        let now = Utc::now();
        let txn_id = generate_txn_id(now);
        let expires_at = now + Duration::minutes(self.store.payment_attempt_ttl_minutes);

        let mut cart = request.clone();
        cart.payment_method = PaymentMethod::Payu;
        let attempt = PaymentAttemptRepository::new(self.pool)
            .create(
                &txn_id,
                user.id,
                &serde_json::to_value(&cart)?,
                quote.total,
                expires_at,
            )
            .await?;

        let amount = format_amount(attempt.amount);
        let productinfo = format!("Atelier order ({} items)", quote.items.len());
        let firstname = user.first_name.trim().to_string();
        let email = user.email.to_string();
        let udf = Udf {
            udf1: user.id.to_string(),
            ..Udf::default()
        };
        let hash = request_hash(
            &self.config.merchant_key,
            &txn_id,
            &amount,
            &productinfo,
            &firstname,
            &email,
            &udf,
            self.config.merchant_salt.expose_secret(),
        );

        info!(txn_id = %txn_id, amount = %amount, "PayU attempt staged");

        Ok(InitiatedPayment {
            txn_id: txn_id.clone(),
            action: self.config.payment_url(),
            amount: attempt.amount,
            expires_at,
            params: PaymentForm {
                key: self.config.merchant_key.clone(),
                txnid: txn_id,
                amount,
                productinfo,
                firstname,
                email,
                phone: request.shipping_address.phone.clone(),
                surl: self.callback_url(),
                furl: self.callback_url(),
                udf,
                hash,
            },
        })
    }

    /// Process PayU's result for an attempt.
    ///
    /// Repeated callbacks for a completed attempt return the existing order.
    ///
    /// # Errors
    ///
    /// Returns `PayuError::InvalidHash` for unsigned or tampered posts and
    /// `PayuError::AttemptNotFound` for unknown transaction ids.
    #[instrument(skip(self, form), fields(txn_id = %form.txnid, status = %form.status))]
    pub async fn handle_callback(&self, form: &CallbackForm) -> Result<CallbackOutcome, PayuError> {
        verify_callback(self.config, form)?;

        let mut tx = self.pool.begin().await?;
        let attempt = PaymentAttemptRepository::get_for_update(&mut *tx, &form.txnid)
            .await?
            .ok_or(PayuError::AttemptNotFound)?;

        let gateway_id = form.mihpayid.as_deref().filter(|id| !id.is_empty());

        let reason = match callback_action(attempt.status, attempt.amount, form) {
            CallbackAction::Replay => {
                info!(order_id = ?attempt.order_id, "Duplicate PayU callback");
                return Ok(CallbackOutcome::AlreadyCompleted {
                    txn_id: attempt.txn_id,
                    order_id: attempt.order_id,
                });
            }
            CallbackAction::Declined(reason) => {
                warn!(reason = %reason, "PayU payment failed");
                Some(reason)
            }
            CallbackAction::AmountMismatch(reason) => {
                error!(reason = %reason, "PayU amount mismatch");
                Some(reason)
            }
            CallbackAction::PlaceOrder => None,
        };
        if let Some(reason) = reason {
            PaymentAttemptRepository::mark_failed(&mut *tx, attempt.id, gateway_id, &reason)
                .await?;
            tx.commit().await?;
            return Ok(CallbackOutcome::Failed {
                txn_id: attempt.txn_id,
                reason,
            });
        }

        let cart: CheckoutRequest = serde_json::from_value(attempt.cart.clone())?;
        let payment = PaymentInfo::paid(
            PaymentMethod::Payu,
            gateway_id.unwrap_or(&attempt.txn_id).to_string(),
            Utc::now(),
        );

        let placed =
            CheckoutService::place_order_in(&mut *tx, self.store, attempt.user_id, &cart, payment)
                .await;
        match placed {
            Ok(order) => {
                PaymentAttemptRepository::mark_completed(
                    &mut *tx,
                    attempt.id,
                    order.id,
                    gateway_id,
                )
                .await?;
                tx.commit().await?;
                info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    "PayU order placed"
                );
                Ok(CallbackOutcome::Completed(order))
            }
            Err(e) if !is_unfulfillable(&e) => Err(e.into()),
            Err(e) => {
                // Payment captured but the cart can no longer be fulfilled.
                tx.rollback().await?;
                let reason = e.to_string();
                error!(error = %reason, "PayU payment captured but order could not be placed");
                self.fail_detached(&attempt, gateway_id, &reason).await?;
                Ok(CallbackOutcome::Failed {
                    txn_id: attempt.txn_id,
                    reason,
                })
            }
        }
    }

    async fn fail_detached(
        &self,
        attempt: &PaymentAttempt,
        gateway_id: Option<&str>,
        reason: &str,
    ) -> Result<(), PayuError> {
        let mut conn = self.pool.acquire().await?;
        PaymentAttemptRepository::mark_failed(&mut *conn, attempt.id, gateway_id, reason).await?;
        Ok(())
    }

    /// An attempt, visible only to the shopper who started it.
    ///
    /// # Errors
    ///
    /// Returns `PayuError::AttemptNotFound` for unknown ids and other users'
    /// attempts.
    pub async fn status(&self, txn_id: &str, user_id: UserId) -> Result<PaymentAttempt, PayuError> {
        PaymentAttemptRepository::new(self.pool)
            .get_by_txn_id(txn_id)
            .await?
            .filter(|attempt| attempt.user_id == user_id)
            .ok_or(PayuError::AttemptNotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config() -> PayuConfig {
        PayuConfig {
            merchant_key: "gtKFFx".to_string(),
            merchant_salt: SecretString::from("4R38IvwiV57FwVpsgOvTXBdLE4tHUXFW".to_string()),
            base_url: "https://test.payu.in".to_string(),
        }
    }

    fn callback(status: &str, amount: &str) -> CallbackForm {
        let mut form = CallbackForm {
            txnid: "ATL1700000000000ABCD".to_string(),
            mihpayid: Some("403993715521937565".to_string()),
            status: status.to_string(),
            amount: amount.to_string(),
            productinfo: "Atelier order (1 items)".to_string(),
            firstname: "Asha".to_string(),
            email: "asha@example.in".to_string(),
            udf: Udf {
                udf1: "2".to_string(),
                ..Udf::default()
            },
            hash: String::new(),
            error_message: None,
        };
        let cfg = config();
        form.hash = response_hash(&form, &cfg.merchant_key, cfg.merchant_salt.expose_secret());
        form
    }

    #[test]
    fn test_request_hash_matches_documented_layout() {
        let udf = Udf::default();
        let hash = request_hash(
            "gtKFFx", "txn1", "10.00", "shirt", "Asha", "asha@example.in", &udf, "salt",
        );
        let expected =
            sha512_hex("gtKFFx|txn1|10.00|shirt|Asha|asha@example.in|||||||||||salt");
        assert_eq!(hash, expected);
        assert_eq!(hash.len(), 128);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_response_hash_is_reversed_order() {
        let form = callback("success", "1499.50");
        let expected = sha512_hex(
            "4R38IvwiV57FwVpsgOvTXBdLE4tHUXFW|success||||||||||2|asha@example.in|Asha|\
             Atelier order (1 items)|1499.50|ATL1700000000000ABCD|gtKFFx",
        );
        assert_eq!(response_hash(&form, "gtKFFx", "4R38IvwiV57FwVpsgOvTXBdLE4tHUXFW"), expected);
    }

    #[test]
    fn test_verify_callback_accepts_signed_form() {
        assert!(verify_callback(&config(), &callback("success", "1499.50")).is_ok());
    }

    #[test]
    fn test_verify_callback_rejects_tampering() {
        let mut form = callback("failure", "1499.50");
        form.status = "success".to_string();
        assert!(matches!(
            verify_callback(&config(), &form),
            Err(PayuError::InvalidHash)
        ));

        let mut form = callback("success", "1499.50");
        form.amount = "1.00".to_string();
        assert!(verify_callback(&config(), &form).is_err());
    }

    #[test]
    fn test_amount_matching_normalises_decimals() {
        let staged = Decimal::new(149_950, 2);
        assert!(amount_matches("1499.50", staged));
        assert!(amount_matches("1499.5", staged));
        assert!(!amount_matches("1499.49", staged));
        assert!(!amount_matches("abc", staged));
    }

    #[test]
    fn test_completed_attempt_replays_instead_of_placing_again() {
        let staged = Decimal::new(149_950, 2);
        let form = callback("success", "1499.50");
        assert_eq!(
            callback_action(AttemptStatus::Completed, staged, &form),
            CallbackAction::Replay
        );
        // Even a late failure post can't undo a completed attempt.
        assert_eq!(
            callback_action(AttemptStatus::Completed, staged, &callback("failure", "1499.50")),
            CallbackAction::Replay
        );
        assert_eq!(
            callback_action(AttemptStatus::Pending, staged, &form),
            CallbackAction::PlaceOrder
        );
    }

    #[test]
    fn test_declined_payment_carries_gateway_message() {
        let staged = Decimal::new(149_950, 2);
        let mut form = callback("failure", "1499.50");
        form.error_message = Some("Bank declined".to_string());
        assert_eq!(
            callback_action(AttemptStatus::Pending, staged, &form),
            CallbackAction::Declined("Bank declined".to_string())
        );

        form.error_message = Some("  ".to_string());
        assert_eq!(
            callback_action(AttemptStatus::Pending, staged, &form),
            CallbackAction::Declined("payment failure".to_string())
        );
    }

    #[test]
    fn test_amount_mismatch_fails_a_successful_payment() {
        let staged = Decimal::new(149_950, 2);
        let form = callback("success", "1.00");
        assert_eq!(
            callback_action(AttemptStatus::Pending, staged, &form),
            CallbackAction::AmountMismatch(
                "amount mismatch: expected 1499.50, got 1.00".to_string()
            )
        );
    }

    #[test]
    fn test_success_status_is_case_insensitive() {
        let staged = Decimal::new(149_950, 2);
        assert_eq!(
            callback_action(AttemptStatus::Pending, staged, &callback("SUCCESS", "1499.5")),
            CallbackAction::PlaceOrder
        );
    }

    #[test]
    fn test_stock_failures_are_unfulfillable_but_database_faults_are_not() {
        assert!(is_unfulfillable(&CheckoutError::EmptyCart));
        assert!(is_unfulfillable(&CheckoutError::ProductUnavailable(
            atelier_core::ProductId::new(7)
        )));
        assert!(!is_unfulfillable(&CheckoutError::Database(
            sqlx::Error::RowNotFound
        )));
        assert!(!is_unfulfillable(&CheckoutError::Repository(
            RepositoryError::NotFound
        )));
    }

    #[test]
    fn test_txn_id_fits_gateway_limit() {
        let id = generate_txn_id(Utc::now());
        assert!(id.starts_with("ATL"));
        assert!(id.len() <= 25);
    }

    #[test]
    fn test_callback_form_parses_gateway_fields() {
        let body = "txnid=ATL1&mihpayid=99&status=failure&amount=10.00&productinfo=x\
                    &firstname=A&email=a%40b.in&udf1=2&hash=abc&error_Message=Bank+declined";
        let form: CallbackForm = parse_form(body);
        assert_eq!(form.udf.udf1, "2");
        assert_eq!(form.error_message.as_deref(), Some("Bank declined"));
        assert_eq!(form.email, "a@b.in");
    }

    fn parse_form(body: &str) -> CallbackForm {
        let pairs: serde_json::Map<String, serde_json::Value> =
            url::form_urlencoded::parse(body.as_bytes())
                .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
                .collect();
        serde_json::from_value(serde_json::Value::Object(pairs)).unwrap()
    }
}
