//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as
//! `{"success": false, "message": "..."}`; server errors are captured to
//! Sentry and the client only sees a generic message.

use axum::{
    Json,
    extract::multipart::MultipartError,
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::product::InventoryError;
use crate::services::auth::AuthError;
use crate::services::auth::token::TokenError;
use crate::services::checkout::CheckoutError;
use crate::services::email::EmailError;
use crate::services::orders::OrderUpdateError;
use crate::services::payu::PayuError;
use crate::services::uploads::UploadError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Order(#[from] OrderUpdateError),

    #[error(transparent)]
    Payu(#[from] PayuError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Email(#[from] EmailError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Missing or unusable credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// Malformed or invalid input.
    #[error("{0}")]
    BadRequest(String),

    /// Uniqueness or state conflict.
    #[error("{0}")]
    Conflict(String),

    /// A feature whose provider isn't configured.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "Internal server error";

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_)
                | AuthError::WeakPassword(_)
                | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::AccountLocked { .. } => StatusCode::LOCKED,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::RoleNotAssignable(_) => StatusCode::FORBIDDEN,
                AuthError::Repository(err) => repository_status(err),
                AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Token(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Checkout(err) => Self::checkout_status(err),
            Self::Order(err) => match err {
                OrderUpdateError::NotFound => StatusCode::NOT_FOUND,
                OrderUpdateError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
                OrderUpdateError::Forbidden(_) => StatusCode::FORBIDDEN,
                OrderUpdateError::Repository(err) => repository_status(err),
                OrderUpdateError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Payu(err) => match err {
                PayuError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                PayuError::InvalidHash => StatusCode::BAD_REQUEST,
                PayuError::AttemptNotFound => StatusCode::NOT_FOUND,
                PayuError::Checkout(err) => Self::checkout_status(err),
                PayuError::Repository(err) => repository_status(err),
                PayuError::Cart(_) | PayuError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Upload(err) => match err {
                UploadError::NoFiles
                | UploadError::TooManyFiles
                | UploadError::UnsupportedType(_)
                | UploadError::InvalidName => StatusCode::BAD_REQUEST,
                UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                UploadError::NotFound => StatusCode::NOT_FOUND,
                UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Email(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn checkout_status(err: &CheckoutError) -> StatusCode {
        match err {
            CheckoutError::OutOfStock { .. } => StatusCode::CONFLICT,
            CheckoutError::Repository(err) => repository_status(err),
            CheckoutError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show the client.
    fn client_message(&self, status: StatusCode) -> String {
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return INTERNAL_MESSAGE.to_string();
        }

        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Auth(AuthError::InvalidCredentials) => "Invalid email or password".to_string(),
            Self::Auth(AuthError::AccountLocked { until }) => format!(
                "Account locked after too many failed attempts. Try again after {}",
                until.format("%Y-%m-%d %H:%M UTC")
            ),
            Self::Auth(AuthError::UserAlreadyExists) => {
                "An account with this email already exists".to_string()
            }
            Self::Auth(AuthError::InvalidEmail(_)) => "Invalid email address".to_string(),
            Self::Auth(AuthError::WeakPassword(msg)) => msg.clone(),
            Self::Token(TokenError::Expired) => "Token has expired".to_string(),
            Self::Token(_) => "Invalid or missing token".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = json!({
            "success": false,
            "message": self.client_message(status),
        });

        (status, Json(body)).into_response()
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(RepositoryError::Database(err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(err.body_text())
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use atelier_core::{OrderStatus, ProductId, UserRole};

    use super::*;
    use crate::models::product::StockError;

    fn status_of(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    async fn body_of(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(status_of(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(AppError::Unauthorized("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AppError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_of(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_errors_map_to_statuses() {
        assert_eq!(status_of(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AuthError::AccountLocked { until: Utc::now() }),
            StatusCode::LOCKED
        );
        assert_eq!(status_of(AuthError::UserAlreadyExists), StatusCode::CONFLICT);
        assert_eq!(
            status_of(AuthError::RoleNotAssignable(UserRole::SuperAdmin)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_of(TokenError::Expired), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(CheckoutError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(CheckoutError::OutOfStock {
                product: "Linen Shirt".into(),
                source: StockError::Insufficient {
                    color: "White".into(),
                    size: "M".into(),
                    available: 1,
                },
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(OrderUpdateError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered,
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PayuError::Checkout(CheckoutError::ProductUnavailable(
                ProductId::new(3)
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(PayuError::InvalidHash), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(UploadError::InvalidName), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(RepositoryError::Conflict("slug taken".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(RepositoryError::DataCorruption("bad json".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_envelope_shape() {
        let body = body_of(AppError::BadRequest("name is required".into())).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "name is required");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let body = body_of(AppError::Database(RepositoryError::DataCorruption(
            "order 7 items column".into(),
        )))
        .await;
        assert_eq!(body["message"], INTERNAL_MESSAGE);
    }
}
