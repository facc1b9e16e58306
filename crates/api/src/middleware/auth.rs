//! Bearer-token authentication extractors.
//!
//! The token only proves identity; the account is re-read on every request so
//! role changes and deletions apply immediately.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;

use atelier_core::UserRole;

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Extract the token from an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<CurrentUser, AppError> {
    let token = bearer_token(&parts.headers)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
    let claims = state.tokens().verify(token, Utc::now())?;

    let user = UserRepository::new(state.pool())
        .get_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    let current = CurrentUser::from(&user);
    set_sentry_user(&current.id, Some(current.email.as_str()));
    Ok(current)
}

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map(Self)
    }
}

/// Extractor that resolves the caller when a valid token is present.
///
/// Missing or invalid tokens yield `None` instead of a rejection, for
/// public endpoints that show staff more.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl OptionalAuth {
    /// Whether the caller may see inactive products and drafts.
    #[must_use]
    pub fn is_catalog_staff(&self) -> bool {
        self.0.as_ref().is_some_and(|user| user.role.can_manage_catalog())
    }
}

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if bearer_token(&parts.headers).is_none() {
            return Ok(Self(None));
        }
        match authenticate(parts, state).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(AppError::Token(_) | AppError::Unauthorized(_)) => Ok(Self(None)),
            Err(e) => Err(e),
        }
    }
}

/// Authenticate, then require the account's role to pass `allowed`.
async fn authorize(
    parts: &Parts,
    state: &AppState,
    allowed: fn(UserRole) -> bool,
) -> Result<CurrentUser, AppError> {
    let user = authenticate(parts, state).await?;
    if allowed(user.role) {
        Ok(user)
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ))
    }
}

macro_rules! role_extractor {
    ($(#[$meta:meta])* $name:ident, $check:expr) => {
        $(#[$meta])*
        pub struct $name(pub CurrentUser);

        impl FromRequestParts<AppState> for $name {
            type Rejection = AppError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                authorize(parts, state, $check).await.map(Self)
            }
        }
    };
}

role_extractor!(
    /// Any staff role: admin, super admin or warehouse.
    RequireStaff,
    UserRole::is_staff
);

role_extractor!(
    /// Admin or super admin.
    RequireAdmin,
    UserRole::is_admin
);

role_extractor!(
    /// Roles that may list and advance orders.
    RequireFulfilmentStaff,
    UserRole::can_fulfil_orders
);

role_extractor!(
    /// Roles that may list, edit, unlock and delete accounts.
    RequireUserAdmin,
    UserRole::can_manage_users
);

role_extractor!(
    /// Roles that may edit products, categories and uploads.
    RequireCatalogStaff,
    UserRole::can_manage_catalog
);

role_extractor!(
    /// Roles that may adjust inventory counts.
    RequireInventoryStaff,
    UserRole::can_manage_inventory
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer  abc.def ")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
