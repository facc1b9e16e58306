//! Account routes: registration, login, profile, and staff user management.

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use atelier_core::{Page, Pagination, UserId, UserRole};

use crate::db::UserRepository;
use crate::db::users::{UserChanges, UserFilter};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAuth, RequireUserAdmin};
use crate::models::User;
use crate::response::{ApiJson, ApiPath, ApiQuery, ApiResponse, Message};
use crate::services::auth::token::IssuedToken;
use crate::services::auth::{AuthService, Registration};
use crate::state::AppState;

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Self {
            email: req.email,
            password: req.password,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            phone: req.phone,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A user plus a fresh bearer token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    #[serde(flatten)]
    pub token: IssuedToken,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub role: Option<UserRole>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(flatten)]
    pub account: RegisterRequest,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
}

/// Trim a name edit; blank names are rejected rather than stored.
fn name_change(field: &str, value: Option<String>) -> Result<Option<String>> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.is_empty() => Err(AppError::BadRequest(format!("{field} must not be empty"))),
        other => Ok(other),
    }
}

fn issue_token(state: &AppState, user: User) -> Result<AuthResponse> {
    let token = state.tokens().issue(user.id, user.role, Utc::now())?;
    Ok(AuthResponse { user, token })
}

// =============================================================================
// Self-service
// =============================================================================

/// POST /api/users/register
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<ApiResponse<AuthResponse>> {
    let user = AuthService::new(state.pool())
        .register(&req.into())
        .await?;
    Ok(ApiResponse::created(issue_token(&state, user)?))
}

/// POST /api/users/login
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>> {
    let user = AuthService::new(state.pool())
        .login(&req.email, &req.password, Utc::now())
        .await?;
    info!(user_id = %user.id, "User logged in");
    Ok(ApiResponse::ok(issue_token(&state, user)?))
}

/// GET /api/users/me
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<ApiResponse<User>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(ApiResponse::ok(user))
}

/// PUT /api/users/me
#[instrument(skip(state, current, req), fields(user_id = %current.id))]
pub async fn update_me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    ApiJson(req): ApiJson<ProfileUpdate>,
) -> Result<ApiResponse<User>> {
    let changes = UserChanges {
        first_name: name_change("firstName", req.first_name)?,
        last_name: req.last_name.map(|v| v.trim().to_string()),
        phone: req.phone.map(|v| v.trim().to_string()),
        role: None,
    };
    let user = UserRepository::new(state.pool())
        .update(current.id, &changes)
        .await?;
    Ok(ApiResponse::ok(user))
}

/// PUT /api/users/me/password
#[instrument(skip(state, current, req), fields(user_id = %current.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    ApiJson(req): ApiJson<PasswordChange>,
) -> Result<ApiResponse<Message>> {
    AuthService::new(state.pool())
        .change_password(current.id, &req.current_password, &req.new_password)
        .await?;
    Ok(ApiResponse::ok(Message::new("Password updated")))
}

// =============================================================================
// Staff management
// =============================================================================

/// GET /api/users
pub async fn list(
    State(state): State<AppState>,
    RequireUserAdmin(_): RequireUserAdmin,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> Result<ApiResponse<Page<User>>> {
    let filter = UserFilter {
        role: query.role,
        search: query.search.filter(|s| !s.trim().is_empty()),
    };
    let page = UserRepository::new(state.pool())
        .list(&filter, Pagination::new(query.page, query.limit))
        .await?;
    Ok(ApiResponse::ok(page))
}

/// POST /api/users
#[instrument(skip(state, actor, req), fields(actor_id = %actor.id, role = %req.role))]
pub async fn create(
    State(state): State<AppState>,
    RequireUserAdmin(actor): RequireUserAdmin,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<ApiResponse<User>> {
    let user = AuthService::new(state.pool())
        .create_with_role(actor.role, &req.account.into(), req.role)
        .await?;
    Ok(ApiResponse::created(user))
}

async fn find_user(state: &AppState, id: UserId) -> Result<User> {
    UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// GET /api/users/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireUserAdmin(_): RequireUserAdmin,
    ApiPath(id): ApiPath<UserId>,
) -> Result<ApiResponse<User>> {
    Ok(ApiResponse::ok(find_user(&state, id).await?))
}

/// Whether `actor` may move `target` from its current role to `to`.
fn check_role_change(
    actor_role: UserRole,
    actor_id: UserId,
    target: &User,
    to: UserRole,
) -> Result<()> {
    if to == target.role {
        return Ok(());
    }
    if actor_id == target.id {
        return Err(AppError::Forbidden("You cannot change your own role".to_string()));
    }
    if !actor_role.can_assign(target.role) || !actor_role.can_assign(to) {
        return Err(AppError::Forbidden(format!(
            "Not allowed to change a {} account to {to}",
            target.role
        )));
    }
    Ok(())
}

/// PUT /api/users/{id}
#[instrument(skip(state, actor, req), fields(actor_id = %actor.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireUserAdmin(actor): RequireUserAdmin,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(req): ApiJson<AdminUserUpdate>,
) -> Result<ApiResponse<User>> {
    let target = find_user(&state, id).await?;
    if let Some(role) = req.role {
        check_role_change(actor.role, actor.id, &target, role)?;
    }

    let changes = UserChanges {
        first_name: name_change("firstName", req.first_name)?,
        last_name: req.last_name.map(|v| v.trim().to_string()),
        phone: req.phone.map(|v| v.trim().to_string()),
        role: req.role,
    };
    let user = UserRepository::new(state.pool())
        .update(id, &changes)
        .await?;

    info!(user_id = %id, role = %user.role, "User updated by staff");
    Ok(ApiResponse::ok(user))
}

/// DELETE /api/users/{id}
#[instrument(skip(state, actor), fields(actor_id = %actor.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireUserAdmin(actor): RequireUserAdmin,
    ApiPath(id): ApiPath<UserId>,
) -> Result<ApiResponse<Message>> {
    if actor.id == id {
        return Err(AppError::Forbidden("You cannot delete your own account".to_string()));
    }
    let target = find_user(&state, id).await?;
    if target.role == UserRole::SuperAdmin {
        return Err(AppError::Forbidden(
            "Super admin accounts cannot be deleted".to_string(),
        ));
    }
    if !actor.role.can_assign(target.role) {
        return Err(AppError::Forbidden(format!(
            "Not allowed to delete a {} account",
            target.role
        )));
    }

    if !UserRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    info!(user_id = %id, "User deleted");
    Ok(ApiResponse::ok(Message::new("User deleted")))
}

/// POST /api/users/{id}/unlock
#[instrument(skip(state, actor), fields(actor_id = %actor.id))]
pub async fn unlock(
    State(state): State<AppState>,
    RequireUserAdmin(actor): RequireUserAdmin,
    ApiPath(id): ApiPath<UserId>,
) -> Result<ApiResponse<User>> {
    let user = UserRepository::new(state.pool()).unlock(id).await?;
    info!(user_id = %id, "Account unlocked");
    Ok(ApiResponse::ok(user))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use atelier_core::Email;

    use super::*;

    fn user(id: i32, role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(id),
            email: Email::parse("staff@atelier.in").unwrap(),
            first_name: "Meera".to_string(),
            last_name: String::new(),
            phone: None,
            role,
            login_attempts: 0,
            lock_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A role change made by account 1.
    fn change_by(actor: UserRole, target: &User, to: UserRole) -> Result<()> {
        check_role_change(actor, UserId::new(1), target, to)
    }

    #[test]
    fn test_admin_cannot_promote_to_admin() {
        let target = user(2, UserRole::Customer);
        assert!(change_by(UserRole::Admin, &target, UserRole::Warehouse).is_ok());
        assert!(matches!(
            change_by(UserRole::Admin, &target, UserRole::Admin),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_admin_cannot_demote_super_admin() {
        let target = user(2, UserRole::SuperAdmin);
        assert!(change_by(UserRole::Admin, &target, UserRole::Customer).is_err());
        assert!(change_by(UserRole::SuperAdmin, &target, UserRole::Admin).is_ok());
    }

    #[test]
    fn test_own_role_is_fixed() {
        let me = user(1, UserRole::SuperAdmin);
        assert!(change_by(UserRole::SuperAdmin, &me, UserRole::Admin).is_err());
        assert!(change_by(UserRole::SuperAdmin, &me, UserRole::SuperAdmin).is_ok());
    }

    #[test]
    fn test_name_change_rejects_blank() {
        assert!(name_change("firstName", Some("   ".to_string())).is_err());
        assert_eq!(
            name_change("firstName", Some(" Ravi ".to_string())).unwrap().as_deref(),
            Some("Ravi")
        );
        assert!(name_change("firstName", None).unwrap().is_none());
    }
}
