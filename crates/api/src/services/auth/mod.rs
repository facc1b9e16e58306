//! Authentication service.
//!
//! Password accounts with Argon2id hashes, consecutive-failure lock-out, and
//! HMAC-signed bearer tokens (see [`token`]).

mod error;
pub mod token;

pub use error::AuthError;
pub use token::{Claims, IssuedToken, TokenError, TokenSigner};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use atelier_core::{Email, UserId, UserRole};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::user::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Consecutive failed password checks before the account is locked.
pub const MAX_LOGIN_ATTEMPTS: i32 = 5;

/// How long a lock-out lasts.
#[must_use]
pub fn lock_duration() -> Duration {
    Duration::hours(2)
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Self-service registration; the account is always a customer.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        self.create(registration, UserRole::Customer).await
    }

    /// Staff-created account with an explicit role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RoleNotAssignable` if `actor` may not grant `role`,
    /// plus everything [`Self::register`] can return.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn create_with_role(
        &self,
        actor: UserRole,
        registration: &Registration,
        role: UserRole,
    ) -> Result<User, AuthError> {
        if !actor.can_assign(role) {
            return Err(AuthError::RoleNotAssignable(role));
        }
        self.create(registration, role).await
    }

    async fn create(&self, registration: &Registration, role: UserRole) -> Result<User, AuthError> {
        let email = Email::parse(&registration.email)?;
        validate_password(&registration.password)?;
        if registration.first_name.trim().is_empty() {
            return Err(AuthError::Validation("first name is required".to_string()));
        }

        let password_hash = hash_password(&registration.password)?;

        let user = self
            .users
            .create(&NewUser {
                email,
                password_hash,
                first_name: registration.first_name.clone(),
                last_name: registration.last_name.clone(),
                phone: registration
                    .phone
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
                role,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, role = %user.role, "Account created");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// A locked account is refused even when the password is correct. Each
    /// wrong password counts towards the lock-out; a success resets it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::AccountLocked` while the account is locked.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let found = self
            .users
            .get_with_password_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let mut user = found.user;

        if let Some(until) = user.lock_until.filter(|_| user.is_locked_at(now)) {
            return Err(AuthError::AccountLocked { until });
        }

        if verify_password(password, &found.password_hash).is_err() {
            let failed = self
                .users
                .record_failed_login(user.id, now, MAX_LOGIN_ATTEMPTS, lock_duration())
                .await?;
            warn!(user_id = %user.id, attempts = failed.attempts, "Failed login");

            if let Some(until) = failed.locked_until(now) {
                warn!(user_id = %user.id, until = %until, "Account locked");
                return Err(AuthError::AccountLocked { until });
            }
            return Err(AuthError::InvalidCredentials);
        }

        self.users.record_successful_login(user.id).await?;
        user.login_attempts = 0;
        user.lock_until = None;
        user.last_login_at = Some(now);

        Ok(user)
    }

    /// Change a password after re-checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong.
    /// Returns `AuthError::WeakPassword` if `new` doesn't meet requirements.
    #[instrument(skip(self, current, new))]
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let found = self
            .users
            .get_with_password(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        verify_password(current, &found.password_hash)?;
        validate_password(new)?;

        let password_hash = hash_password(new)?;
        self.users.update_password(user_id, &password_hash).await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
