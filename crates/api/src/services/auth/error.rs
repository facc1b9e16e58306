//! Account and login failures.

use chrono::{DateTime, Utc};
use thiserror::Error;

use atelier_core::{EmailError, UserRole};

use crate::db::RepositoryError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Wrong password or unknown email; the two are indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Too many failed logins. Cleared automatically at `until`.
    #[error("account locked")]
    AccountLocked { until: DateTime<Utc> },

    #[error("user not found")]
    UserNotFound,

    #[error("an account with this email already exists")]
    UserAlreadyExists,

    #[error("{0}")]
    WeakPassword(String),

    /// Blank names and other malformed profile input.
    #[error("{0}")]
    Validation(String),

    /// The acting account's role does not outrank the requested one.
    #[error("not allowed to assign role {0}")]
    RoleNotAssignable(UserRole),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("password hashing failed")]
    PasswordHash,
}
