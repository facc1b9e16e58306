//! User repository for database operations.
//!
//! Queries are built at runtime with `sqlx::query_as` and mapped through
//! `FromRow` row types.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use atelier_core::{Email, Page, Pagination, UserId, UserRole};

use super::{RepositoryError, contains_pattern};
use crate::models::user::{LockOut, User};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    role: UserRole,
    login_attempts: i32,
    lock_until: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserWithPassword {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            user: User {
                id: row.id,
                email,
                first_name: row.first_name,
                last_name: row.last_name,
                phone: row.phone,
                role: row.role,
                login_attempts: row.login_attempts,
                lock_until: row.lock_until,
                last_login_at: row.last_login_at,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            password_hash: row.password_hash,
        })
    }
}

fn into_user(row: UserRow) -> Result<User, RepositoryError> {
    UserWithPassword::try_from(row).map(|u| u.user)
}

/// A user together with their stored Argon2 hash.
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    pub password_hash: String,
}

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
}

/// Staff edits to an account. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
}

/// Filters for the staff user listing.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub search: Option<String>,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(r"SELECT * FROM atelier.user WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(into_user).transpose()
    }

    /// Get a user and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<UserWithPassword>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(r"SELECT * FROM atelier.user WHERE email = $1")
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?;

        row.map(UserWithPassword::try_from).transpose()
    }

    /// Get a user and their password hash by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password(
        &self,
        id: UserId,
    ) -> Result<Option<UserWithPassword>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(r"SELECT * FROM atelier.user WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(UserWithPassword::try_from).transpose()
    }

    /// Create a new account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO atelier.user (email, password_hash, first_name, last_name, phone, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(new.email.as_str())
        .bind(&new.password_hash)
        .bind(new.first_name.trim())
        .bind(new.last_name.trim())
        .bind(new.phone.as_deref())
        .bind(new.role)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "email already exists"))?;

        into_user(row)
    }

    /// List users, newest first.
    ///
    /// `search` matches email, first name or last name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &UserFilter,
        pagination: Pagination,
    ) -> Result<Page<User>, RepositoryError> {
        let search = filter.search.as_deref().map(contains_pattern);

        let rows = sqlx::query_as::<_, UserRow>(
            r"
            SELECT * FROM atelier.user
            WHERE ($1::atelier.user_role IS NULL OR role = $1)
              AND ($2::text IS NULL
                   OR email ILIKE $2 OR first_name ILIKE $2 OR last_name ILIKE $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(filter.role)
        .bind(search.as_deref())
        .bind(pagination.limit_i64())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*) FROM atelier.user
            WHERE ($1::atelier.user_role IS NULL OR role = $1)
              AND ($2::text IS NULL
                   OR email ILIKE $2 OR first_name ILIKE $2 OR last_name ILIKE $2)
            ",
        )
        .bind(filter.role)
        .bind(search.as_deref())
        .fetch_one(self.pool)
        .await?;

        let users = rows
            .into_iter()
            .map(into_user)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(users, pagination, total))
    }

    /// Apply profile or staff edits.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update(&self, id: UserId, changes: &UserChanges) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE atelier.user SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone = COALESCE($4, phone),
                role = COALESCE($5, role)
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(changes.first_name.as_deref().map(str::trim))
        .bind(changes.last_name.as_deref().map(str::trim))
        .bind(changes.phone.as_deref().map(str::trim))
        .bind(changes.role)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        into_user(row)
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(r"UPDATE atelier.user SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Hard-delete a user. Returns `false` if no row matched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(r"DELETE FROM atelier.user WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count a failed password check at `now`, applying
    /// [`LockOut::after_failure`] under a row lock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_failed_login(
        &self,
        id: UserId,
        now: DateTime<Utc>,
        max_attempts: i32,
        lock_for: Duration,
    ) -> Result<LockOut, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (attempts, lock_until) = sqlx::query_as::<_, (i32, Option<DateTime<Utc>>)>(
            r"SELECT login_attempts, lock_until FROM atelier.user WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let counters = LockOut {
            attempts,
            lock_until,
        }
        .after_failure(now, max_attempts, lock_for);

        sqlx::query(
            r"
            UPDATE atelier.user
            SET login_attempts = $2, lock_until = $3
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(counters.attempts)
        .bind(counters.lock_until)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(counters)
    }

    /// Reset lock-out counters and stamp the login time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_successful_login(&self, id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE atelier.user
            SET login_attempts = 0, lock_until = NULL, last_login_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Clear a lock-out explicitly.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unlock(&self, id: UserId) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE atelier.user SET login_attempts = 0, lock_until = NULL
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        into_user(row)
    }
}
