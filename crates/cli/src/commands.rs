//! CLI command implementations.

pub mod migrate;
pub mod payments;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use atelier_api::db::RepositoryError;
use atelier_api::services::auth::AuthError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: customer, warehouse, admin, super_admin")]
    InvalidRole(String),

    /// Account creation rejected.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Repository error.
    #[error("{0}")]
    Repository(#[from] RepositoryError),
}

/// Connect using `ATELIER_DATABASE_URL`, falling back to `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("ATELIER_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CommandError::MissingEnvVar("ATELIER_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = atelier_api::db::create_pool(&SecretString::from(database_url)).await?;
    Ok(pool)
}
