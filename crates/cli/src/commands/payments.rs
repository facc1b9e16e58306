//! Payment maintenance commands.

use atelier_api::services::expiry;

use super::{CommandError, connect};

/// Delete expired PayU payment attempts now, without waiting for the
/// server's sweeper.
pub async fn purge_expired() -> Result<(), CommandError> {
    let pool = connect().await?;
    let removed = expiry::purge_expired(&pool).await?;
    tracing::info!("Removed {removed} expired payment attempt(s)");
    Ok(())
}
