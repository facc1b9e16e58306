//! Background sweep of expired PayU payment attempts.
//!
//! Attempts outlive `expires_at` by [`CALLBACK_GRACE_HOURS`] so a success callback
//! that PayU delivers late still finds its staged cart.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::db::{PaymentAttemptRepository, RepositoryError};

/// How often expired attempts are purged.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Hours an attempt is kept after it expires.
pub const CALLBACK_GRACE_HOURS: i64 = 24;

/// Attempts that expired at or before this instant may be deleted.
#[must_use]
pub fn purge_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - chrono::Duration::hours(CALLBACK_GRACE_HOURS)
}

/// Delete attempts whose grace period has run out. Returns the number removed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn purge_expired(pool: &PgPool) -> Result<u64, RepositoryError> {
    let removed = PaymentAttemptRepository::new(pool)
        .purge_expired(purge_cutoff(Utc::now()))
        .await?;

    if removed > 0 {
        info!(removed, "Purged expired payment attempts");
    } else {
        debug!("No expired payment attempts");
    }
    Ok(removed)
}

/// Spawn the sweeper. It runs until the returned handle is aborted.
#[must_use]
pub fn spawn_sweeper(pool: PgPool, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = purge_expired(&pool).await {
                warn!(error = %e, "Payment attempt sweep failed");
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_recently_expired_attempts_survive_the_sweep() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let cutoff = purge_cutoff(now);

        // Expired an hour ago: a late callback may still arrive.
        let expired_recently = now - chrono::Duration::hours(1);
        assert!(expired_recently > cutoff);

        let expired_long_ago = now - chrono::Duration::hours(25);
        assert!(expired_long_ago <= cutoff);
        assert_eq!((now - cutoff).num_hours(), CALLBACK_GRACE_HOURS);
    }
}
