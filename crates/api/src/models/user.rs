//! User domain types.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use atelier_core::{Email, UserId, UserRole};

/// A customer or staff account.
///
/// The password hash never leaves the repository layer; see
/// [`crate::db::users::UserWithPassword`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub login_attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the account is locked out at `now`.
    #[must_use]
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }

    /// First and last name joined, or the email when both are blank.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.email.to_string()
        } else {
            name.to_string()
        }
    }
}

/// Lock-out counters stored on a user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockOut {
    pub attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
}

impl LockOut {
    /// Counters after one more wrong password at `now`.
    ///
    /// An expired lock is forgotten first, so the count restarts at 1.
    /// Reaching `max_attempts` locks the account until `now + lock_for`.
    #[must_use]
    pub fn after_failure(
        self,
        now: DateTime<Utc>,
        max_attempts: i32,
        lock_for: Duration,
    ) -> Self {
        let (attempts, lock_until) = match self.lock_until {
            Some(until) if until <= now => (1, None),
            _ => (self.attempts.saturating_add(1), self.lock_until),
        };
        let lock_until = if attempts >= max_attempts {
            Some(now + lock_for)
        } else {
            lock_until
        };
        Self {
            attempts,
            lock_until,
        }
    }

    /// The lock expiry, if the account is locked at `now`.
    #[must_use]
    pub fn locked_until(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.lock_until.filter(|until| *until > now)
    }
}

/// The authenticated caller, resolved from a bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub role: UserRole,
    pub name: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            name: user.display_name(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(1),
            email: Email::parse("asha@example.in").unwrap(),
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            phone: None,
            role: UserRole::Customer,
            login_attempts: 0,
            lock_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_lock_expires() {
        let now = Utc::now();
        let mut u = user();
        assert!(!u.is_locked_at(now));

        u.lock_until = Some(now + Duration::hours(2));
        assert!(u.is_locked_at(now));
        assert!(!u.is_locked_at(now + Duration::hours(3)));
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let mut u = user();
        assert_eq!(u.display_name(), "Asha Rao");
        u.first_name.clear();
        u.last_name = "  ".to_string();
        assert_eq!(u.display_name(), "asha@example.in");
    }

    #[test]
    fn test_serializes_camel_case_without_hash() {
        let json = serde_json::to_value(user()).unwrap();
        assert_eq!(json["firstName"], "Asha");
        assert_eq!(json["role"], "customer");
        assert!(json.get("passwordHash").is_none());
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap()
    }

    fn fail(counters: LockOut, now: DateTime<Utc>) -> LockOut {
        counters.after_failure(now, 5, Duration::hours(2))
    }

    #[test]
    fn test_fifth_failure_locks_for_two_hours() {
        let now = noon();
        let mut counters = LockOut::default();
        for expected in 1..=4 {
            counters = fail(counters, now);
            assert_eq!(counters.attempts, expected);
            assert_eq!(counters.locked_until(now), None);
        }

        counters = fail(counters, now);
        assert_eq!(counters.attempts, 5);
        assert_eq!(counters.locked_until(now), Some(now + Duration::hours(2)));
        assert_eq!(
            counters.locked_until(now + Duration::minutes(119)),
            Some(now + Duration::hours(2))
        );
        assert_eq!(counters.locked_until(now + Duration::hours(2)), None);
    }

    #[test]
    fn test_failure_after_expired_lock_restarts_count() {
        let now = noon();
        let expired = LockOut {
            attempts: 5,
            lock_until: Some(now - Duration::minutes(1)),
        };
        let counters = fail(expired, now);
        assert_eq!(
            counters,
            LockOut {
                attempts: 1,
                lock_until: None
            }
        );
    }

    #[test]
    fn test_failure_while_locked_extends_lock() {
        let now = noon();
        let locked = LockOut {
            attempts: 5,
            lock_until: Some(now + Duration::minutes(30)),
        };
        let counters = fail(locked, now);
        assert_eq!(counters.attempts, 6);
        assert_eq!(counters.lock_until, Some(now + Duration::hours(2)));
    }
}
