//! Account management commands.
//!
//! The CLI acts with operator authority, so it can create the first
//! `super_admin` that the HTTP API cannot.

use atelier_api::services::auth::{AuthService, Registration};
use atelier_core::UserRole;

use super::{CommandError, connect};

/// Parse a role name as accepted on the command line.
fn parse_role(role: &str) -> Result<UserRole, CommandError> {
    role.trim()
        .to_ascii_lowercase()
        .replace('-', "_")
        .parse()
        .map_err(|_| CommandError::InvalidRole(role.to_owned()))
}

/// Create an account with `role`.
///
/// # Returns
///
/// The ID of the created user.
pub async fn create(
    email: &str,
    password: &str,
    role: &str,
    first_name: &str,
    last_name: &str,
) -> Result<i32, CommandError> {
    let role = parse_role(role)?;
    let pool = connect().await?;

    let registration = Registration {
        email: email.to_owned(),
        password: password.to_owned(),
        first_name: first_name.to_owned(),
        last_name: last_name.to_owned(),
        phone: None,
    };
    let user = AuthService::new(&pool)
        .create_with_role(UserRole::SuperAdmin, &registration, role)
        .await?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(user.id.as_i32())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("admin").unwrap(), UserRole::Admin);
        assert_eq!(parse_role("Super-Admin").unwrap(), UserRole::SuperAdmin);
        assert_eq!(parse_role(" warehouse ").unwrap(), UserRole::Warehouse);
        assert!(matches!(
            parse_role("viewer"),
            Err(CommandError::InvalidRole(_))
        ));
    }
}
