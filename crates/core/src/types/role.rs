//! User roles and the permissions attached to them.

use serde::{Deserialize, Serialize};

/// Account role.
///
/// Customers and staff share one `users` table; the role decides which
/// admin-console endpoints an account may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "atelier.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Shopper account created through registration.
    #[default]
    Customer,
    /// Store manager: catalog, content, orders and customer accounts.
    Admin,
    /// Owner account: everything an admin can do plus managing staff.
    SuperAdmin,
    /// Fulfilment staff: order processing and inventory counts only.
    Warehouse,
}

impl UserRole {
    /// Any non-customer role.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        !matches!(self, Self::Customer)
    }

    /// Admin or super admin.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }

    /// May create/edit products, categories and uploads.
    #[must_use]
    pub const fn can_manage_catalog(self) -> bool {
        self.is_admin()
    }

    /// May adjust inventory counts on existing products.
    #[must_use]
    pub const fn can_manage_inventory(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin | Self::Warehouse)
    }

    /// May view and advance orders through fulfilment.
    #[must_use]
    pub const fn can_fulfil_orders(self) -> bool {
        self.is_staff()
    }

    /// May list, edit and delete user accounts.
    #[must_use]
    pub const fn can_manage_users(self) -> bool {
        self.is_admin()
    }

    /// Whether an account with this role may grant `target` to someone.
    ///
    /// Only a super admin can mint admins or other super admins.
    #[must_use]
    pub const fn can_assign(self, target: Self) -> bool {
        match self {
            Self::SuperAdmin => true,
            Self::Admin => matches!(target, Self::Customer | Self::Warehouse),
            Self::Customer | Self::Warehouse => false,
        }
    }

    /// Role name as stored and serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
            Self::Warehouse => "warehouse",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            "warehouse" => Ok(Self::Warehouse),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}
