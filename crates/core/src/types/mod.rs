//! Core types for Atelier.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod pagination;
pub mod role;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, Money, format_amount, round_money};
pub use pagination::{Page, Pagination};
pub use role::UserRole;
pub use slug::{is_valid_slug, slugify};
pub use status::*;
