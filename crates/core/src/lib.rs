//! Atelier Core - Shared domain types.
//!
//! This crate provides common types used across all Atelier components:
//! - `api` - REST API serving the storefront SPA and the admin console
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure domain rules - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, money, roles, statuses, slugs and pagination

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
