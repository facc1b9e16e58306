//! Atelier API library.
//!
//! REST/JSON backend for the Atelier storefront and admin console: catalog,
//! checkout, order fulfilment, content management, accounts and PayU
//! payments. The binary in `main.rs` wires this library to a listener; the
//! CLI and tests reuse it directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
