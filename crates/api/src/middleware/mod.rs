//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (recorded on the span and the Sentry scope)
//! 4. CORS
//! 5. Rate limiting on login, registration and contact routes

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{
    OptionalAuth, RequireAdmin, RequireAuth, RequireCatalogStaff, RequireFulfilmentStaff,
    RequireInventoryStaff, RequireStaff, RequireUserAdmin,
};
pub use rate_limit::{auth_rate_limiter, contact_rate_limiter};
pub use request_id::request_id_middleware;
