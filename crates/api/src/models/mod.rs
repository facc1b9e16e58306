//! Domain models.
//!
//! These types represent validated domain objects separate from database
//! row types. JSON field names are camelCase to match the SPA.

pub mod category;
pub mod content;
pub mod lookbook;
pub mod order;
pub mod payment_attempt;
pub mod product;
pub mod stats;
pub mod user;

pub use category::{Category, DerivedCategory};
pub use content::ContentBlock;
pub use lookbook::{LookbookDraft, LookbookPost};
pub use order::{Order, OrderItem, PaymentInfo, ShippingAddress, StatusHistoryEntry};
pub use payment_attempt::PaymentAttempt;
pub use product::{InventoryItem, Product, ProductDraft, ProductImage};
pub use stats::DashboardStats;
pub use user::{CurrentUser, LockOut, User};
