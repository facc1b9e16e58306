//! Lookbook post domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use atelier_core::{LookbookPostId, ProductId};

/// An editorial post linking a set of products.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookbookPost {
    pub id: LookbookPostId,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub cover_image: Option<String>,
    pub images: Vec<String>,
    pub product_ids: Vec<ProductId>,
    pub is_published: bool,
    pub sort_order: i32,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields for create/update.
#[derive(Debug, Clone)]
pub struct LookbookDraft {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub cover_image: Option<String>,
    pub images: Vec<String>,
    pub product_ids: Vec<ProductId>,
    pub is_published: bool,
    pub sort_order: i32,
}
