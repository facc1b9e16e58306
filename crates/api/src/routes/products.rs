//! Product catalog routes.

use axum::extract::State;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};

use atelier_core::{Money, Page, Pagination, ProductId, is_valid_slug, slugify};

use crate::db::ProductRepository;
use crate::db::products::{ProductFilter, ProductSort};
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireCatalogStaff, RequireInventoryStaff};
use crate::models::product::validate_inventory;
use crate::models::{InventoryItem, Product, ProductDraft, ProductImage};
use crate::response::{ApiJson, ApiPath, ApiQuery, ApiResponse, Message};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub featured: Option<bool>,
    pub sort: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

/// Create/update body for a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub category: String,
    pub subcategory: Option<String>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct InventoryUpdate {
    pub inventory: Vec<InventoryItem>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ProductInput {
    /// Validate and normalise into a draft. The slug defaults to one derived
    /// from the name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` describing the first invalid field.
    pub fn into_draft(self) -> Result<ProductDraft> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name is required".to_string()));
        }
        let category = self.category.trim().to_string();
        if category.is_empty() {
            return Err(AppError::BadRequest("category is required".to_string()));
        }
        if self.price < Decimal::ZERO {
            return Err(AppError::BadRequest("price must not be negative".to_string()));
        }
        if self.compare_at_price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(AppError::BadRequest(
                "compareAtPrice must not be negative".to_string(),
            ));
        }

        let slug = match non_blank(self.slug) {
            Some(slug) if is_valid_slug(&slug) => slug,
            Some(slug) => {
                return Err(AppError::BadRequest(format!(
                    "slug '{slug}' must be lowercase letters, digits and dashes"
                )));
            }
            None => slugify(&name),
        };
        if slug.is_empty() {
            return Err(AppError::BadRequest(
                "a slug could not be derived from the name".to_string(),
            ));
        }

        if self.images.iter().any(|image| image.url.trim().is_empty()) {
            return Err(AppError::BadRequest("image url must not be empty".to_string()));
        }
        validate_inventory(&self.inventory)?;

        Ok(ProductDraft {
            name,
            slug,
            description: self.description.trim().to_string(),
            price: self.price,
            compare_at_price: self.compare_at_price,
            category,
            subcategory: non_blank(self.subcategory),
            images: self.images,
            inventory: self.inventory,
            is_active: self.is_active,
            is_featured: self.is_featured,
        })
    }
}

/// GET /api/products
pub async fn list(
    State(state): State<AppState>,
    caller: OptionalAuth,
    ApiQuery(query): ApiQuery<ProductListQuery>,
) -> Result<ApiResponse<Page<Product>>> {
    if let (Some(min), Some(max)) = (query.min_price, query.max_price)
        && min > max
    {
        return Err(AppError::BadRequest(
            "minPrice must not exceed maxPrice".to_string(),
        ));
    }

    let filter = ProductFilter {
        category: non_blank(query.category),
        subcategory: non_blank(query.subcategory),
        search: non_blank(query.search),
        min_price: query.min_price,
        max_price: query.max_price,
        featured: query.featured,
        include_inactive: query.include_inactive && caller.is_catalog_staff(),
    };
    let page = ProductRepository::new(state.pool())
        .list(
            &filter,
            ProductSort::parse(query.sort.as_deref()),
            Pagination::new(query.page, query.limit),
        )
        .await?;
    Ok(ApiResponse::ok(page))
}

/// GET /api/products/{id}
///
/// Accepts a numeric id or a slug. Inactive products are only visible to
/// catalog staff.
pub async fn show(
    State(state): State<AppState>,
    caller: OptionalAuth,
    ApiPath(key): ApiPath<String>,
) -> Result<ApiResponse<Product>> {
    let products = ProductRepository::new(state.pool());
    let product = match key.parse::<i32>() {
        Ok(id) => products.get_by_id(ProductId::new(id)).await?,
        Err(_) => products.get_by_slug(&key).await?,
    };

    product
        .filter(|p| p.is_active || caller.is_catalog_staff())
        .map(ApiResponse::ok)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// POST /api/products
#[instrument(skip(state, actor, input), fields(actor_id = %actor.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireCatalogStaff(actor): RequireCatalogStaff,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<ApiResponse<Product>> {
    let draft = input.into_draft()?;
    let product = ProductRepository::new(state.pool()).create(&draft).await?;

    info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok(ApiResponse::created(product))
}

/// PUT /api/products/{id}
#[instrument(skip(state, actor, input), fields(actor_id = %actor.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireCatalogStaff(actor): RequireCatalogStaff,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<ApiResponse<Product>> {
    let draft = input.into_draft()?;
    let product = ProductRepository::new(state.pool())
        .update(id, &draft)
        .await?;

    info!(product_id = %id, "Product updated");
    Ok(ApiResponse::ok(product))
}

/// DELETE /api/products/{id}
///
/// Soft delete: the product is deactivated and kept for order history.
#[instrument(skip(state, actor), fields(actor_id = %actor.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireCatalogStaff(actor): RequireCatalogStaff,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<ApiResponse<Message>> {
    if !ProductRepository::new(state.pool()).deactivate(id).await? {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    info!(product_id = %id, "Product deactivated");
    Ok(ApiResponse::ok(Message::new("Product deactivated")))
}

/// PUT /api/products/{id}/inventory
#[instrument(skip(state, actor, body), fields(actor_id = %actor.id))]
pub async fn update_inventory(
    State(state): State<AppState>,
    RequireInventoryStaff(actor): RequireInventoryStaff,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<InventoryUpdate>,
) -> Result<ApiResponse<Product>> {
    validate_inventory(&body.inventory)?;
    let product = ProductRepository::new(state.pool())
        .set_inventory(id, &body.inventory)
        .await?;

    info!(product_id = %id, total_stock = product.total_stock, "Inventory updated");
    Ok(ApiResponse::ok(product))
}
