//! Product repository.
//!
//! `total_stock` is always written as the sum of the inventory being saved,
//! so every write path goes through [`product::total_stock`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use atelier_core::{Money, Page, Pagination, ProductId};

use super::{RepositoryError, contains_pattern};
use crate::models::product::{self, InventoryItem, Product, ProductDraft, ProductImage};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    description: String,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    category: String,
    subcategory: Option<String>,
    images: Json<Vec<ProductImage>>,
    inventory: Json<Vec<InventoryItem>>,
    total_stock: i32,
    is_active: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            compare_at_price: row.compare_at_price,
            category: row.category,
            subcategory: row.subcategory,
            images: row.images.0,
            inventory: row.inventory.0,
            total_stock: row.total_stock,
            is_active: row.is_active,
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Listing filters. All are optional; inactive products are excluded unless
/// `include_inactive` is set.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub featured: Option<bool>,
    pub include_inactive: bool,
}

/// Listing sort order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductSort {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    /// Parse the `sort` query parameter, falling back to newest first.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("oldest") => Self::Oldest,
            Some("price_asc" | "price-asc" | "price") => Self::PriceAsc,
            Some("price_desc" | "price-desc" | "-price") => Self::PriceDesc,
            Some("name") => Self::Name,
            _ => Self::Newest,
        }
    }

    const fn order_clause(self) -> &'static str {
        match self {
            Self::Newest => "created_at DESC, id DESC",
            Self::Oldest => "created_at ASC, id ASC",
            Self::PriceAsc => "price ASC, id ASC",
            Self::PriceDesc => "price DESC, id DESC",
            Self::Name => "name ASC, id ASC",
        }
    }
}

const LIST_FILTER: &str = r"
    WHERE ($1 OR is_active)
      AND ($2::text IS NULL OR category = $2)
      AND ($3::text IS NULL OR subcategory = $3)
      AND ($4::text IS NULL OR name ILIKE $4 OR description ILIKE $4)
      AND ($5::numeric IS NULL OR price >= $5)
      AND ($6::numeric IS NULL OR price <= $6)
      AND ($7::boolean IS NULL OR is_featured = $7)
";

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        sort: ProductSort,
        pagination: Pagination,
    ) -> Result<Page<Product>, RepositoryError> {
        let search = filter.search.as_deref().map(contains_pattern);

        let list_sql = format!(
            "SELECT * FROM atelier.product {LIST_FILTER} ORDER BY {} LIMIT $8 OFFSET $9",
            sort.order_clause()
        );
        let rows = sqlx::query_as::<_, ProductRow>(&list_sql)
            .bind(filter.include_inactive)
            .bind(filter.category.as_deref())
            .bind(filter.subcategory.as_deref())
            .bind(search.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.featured)
            .bind(pagination.limit_i64())
            .bind(pagination.offset())
            .fetch_all(self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM atelier.product {LIST_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(filter.include_inactive)
            .bind(filter.category.as_deref())
            .bind(filter.subcategory.as_deref())
            .bind(search.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.featured)
            .fetch_one(self.pool)
            .await?;

        Ok(Page::new(
            rows.into_iter().map(Product::from).collect(),
            pagination,
            total,
        ))
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(r"SELECT * FROM atelier.product WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    /// Get a product by slug, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row =
            sqlx::query_as::<_, ProductRow>(r"SELECT * FROM atelier.product WHERE slug = $1")
                .bind(slug)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(Product::from))
    }

    /// Fetch several products without locking (used to quote a cart).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"SELECT * FROM atelier.product WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO atelier.product
                (name, slug, description, price, compare_at_price, category, subcategory,
                 images, inventory, total_stock, is_active, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            ",
        )
        .bind(&draft.name)
        .bind(&draft.slug)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.compare_at_price)
        .bind(&draft.category)
        .bind(draft.subcategory.as_deref())
        .bind(Json(&draft.images))
        .bind(Json(&draft.inventory))
        .bind(product::total_stock(&draft.inventory))
        .bind(draft.is_active)
        .bind(draft.is_featured)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "slug already exists"))?;

        Ok(row.into())
    }

    /// Replace every editable field of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE atelier.product SET
                name = $2, slug = $3, description = $4, price = $5, compare_at_price = $6,
                category = $7, subcategory = $8, images = $9, inventory = $10,
                total_stock = $11, is_active = $12, is_featured = $13
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.slug)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.compare_at_price)
        .bind(&draft.category)
        .bind(draft.subcategory.as_deref())
        .bind(Json(&draft.images))
        .bind(Json(&draft.inventory))
        .bind(product::total_stock(&draft.inventory))
        .bind(draft.is_active)
        .bind(draft.is_featured)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "slug already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Hide a product from the storefront. Returns `false` if no row matched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn deactivate(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(r"UPDATE atelier.product SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace a product's inventory list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_inventory(
        &self,
        id: ProductId,
        inventory: &[InventoryItem],
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE atelier.product SET inventory = $2, total_stock = $3
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(Json(inventory))
        .bind(product::total_stock(inventory))
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Lock products for the rest of the transaction, in ascending ID order.
    ///
    /// Concurrent checkouts touching the same products always acquire the
    /// row locks in the same order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let rows = sqlx::query_as::<_, ProductRow>(
            r"SELECT * FROM atelier.product WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Write back an inventory list changed inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save_inventory(
        conn: &mut PgConnection,
        id: ProductId,
        inventory: &[InventoryItem],
    ) -> Result<(), RepositoryError> {
        sqlx::query(r"UPDATE atelier.product SET inventory = $2, total_stock = $3 WHERE id = $1")
            .bind(id)
            .bind(Json(inventory))
            .bind(product::total_stock(inventory))
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Active products at or below `threshold` units, lowest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(
        &self,
        threshold: i32,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT * FROM atelier.product
            WHERE is_active AND total_stock <= $1
            ORDER BY total_stock ASC, name ASC
            LIMIT $2
            ",
        )
        .bind(threshold)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parse_defaults_to_newest() {
        assert_eq!(ProductSort::parse(None), ProductSort::Newest);
        assert_eq!(ProductSort::parse(Some("bogus")), ProductSort::Newest);
        assert_eq!(ProductSort::parse(Some("price_asc")), ProductSort::PriceAsc);
        assert_eq!(ProductSort::parse(Some("-price")), ProductSort::PriceDesc);
        assert_eq!(ProductSort::parse(Some("name")), ProductSort::Name);
    }

    #[test]
    fn test_order_clauses_are_deterministic() {
        for sort in [
            ProductSort::Newest,
            ProductSort::Oldest,
            ProductSort::PriceAsc,
            ProductSort::PriceDesc,
            ProductSort::Name,
        ] {
            assert!(sort.order_clause().contains("id"));
        }
    }
}
