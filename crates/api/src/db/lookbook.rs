//! Lookbook post repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use atelier_core::{LookbookPostId, ProductId};

use super::RepositoryError;
use crate::models::lookbook::{LookbookDraft, LookbookPost};

#[derive(sqlx::FromRow)]
struct LookbookRow {
    id: LookbookPostId,
    title: String,
    slug: String,
    description: String,
    cover_image: Option<String>,
    images: Json<Vec<String>>,
    product_ids: Vec<ProductId>,
    is_published: bool,
    sort_order: i32,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LookbookRow> for LookbookPost {
    fn from(row: LookbookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            description: row.description,
            cover_image: row.cover_image,
            images: row.images.0,
            product_ids: row.product_ids,
            is_published: row.is_published,
            sort_order: row.sort_order,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for lookbook posts.
pub struct LookbookRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LookbookRepository<'a> {
    /// Create a new lookbook repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Posts ordered by `sort_order`, newest first within a position.
    ///
    /// Drafts are included only when `include_drafts` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_drafts: bool) -> Result<Vec<LookbookPost>, RepositoryError> {
        let rows = sqlx::query_as::<_, LookbookRow>(
            r"
            SELECT * FROM atelier.lookbook_post
            WHERE $1 OR is_published
            ORDER BY sort_order ASC, created_at DESC, id DESC
            ",
        )
        .bind(include_drafts)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(LookbookPost::from).collect())
    }

    /// Get a post by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(
        &self,
        id: LookbookPostId,
    ) -> Result<Option<LookbookPost>, RepositoryError> {
        let row = sqlx::query_as::<_, LookbookRow>(
            r"SELECT * FROM atelier.lookbook_post WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(LookbookPost::from))
    }

    /// Insert a post. `published_at` is stamped when created published.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, draft: &LookbookDraft) -> Result<LookbookPost, RepositoryError> {
        let row = sqlx::query_as::<_, LookbookRow>(
            r"
            INSERT INTO atelier.lookbook_post
                (title, slug, description, cover_image, images, product_ids,
                 is_published, sort_order, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, CASE WHEN $7 THEN NOW() END)
            RETURNING *
            ",
        )
        .bind(&draft.title)
        .bind(&draft.slug)
        .bind(&draft.description)
        .bind(draft.cover_image.as_deref())
        .bind(Json(&draft.images))
        .bind(&draft.product_ids)
        .bind(draft.is_published)
        .bind(draft.sort_order)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "slug already exists"))?;

        Ok(row.into())
    }

    /// Replace a post. `published_at` is stamped the first time it is published.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post doesn't exist.
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn update(
        &self,
        id: LookbookPostId,
        draft: &LookbookDraft,
    ) -> Result<LookbookPost, RepositoryError> {
        let row = sqlx::query_as::<_, LookbookRow>(
            r"
            UPDATE atelier.lookbook_post SET
                title = $2, slug = $3, description = $4, cover_image = $5, images = $6,
                product_ids = $7, is_published = $8, sort_order = $9,
                published_at = CASE
                    WHEN $8 THEN COALESCE(published_at, NOW())
                    ELSE published_at
                END
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(&draft.title)
        .bind(&draft.slug)
        .bind(&draft.description)
        .bind(draft.cover_image.as_deref())
        .bind(Json(&draft.images))
        .bind(&draft.product_ids)
        .bind(draft.is_published)
        .bind(draft.sort_order)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "slug already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a post.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: LookbookPostId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(r"DELETE FROM atelier.lookbook_post WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
