//! Content block repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use atelier_core::{ContentKind, UserId};

use super::RepositoryError;
use crate::models::content::ContentBlock;

#[derive(sqlx::FromRow)]
struct ContentRow {
    kind: ContentKind,
    data: Json<serde_json::Value>,
    updated_by: Option<UserId>,
    updated_at: DateTime<Utc>,
}

impl From<ContentRow> for ContentBlock {
    fn from(row: ContentRow) -> Self {
        Self {
            kind: row.kind,
            data: row.data.0,
            updated_by: row.updated_by,
            updated_at: Some(row.updated_at),
        }
    }
}

/// Repository for content blocks.
pub struct ContentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContentRepository<'a> {
    /// Create a new content repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every saved block.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<ContentBlock>, RepositoryError> {
        let rows =
            sqlx::query_as::<_, ContentRow>(r"SELECT * FROM atelier.content_block ORDER BY kind")
                .fetch_all(self.pool)
                .await?;

        Ok(rows.into_iter().map(ContentBlock::from).collect())
    }

    /// One block, if it has ever been saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, kind: ContentKind) -> Result<Option<ContentBlock>, RepositoryError> {
        let row = sqlx::query_as::<_, ContentRow>(
            r"SELECT * FROM atelier.content_block WHERE kind = $1",
        )
        .bind(kind)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ContentBlock::from))
    }

    /// Insert or overwrite a block; the last writer wins.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        kind: ContentKind,
        data: &serde_json::Value,
        updated_by: UserId,
    ) -> Result<ContentBlock, RepositoryError> {
        let row = sqlx::query_as::<_, ContentRow>(
            r"
            INSERT INTO atelier.content_block (kind, data, updated_by, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (kind) DO UPDATE
                SET data = EXCLUDED.data,
                    updated_by = EXCLUDED.updated_by,
                    updated_at = EXCLUDED.updated_at
            RETURNING *
            ",
        )
        .bind(kind)
        .bind(Json(data))
        .bind(updated_by)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}
