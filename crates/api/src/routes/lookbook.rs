//! Lookbook routes.

use axum::extract::State;
use serde::Deserialize;
use tracing::{info, instrument};

use atelier_core::{LookbookPostId, ProductId, is_valid_slug, slugify};

use crate::db::LookbookRepository;
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAdmin};
use crate::models::{LookbookDraft, LookbookPost};
use crate::response::{ApiJson, ApiPath, ApiResponse, Message};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookbookInput {
    pub title: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub sort_order: i32,
}

impl LookbookInput {
    fn into_draft(self) -> Result<LookbookDraft> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::BadRequest("title is required".to_string()));
        }
        let slug = match self.slug.map(|s| s.trim().to_string()) {
            Some(slug) if !slug.is_empty() => slug,
            _ => slugify(&title),
        };
        if !is_valid_slug(&slug) {
            return Err(AppError::BadRequest(format!("invalid slug '{slug}'")));
        }

        let images: Vec<String> = self
            .images
            .into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        let mut product_ids = self.product_ids;
        product_ids.dedup();

        Ok(LookbookDraft {
            title,
            slug,
            description: self.description.trim().to_string(),
            cover_image: self
                .cover_image
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            images,
            product_ids,
            is_published: self.is_published,
            sort_order: self.sort_order,
        })
    }
}

/// GET /api/lookbook
pub async fn list(State(state): State<AppState>) -> Result<ApiResponse<Vec<LookbookPost>>> {
    let posts = LookbookRepository::new(state.pool()).list(false).await?;
    Ok(ApiResponse::ok(posts))
}

/// GET /api/lookbook/admin/all
pub async fn list_all(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<ApiResponse<Vec<LookbookPost>>> {
    let posts = LookbookRepository::new(state.pool()).list(true).await?;
    Ok(ApiResponse::ok(posts))
}

/// GET /api/lookbook/{id}
///
/// Drafts are visible to catalog staff only.
pub async fn show(
    State(state): State<AppState>,
    caller: OptionalAuth,
    ApiPath(id): ApiPath<LookbookPostId>,
) -> Result<ApiResponse<LookbookPost>> {
    LookbookRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(|post| post.is_published || caller.is_catalog_staff())
        .map(ApiResponse::ok)
        .ok_or_else(|| AppError::NotFound("Lookbook post not found".to_string()))
}

/// POST /api/lookbook
#[instrument(skip(state, actor, input), fields(actor_id = %actor.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(actor): RequireAdmin,
    ApiJson(input): ApiJson<LookbookInput>,
) -> Result<ApiResponse<LookbookPost>> {
    let draft = input.into_draft()?;
    let post = LookbookRepository::new(state.pool()).create(&draft).await?;

    info!(post_id = %post.id, slug = %post.slug, "Lookbook post created");
    Ok(ApiResponse::created(post))
}

/// PUT /api/lookbook/{id}
#[instrument(skip(state, actor, input), fields(actor_id = %actor.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(actor): RequireAdmin,
    ApiPath(id): ApiPath<LookbookPostId>,
    ApiJson(input): ApiJson<LookbookInput>,
) -> Result<ApiResponse<LookbookPost>> {
    let draft = input.into_draft()?;
    let post = LookbookRepository::new(state.pool())
        .update(id, &draft)
        .await?;

    info!(post_id = %id, "Lookbook post updated");
    Ok(ApiResponse::ok(post))
}

/// DELETE /api/lookbook/{id}
#[instrument(skip(state, actor), fields(actor_id = %actor.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(actor): RequireAdmin,
    ApiPath(id): ApiPath<LookbookPostId>,
) -> Result<ApiResponse<Message>> {
    if !LookbookRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound("Lookbook post not found".to_string()));
    }

    info!(post_id = %id, "Lookbook post deleted");
    Ok(ApiResponse::ok(Message::new("Lookbook post deleted")))
}
