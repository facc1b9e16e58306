//! Content block routes (homepage, branding, social, navigation).

use axum::extract::State;
use serde_json::Value;
use tracing::{debug, info, instrument};

use atelier_core::ContentKind;

use crate::db::ContentRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::ContentBlock;
use crate::response::{ApiJson, ApiPath, ApiResponse};
use crate::state::AppState;

/// GET /api/content
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<ApiResponse<Vec<ContentBlock>>> {
    if let Some(blocks) = state.cache().all_content().await {
        return Ok(ApiResponse::ok(blocks));
    }

    let blocks = ContentRepository::new(state.pool()).list().await?;
    state.cache().put_all_content(&blocks).await;
    Ok(ApiResponse::ok(blocks))
}

/// GET /api/content/{kind}
///
/// A kind that has never been saved returns an empty object.
pub async fn show(
    State(state): State<AppState>,
    ApiPath(kind): ApiPath<ContentKind>,
) -> Result<ApiResponse<ContentBlock>> {
    if let Some(block) = state.cache().content(kind).await {
        debug!(%kind, "Content served from cache");
        return Ok(ApiResponse::ok(block));
    }

    let block = ContentRepository::new(state.pool())
        .get(kind)
        .await?
        .unwrap_or_else(|| ContentBlock::empty(kind));
    state.cache().put_content(&block).await;
    Ok(ApiResponse::ok(block))
}

/// PUT /api/content/{kind}
#[instrument(skip(state, actor, data), fields(actor_id = %actor.id))]
pub async fn upsert(
    State(state): State<AppState>,
    RequireAdmin(actor): RequireAdmin,
    ApiPath(kind): ApiPath<ContentKind>,
    ApiJson(data): ApiJson<Value>,
) -> Result<ApiResponse<ContentBlock>> {
    check_data(&data)?;

    let block = ContentRepository::new(state.pool())
        .upsert(kind, &data, actor.id)
        .await?;
    state.cache().invalidate_content(kind).await;

    info!(%kind, "Content updated");
    Ok(ApiResponse::ok(block))
}

/// Content data must be a JSON object.
fn check_data(data: &Value) -> Result<()> {
    if data.is_object() {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "content data must be a JSON object".to_string(),
        ))
    }
}
