//! Category routes.
//!
//! The stored list is cached; every write drops the cached copy.

use axum::extract::State;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use atelier_core::{CategoryId, is_valid_slug, slugify};

use crate::db::CategoryRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireCatalogStaff;
use crate::models::{Category, DerivedCategory};
use crate::response::{ApiJson, ApiPath, ApiResponse, Message};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<String>,
}

/// Validated category fields.
#[derive(Debug, PartialEq, Eq)]
struct CategoryFields {
    name: String,
    slug: String,
    subcategories: Vec<String>,
}

impl CategoryInput {
    fn validate(self) -> Result<CategoryFields> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name is required".to_string()));
        }

        let slug = match self.slug.map(|s| s.trim().to_string()) {
            Some(slug) if !slug.is_empty() => slug,
            _ => slugify(&name),
        };
        if !is_valid_slug(&slug) {
            return Err(AppError::BadRequest(format!("invalid slug '{slug}'")));
        }

        // Trimmed, blank entries dropped, duplicates removed keeping the first.
        let mut subcategories: Vec<String> = Vec::with_capacity(self.subcategories.len());
        for sub in self.subcategories {
            let sub = sub.trim();
            if !sub.is_empty() && !subcategories.iter().any(|s| s.eq_ignore_ascii_case(sub)) {
                subcategories.push(sub.to_string());
            }
        }

        Ok(CategoryFields {
            name,
            slug,
            subcategories,
        })
    }
}

/// GET /api/categories
pub async fn list(State(state): State<AppState>) -> Result<ApiResponse<Vec<Category>>> {
    if let Some(categories) = state.cache().categories().await {
        debug!("Category list served from cache");
        return Ok(ApiResponse::ok(categories));
    }

    let categories = CategoryRepository::new(state.pool()).list().await?;
    state.cache().put_categories(&categories).await;
    Ok(ApiResponse::ok(categories))
}

/// GET /api/categories/derived
pub async fn derived(State(state): State<AppState>) -> Result<ApiResponse<Vec<DerivedCategory>>> {
    let categories = CategoryRepository::new(state.pool()).derived().await?;
    Ok(ApiResponse::ok(categories))
}

/// POST /api/categories
#[instrument(skip(state, actor, input), fields(actor_id = %actor.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireCatalogStaff(actor): RequireCatalogStaff,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<ApiResponse<Category>> {
    let fields = input.validate()?;
    let category = CategoryRepository::new(state.pool())
        .create(&fields.name, &fields.slug, &fields.subcategories)
        .await?;
    state.cache().invalidate_categories().await;

    info!(category_id = %category.id, name = %category.name, "Category created");
    Ok(ApiResponse::created(category))
}

/// PUT /api/categories/{id}
#[instrument(skip(state, actor, input), fields(actor_id = %actor.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireCatalogStaff(actor): RequireCatalogStaff,
    ApiPath(id): ApiPath<CategoryId>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<ApiResponse<Category>> {
    let fields = input.validate()?;
    let category = CategoryRepository::new(state.pool())
        .update(id, &fields.name, &fields.slug, &fields.subcategories)
        .await?;
    state.cache().invalidate_categories().await;

    info!(category_id = %id, "Category updated");
    Ok(ApiResponse::ok(category))
}

/// DELETE /api/categories/{id}
///
/// Products keep their category string; only the stored entry goes.
#[instrument(skip(state, actor), fields(actor_id = %actor.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireCatalogStaff(actor): RequireCatalogStaff,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<ApiResponse<Message>> {
    if !CategoryRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound("Category not found".to_string()));
    }
    state.cache().invalidate_categories().await;

    info!(category_id = %id, "Category deleted");
    Ok(ApiResponse::ok(Message::new("Category deleted")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_normalises_subcategories() {
        let input = CategoryInput {
            name: " Dresses ".to_string(),
            slug: None,
            subcategories: vec![
                "Maxi".to_string(),
                " ".to_string(),
                "maxi".to_string(),
                " Midi ".to_string(),
            ],
        };
        assert_eq!(
            input.validate().unwrap(),
            CategoryFields {
                name: "Dresses".to_string(),
                slug: "dresses".to_string(),
                subcategories: vec!["Maxi".to_string(), "Midi".to_string()],
            }
        );
    }

    #[test]
    fn test_validate_rejects_blank_name_and_bad_slug() {
        let blank = CategoryInput {
            name: "  ".to_string(),
            slug: None,
            subcategories: vec![],
        };
        assert!(blank.validate().is_err());

        let bad_slug = CategoryInput {
            name: "Tops".to_string(),
            slug: Some("Tops & Tees".to_string()),
            subcategories: vec![],
        };
        assert!(bad_slug.validate().is_err());
    }
}
