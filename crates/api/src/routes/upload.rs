//! Image upload routes.
//!
//! Every file in a request is validated before any is written, so a bad
//! file rejects the whole batch.

use axum::extract::{Multipart, State};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::middleware::RequireCatalogStaff;
use crate::response::{ApiPath, ApiResponse, Message};
use crate::services::uploads::{MAX_FILES_PER_REQUEST, StoredFile, UploadError, UploadStore};
use crate::state::AppState;

/// Body limit for the upload route: a full batch plus multipart overhead.
#[must_use]
pub const fn body_limit(max_file_bytes: usize) -> usize {
    max_file_bytes * MAX_FILES_PER_REQUEST + 64 * 1024
}

/// A file read from the request, not yet stored.
struct Pending {
    original_name: String,
    bytes: axum::body::Bytes,
}

/// Check a batch of `(name, size)` pairs against the store's rules.
fn check_batch<'a>(
    store: &UploadStore,
    files: impl ExactSizeIterator<Item = (&'a str, usize)>,
) -> std::result::Result<(), UploadError> {
    match files.len() {
        0 => return Err(UploadError::NoFiles),
        n if n > MAX_FILES_PER_REQUEST => return Err(UploadError::TooManyFiles),
        _ => {}
    }
    for (name, size) in files {
        store.check(name, size)?;
    }
    Ok(())
}

/// POST /api/upload
#[instrument(skip(state, actor, multipart), fields(actor_id = %actor.id))]
pub async fn upload(
    State(state): State<AppState>,
    RequireCatalogStaff(actor): RequireCatalogStaff,
    mut multipart: Multipart,
) -> Result<ApiResponse<Vec<StoredFile>>> {
    let store = state.uploads();
    let mut pending = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if !matches!(field.name(), Some("file" | "files" | "images")) {
            debug!(field = ?field.name(), "Skipping non-file multipart field");
            continue;
        }
        if pending.len() == MAX_FILES_PER_REQUEST {
            return Err(UploadError::TooManyFiles.into());
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        pending.push(Pending {
            original_name,
            bytes,
        });
    }

    check_batch(
        store,
        pending
            .iter()
            .map(|file| (file.original_name.as_str(), file.bytes.len())),
    )?;

    let mut stored = Vec::with_capacity(pending.len());
    for file in &pending {
        stored.push(store.save(&file.original_name, &file.bytes).await?);
    }
    Ok(ApiResponse::created(stored))
}

/// DELETE /api/upload/{filename}
#[instrument(skip(state, actor), fields(actor_id = %actor.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireCatalogStaff(actor): RequireCatalogStaff,
    ApiPath(filename): ApiPath<String>,
) -> Result<ApiResponse<Message>> {
    state.uploads().delete(&filename).await?;
    Ok(ApiResponse::ok(Message::new("File deleted")))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn store() -> UploadStore {
        UploadStore::new(PathBuf::from("uploads"), 1024, "http://localhost:4000")
    }

    #[test]
    fn test_check_batch() {
        let store = store();
        assert!(matches!(
            check_batch(&store, std::iter::empty()),
            Err(UploadError::NoFiles)
        ));
        assert!(check_batch(&store, [("a.jpg", 10), ("b.webp", 1024)].into_iter()).is_ok());
        assert!(matches!(
            check_batch(&store, [("a.jpg", 10), ("b.pdf", 10)].into_iter()),
            Err(UploadError::UnsupportedType(_))
        ));

        let many: Vec<(&str, usize)> = vec![("a.png", 1); MAX_FILES_PER_REQUEST + 1];
        assert!(matches!(
            check_batch(&store, many.into_iter()),
            Err(UploadError::TooManyFiles)
        ));
    }

    #[test]
    fn test_body_limit_covers_full_batch() {
        assert!(body_limit(1024) > 1024 * MAX_FILES_PER_REQUEST);
    }
}
