//! Image uploads stored on local disk.
//!
//! Files are renamed to `<uuid>.<ext>` and served back from `/uploads/`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Accepted image extensions (lowercase).
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "gif", "avif"];

/// Most files accepted in one request.
pub const MAX_FILES_PER_REQUEST: usize = 10;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no files were uploaded")]
    NoFiles,

    #[error("at most {MAX_FILES_PER_REQUEST} files may be uploaded at once")]
    TooManyFiles,

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("{name} exceeds the {max_bytes} byte limit")]
    TooLarge { name: String, max_bytes: usize },

    #[error("invalid file name")]
    InvalidName,

    #[error("file not found")]
    NotFound,

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file written to the upload directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub filename: String,
    pub original_name: String,
    pub url: String,
    pub size: usize,
}

/// Lowercased extension of an uploaded file name, if it is an accepted image type.
///
/// # Errors
///
/// Returns `UploadError::UnsupportedType` for anything else.
pub fn image_extension(original_name: &str) -> Result<String, UploadError> {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(UploadError::UnsupportedType(original_name.to_string()))
    }
}

/// Reject names that could escape the upload directory.
///
/// # Errors
///
/// Returns `UploadError::InvalidName` for empty names, path separators,
/// `..`, or hidden files.
pub fn validate_stored_name(name: &str) -> Result<(), UploadError> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
        || name.contains('\0')
    {
        return Err(UploadError::InvalidName);
    }
    Ok(())
}

/// Upload directory with its size limit and public URL prefix.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
    public_url: String,
}

impl UploadStore {
    #[must_use]
    pub fn new(dir: PathBuf, max_bytes: usize, public_url: &str) -> Self {
        Self {
            dir,
            max_bytes,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Check type and size before anything is written.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::UnsupportedType` or `UploadError::TooLarge`.
    pub fn check(&self, original_name: &str, size: usize) -> Result<String, UploadError> {
        let ext = image_extension(original_name)?;
        if size > self.max_bytes {
            return Err(UploadError::TooLarge {
                name: original_name.to_string(),
                max_bytes: self.max_bytes,
            });
        }
        Ok(ext)
    }

    /// Write one file under a fresh name.
    ///
    /// # Errors
    ///
    /// Returns a validation error, or `UploadError::Io` if the write fails.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredFile, UploadError> {
        let ext = self.check(original_name, bytes.len())?;
        let filename = format!("{}.{ext}", Uuid::new_v4());

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&filename), bytes).await?;

        info!(filename = %filename, size = bytes.len(), "Upload stored");

        Ok(StoredFile {
            url: format!("{}/uploads/{filename}", self.public_url),
            filename,
            original_name: original_name.to_string(),
            size: bytes.len(),
        })
    }

    /// Delete a stored file.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidName` for unsafe names and
    /// `UploadError::NotFound` if nothing is stored under `name`.
    pub async fn delete(&self, name: &str) -> Result<(), UploadError> {
        validate_stored_name(name)?;

        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => {
                info!(filename = %name, "Upload deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(UploadError::NotFound),
            Err(e) => Err(UploadError::Io(e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_store(max_bytes: usize) -> UploadStore {
        let dir = std::env::temp_dir().join(format!("atelier-uploads-{}", Uuid::new_v4()));
        UploadStore::new(dir, max_bytes, "http://localhost:4000/")
    }

    #[test]
    fn test_image_extension_is_case_insensitive() {
        assert_eq!(image_extension("Look.JPG").unwrap(), "jpg");
        assert_eq!(image_extension("a.b.webp").unwrap(), "webp");
        assert!(matches!(
            image_extension("notes.pdf"),
            Err(UploadError::UnsupportedType(_))
        ));
        assert!(image_extension("noextension").is_err());
    }

    #[test]
    fn test_validate_stored_name_rejects_traversal() {
        assert!(validate_stored_name("3f2c.jpg").is_ok());
        for bad in ["", "../etc/passwd", "a/b.jpg", "a\\b.jpg", "..", ".env", "x..jpg"] {
            assert!(
                matches!(validate_stored_name(bad), Err(UploadError::InvalidName)),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_check_enforces_size_limit() {
        let store = temp_store(10);
        assert!(store.check("a.png", 10).is_ok());
        assert!(matches!(
            store.check("a.png", 11),
            Err(UploadError::TooLarge { max_bytes: 10, .. })
        ));
    }

    #[tokio::test]
    async fn test_save_then_delete() {
        let store = temp_store(1024);
        let stored = store.save("Cover.PNG", b"fake-png").await.unwrap();

        assert!(stored.filename.ends_with(".png"));
        assert_eq!(stored.url, format!("http://localhost:4000/uploads/{}", stored.filename));
        assert!(store.dir().join(&stored.filename).exists());

        store.delete(&stored.filename).await.unwrap();
        assert!(matches!(
            store.delete(&stored.filename).await,
            Err(UploadError::NotFound)
        ));

        let _ = std::fs::remove_dir_all(store.dir());
    }
}
