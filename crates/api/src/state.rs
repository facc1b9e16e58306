//! Application state shared across handlers.

use std::sync::Arc;

use chrono::Duration;
use sqlx::PgPool;

use crate::cache::ReadCache;
use crate::config::ApiConfig;
use crate::services::auth::token::TokenSigner;
use crate::services::email::{EmailError, EmailService};
use crate::services::uploads::UploadStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    tokens: TokenSigner,
    email: EmailService,
    uploads: UploadStore,
    cache: ReadCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the SMTP relay settings are invalid.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, EmailError> {
        let tokens = TokenSigner::new(
            config.token_secret.clone(),
            Duration::hours(config.token_ttl_hours),
        );
        let email = EmailService::new(&config.email, config.store.currency)?;
        let uploads = UploadStore::new(
            config.upload_dir.clone(),
            config.max_upload_bytes,
            &config.public_url,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                email,
                uploads,
                cache: ReadCache::new(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Bearer token signer.
    #[must_use]
    pub fn tokens(&self) -> &TokenSigner {
        &self.inner.tokens
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    #[must_use]
    pub fn uploads(&self) -> &UploadStore {
        &self.inner.uploads
    }

    /// Cache for content blocks and categories.
    #[must_use]
    pub fn cache(&self) -> &ReadCache {
        &self.inner.cache
    }
}
