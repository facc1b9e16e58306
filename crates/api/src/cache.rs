//! In-memory cache for rarely-changing public reads.
//!
//! Content blocks and the stored category list are cached for 5 minutes.
//! Writes invalidate the affected entries immediately.

use std::time::Duration;

use moka::future::Cache;

use atelier_core::ContentKind;

use crate::models::{Category, ContentBlock};

const TTL: Duration = Duration::from_secs(300);
const CATEGORIES_KEY: &str = "categories";
const ALL_CONTENT_KEY: &str = "content:all";

#[derive(Debug, Clone)]
enum CacheValue {
    Content(Box<ContentBlock>),
    AllContent(Vec<ContentBlock>),
    Categories(Vec<Category>),
}

/// Cache shared through [`crate::state::AppState`].
#[derive(Clone)]
pub struct ReadCache {
    inner: Cache<String, CacheValue>,
}

impl Default for ReadCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(100)
                .time_to_live(TTL)
                .build(),
        }
    }

    fn content_key(kind: ContentKind) -> String {
        format!("content:{kind}")
    }

    pub async fn content(&self, kind: ContentKind) -> Option<ContentBlock> {
        match self.inner.get(&Self::content_key(kind)).await {
            Some(CacheValue::Content(block)) => Some(*block),
            _ => None,
        }
    }

    pub async fn put_content(&self, block: &ContentBlock) {
        self.inner
            .insert(
                Self::content_key(block.kind),
                CacheValue::Content(Box::new(block.clone())),
            )
            .await;
    }

    pub async fn all_content(&self) -> Option<Vec<ContentBlock>> {
        match self.inner.get(ALL_CONTENT_KEY).await {
            Some(CacheValue::AllContent(blocks)) => Some(blocks),
            _ => None,
        }
    }

    pub async fn put_all_content(&self, blocks: &[ContentBlock]) {
        self.inner
            .insert(
                ALL_CONTENT_KEY.to_string(),
                CacheValue::AllContent(blocks.to_vec()),
            )
            .await;
    }

    /// Drop one kind and the combined listing.
    pub async fn invalidate_content(&self, kind: ContentKind) {
        self.inner.invalidate(&Self::content_key(kind)).await;
        self.inner.invalidate(ALL_CONTENT_KEY).await;
    }

    pub async fn categories(&self) -> Option<Vec<Category>> {
        match self.inner.get(CATEGORIES_KEY).await {
            Some(CacheValue::Categories(categories)) => Some(categories),
            _ => None,
        }
    }

    pub async fn put_categories(&self, categories: &[Category]) {
        self.inner
            .insert(
                CATEGORIES_KEY.to_string(),
                CacheValue::Categories(categories.to_vec()),
            )
            .await;
    }

    pub async fn invalidate_categories(&self) {
        self.inner.invalidate(CATEGORIES_KEY).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_content_roundtrip_and_invalidation() {
        let cache = ReadCache::new();
        assert!(cache.content(ContentKind::Homepage).await.is_none());

        let block = ContentBlock::empty(ContentKind::Homepage);
        cache.put_content(&block).await;
        cache.put_all_content(std::slice::from_ref(&block)).await;

        assert_eq!(
            cache.content(ContentKind::Homepage).await.unwrap().kind,
            ContentKind::Homepage
        );
        assert!(cache.content(ContentKind::Social).await.is_none());

        cache.invalidate_content(ContentKind::Homepage).await;
        assert!(cache.content(ContentKind::Homepage).await.is_none());
        assert!(cache.all_content().await.is_none());
    }

    #[tokio::test]
    async fn test_categories_invalidation() {
        let cache = ReadCache::new();
        cache.put_categories(&[]).await;
        assert_eq!(cache.categories().await.unwrap().len(), 0);

        cache.invalidate_categories().await;
        assert!(cache.categories().await.is_none());
    }
}
