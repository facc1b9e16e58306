//! Editable content blocks.

use chrono::{DateTime, Utc};
use serde::Serialize;

use atelier_core::{ContentKind, UserId};

/// A typed JSON blob edited from the admin console.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    pub kind: ContentKind,
    pub data: serde_json::Value,
    pub updated_by: Option<UserId>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ContentBlock {
    /// The block returned for a kind that has never been saved.
    #[must_use]
    pub fn empty(kind: ContentKind) -> Self {
        Self {
            kind,
            data: serde_json::Value::Object(serde_json::Map::new()),
            updated_by: None,
            updated_at: None,
        }
    }
}
