//! Category domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use atelier_core::CategoryId;

/// A stored category with its free-form subcategory list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub subcategories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A category as seen through the active catalog.
///
/// Built from distinct `(category, subcategory)` pairs on active products,
/// independent of the stored [`Category`] list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedCategory {
    pub name: String,
    pub subcategories: Vec<String>,
    pub product_count: i64,
}

/// Fold `(category, subcategory, count)` rows into one entry per category.
///
/// Rows must arrive sorted by category; subcategories keep row order and
/// blank ones are dropped.
#[must_use]
pub fn fold_derived(rows: Vec<(String, Option<String>, i64)>) -> Vec<DerivedCategory> {
    let mut out: Vec<DerivedCategory> = Vec::new();
    for (name, subcategory, count) in rows {
        if out.last().is_none_or(|last| last.name != name) {
            out.push(DerivedCategory {
                name,
                subcategories: Vec::new(),
                product_count: 0,
            });
        }
        let Some(entry) = out.last_mut() else {
            continue;
        };
        entry.product_count += count;
        if let Some(sub) = subcategory.filter(|s| !s.trim().is_empty())
            && !entry.subcategories.contains(&sub)
        {
            entry.subcategories.push(sub);
        }
    }
    out
}
