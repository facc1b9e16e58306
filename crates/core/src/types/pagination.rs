//! Page-number pagination for list endpoints.

use serde::{Deserialize, Serialize};

/// Requested page of a listing.
///
/// Query strings are untrusted, so the constructor clamps instead of
/// rejecting: `page` is at least 1 and `limit` is between 1 and
/// [`Pagination::MAX_LIMIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    /// Page size when the client does not ask for one.
    pub const DEFAULT_LIMIT: u32 = 20;
    /// Largest page size a client may request.
    pub const MAX_LIMIT: u32 = 100;

    /// Build a pagination request from optional query parameters.
    #[must_use]
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    /// 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Page size.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Row offset for `LIMIT/OFFSET` queries.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    /// Page size as an `i64` for binding into SQL.
    #[must_use]
    pub const fn limit_i64(&self) -> i64 {
        self.limit as i64
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the totals the SPA needs for its pager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    /// Assemble a page from the fetched rows and the unpaginated row count.
    #[must_use]
    pub fn new(items: Vec<T>, pagination: Pagination, total: i64) -> Self {
        let limit = i64::from(pagination.limit());
        let total = total.max(0);
        Self {
            items,
            page: pagination.page(),
            limit: pagination.limit(),
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }

    /// Transform each item, keeping the page metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = Pagination::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), Pagination::DEFAULT_LIMIT);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_clamps_out_of_range_values() {
        let p = Pagination::new(Some(0), Some(0));
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), 1);

        let p = Pagination::new(Some(3), Some(10_000));
        assert_eq!(p.limit(), Pagination::MAX_LIMIT);
    }

    #[test]
    fn test_offset() {
        assert_eq!(Pagination::new(Some(3), Some(25)).offset(), 50);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let p = Pagination::new(Some(1), Some(20));
        assert_eq!(Page::new(Vec::<u8>::new(), p, 0).total_pages, 0);
        assert_eq!(Page::new(Vec::<u8>::new(), p, 20).total_pages, 1);
        assert_eq!(Page::new(Vec::<u8>::new(), p, 21).total_pages, 2);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let p = Pagination::new(Some(2), Some(2));
        let page = Page::new(vec![1, 2], p, 5).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.page, 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
    }
}
