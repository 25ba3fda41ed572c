//! Server-driven pagination shared by every admin table.

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// Query-string parameters forwarded by the admin tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> u64 {
        self.page.filter(|p| *p >= 1).unwrap_or(1)
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Trimmed search term, `None` when blank.
    pub fn search_term(&self) -> Option<String> {
        non_blank(&self.search)
    }

    pub fn status_term(&self) -> Option<String> {
        non_blank(&self.status).filter(|s| s != "all")
    }

    pub fn role_term(&self) -> Option<String> {
        non_blank(&self.role).filter(|s| s != "all")
    }

    pub fn category_term(&self) -> Option<String> {
        non_blank(&self.category).filter(|s| s != "all")
    }

    /// Resolve `sort` against the fields a resource allows. A leading `-`
    /// means descending; unknown keys fall back to newest first.
    pub fn sort_key(&self, allowed: &[&'static str]) -> SortKey {
        let raw = self.sort.as_deref().map(str::trim).unwrap_or("");
        let (field, descending) = match raw.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (raw, false),
        };
        allowed
            .iter()
            .find(|f| **f == field)
            .map(|f| SortKey {
                field: *f,
                descending,
            })
            .unwrap_or_default()
    }

    pub fn page_request(&self, allowed: &[&'static str]) -> PageRequest {
        PageRequest {
            page: self.page(),
            limit: self.limit(),
            sort: self.sort_key(allowed),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: &'static str,
    pub descending: bool,
}

impl Default for SortKey {
    fn default() -> Self {
        Self {
            field: "createdAt",
            descending: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
    pub sort: SortKey,
}

impl PageRequest {
    /// Offset of the first item. Capped at `i64::MAX` since that is the
    /// largest skip the database accepts.
    pub fn skip(&self) -> u64 {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.limit)
            .min(i64::MAX as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, req: &PageRequest) -> Self {
        Self {
            items,
            total,
            page: req.page,
            limit: req.limit,
            total_pages: total.div_ceil(req.limit),
        }
    }

    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}
