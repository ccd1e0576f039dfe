use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Normalized page/page-length pair. Page numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_length: u64,
}

impl PageRequest {
    pub const DEFAULT_PAGE_LENGTH: u64 = 10;
    pub const MAX_PAGE_LENGTH: u64 = 100;

    pub fn new(page: Option<u64>, page_length: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_length: page_length
                .unwrap_or(Self::DEFAULT_PAGE_LENGTH)
                .clamp(1, Self::MAX_PAGE_LENGTH),
        }
    }

    /// Zero-based index as expected by paginators.
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

/// One page of a listing plus the totals needed to render pagination.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub page_length: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            page: request.page,
            page_length: request.page_length,
            total,
            total_pages: total.div_ceil(request.page_length),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_length: self.page_length,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}
