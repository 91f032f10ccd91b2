//! Common API utilities and shared types
//!
//! This module contains shared utilities used across multiple API endpoints.

use serde::{Deserialize, Serialize};

use crate::models::PagedResult;

// ============================================================================
// Pagination Query Types
// ============================================================================

/// Basic pagination query parameters
///
/// Both are optional; the query composer applies the configured defaults
/// and caps.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// ============================================================================
// Pagination Response Types
// ============================================================================

/// Pagination block returned next to every list
#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: u32,
}

impl<T> From<&PagedResult<T>> for Pagination {
    fn from(result: &PagedResult<T>) -> Self {
        Self {
            page: result.page,
            limit: result.per_page,
            total: result.total,
            total_pages: result.total_pages(),
        }
    }
}

/// A page of items with its pagination block
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> From<PagedResult<T>> for ListResponse<T> {
    fn from(result: PagedResult<T>) -> Self {
        let pagination = Pagination::from(&result);
        Self {
            items: result.items,
            pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListParams;

    #[test]
    fn test_list_response_shape() {
        let result = PagedResult::new(vec![1, 2], 7, &ListParams::new(2, 2));
        let body = serde_json::to_value(ListResponse::from(result)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "items": [1, 2],
                "pagination": { "page": 2, "limit": 2, "total": 7, "total_pages": 4 }
            })
        );
    }
}
