//! Pagination helper types for repository queries

use serde::{Deserialize, Serialize};

/// Pagination request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Current page number (0-indexed)
    pub page: u32,
    /// Number of items per page
    pub page_size: u32,
}

impl PageRequest {
    /// Create a new page request
    ///
    /// # Examples
    ///
    /// ```
    /// use core_library::repositories::PageRequest;
    ///
    /// let request = PageRequest::new(2, 1000);
    /// assert_eq!(request.offset(), 2000);
    /// ```
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// First page at the given size
    pub fn first(page_size: u32) -> Self {
        Self::new(0, page_size)
    }

    /// The page immediately after this one
    pub fn next(&self) -> Self {
        Self::new(self.page + 1, self.page_size)
    }

    /// SQL OFFSET value
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.page_size)
    }

    /// SQL LIMIT value
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// Whether a result of `len` rows is the last one for this request
    pub fn is_last(&self, len: usize) -> bool {
        len < self.page_size as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: 50,
        }
    }
}

/// Paginated response containing items and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: u64,
    /// Current page number
    pub page: u32,
    /// Total number of pages
    pub total_pages: u32,
    /// Number of items per page
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let total_pages = if request.page_size == 0 {
            0
        } else {
            total.div_ceil(u64::from(request.page_size)) as u32
        };

        Self {
            items,
            total,
            page: request.page,
            total_pages,
            page_size: request.page_size,
        }
    }

    /// Check if there are more pages after the current one
    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_offsets() {
        let request = PageRequest::first(1000);
        assert_eq!(request.offset(), 0);
        assert_eq!(request.limit(), 1000);

        let third = request.next().next();
        assert_eq!(third.page, 2);
        assert_eq!(third.offset(), 2000);
    }

    #[test]
    fn test_page_request_is_last() {
        let request = PageRequest::first(1000);
        assert!(!request.is_last(1000));
        assert!(request.is_last(500));
        assert!(request.is_last(0));
    }

    #[test]
    fn test_page_totals() {
        let page = Page::new(vec![1, 2, 3], 25, PageRequest::new(0, 10));
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());

        let last = Page::new(vec![1], 25, PageRequest::new(2, 10));
        assert!(!last.has_next());

        let empty = Page::<i32>::new(vec![], 25, PageRequest::new(0, 0));
        assert_eq!(empty.total_pages, 0);
    }
}
