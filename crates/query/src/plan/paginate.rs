//! Page descriptor to limit/offset.

use crate::options::Page;

/// Page size used when the request gives none (or zero).
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Resolved LIMIT/OFFSET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u64,
    pub offset: i64,
}

/// Compute limit/offset for a page.
///
/// Page numbers start at 1. Page 0 (or a missing number) yields an offset
/// of `-size`; it is not clamped.
pub fn paginate(page: &Page) -> Pagination {
    let size = page
        .size
        .filter(|size| *size > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE);
    let number = page.number.unwrap_or(0);

    let size = i64::from(size);
    Pagination {
        limit: size.unsigned_abs(),
        offset: i64::from(number) * size - size,
    }
}
