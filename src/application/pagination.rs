//! Page-number pagination helpers.
//!
//! Listings are addressed by a 1-based page number taken from the `page`
//! query parameter. Out-of-range and malformed numbers never fail a request:
//! they are clamped onto the nearest valid page, so every listing URL with a
//! `page` parameter renders something sensible.

use std::num::NonZeroU32;

/// Requested page, before clamping against the actual item count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageRequest {
    number: Option<u32>,
}

impl PageRequest {
    /// The first page. Equivalent to a URL without a `page` parameter.
    pub fn first() -> Self {
        Self { number: None }
    }

    pub fn page(number: u32) -> Self {
        Self {
            number: Some(number),
        }
    }

    /// Parse a raw `page` query value. Absent or malformed values fall back
    /// to the first page rather than producing an error.
    pub fn from_query(raw: Option<&str>) -> Self {
        Self {
            number: raw.and_then(|value| value.trim().parse::<u32>().ok()),
        }
    }

    pub fn number(&self) -> Option<u32> {
        self.number
    }
}

/// A resolved slice of a listing: the clamped page number translated into a
/// SQL `LIMIT`/`OFFSET` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub total_pages: u32,
    pub limit: i64,
    pub offset: i64,
}

/// Clamp a requested page against the total item count.
///
/// An empty listing still has one page (an empty first page). Page 0 and
/// unparseable requests resolve to page 1; requests past the end resolve to
/// the last page.
pub fn resolve_window(request: PageRequest, total_items: u64, per_page: NonZeroU32) -> PageWindow {
    let per_page = u64::from(per_page.get());
    let total_pages = total_items.div_ceil(per_page).max(1);
    let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);
    let number = request.number().unwrap_or(1).clamp(1, total_pages);
    PageWindow {
        number,
        total_pages,
        limit: per_page as i64,
        offset: (u64::from(number - 1) * per_page) as i64,
    }
}

/// One page of a listing along with the numbers needed to render pagination
/// controls.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    pub fn assemble(window: PageWindow, total_items: u64, items: Vec<T>) -> Self {
        Self {
            items,
            number: window.number,
            total_pages: window.total_pages,
            total_items,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn previous_number(&self) -> Option<u32> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn next_number(&self) -> Option<u32> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            total_pages: self.total_pages,
            total_items: self.total_items,
        }
    }
}
