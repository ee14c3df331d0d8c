//! Slices ordered collections into fixed-size pages.
//!
//! Page numbers come straight from the `?page=` query parameter, so they may be missing or
//! garbage. Resolution never fails: a missing, non-numeric or too-small number yields the first
//! page, and a number past the end yields the last page.
use serde::Serialize;

/// Posts shown on every listing page unless the config says otherwise.
pub const DEFAULT_PER_PAGE: usize = 10;

/// Which page of a collection is being shown, and how it relates to its neighbours.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based number of this page.
    pub number: usize,
    pub num_pages: usize,
    /// Size of the whole collection, not just this page.
    pub count: usize,
    pub per_page: usize,
}

impl PageWindow {
    /// Work out which page to show for a collection of `count` items.
    pub fn resolve(count: usize, per_page: usize, requested: Option<&str>) -> Self {
        let per_page = per_page.max(1);
        // An empty collection still has one (empty) page.
        let num_pages = ((count + per_page - 1) / per_page).max(1);
        let number = match requested.map(str::trim) {
            None => 1,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n > num_pages as i64 => num_pages,
                Ok(n) if n >= 1 => n as usize,
                Ok(_) => 1,
                // Too many digits for an i64 is still a page past the end.
                Err(_) if is_unsigned_number(raw) => num_pages,
                Err(_) => 1,
            },
        };
        Self {
            number,
            num_pages,
            count,
            per_page,
        }
    }

    /// How many items precede this page.
    pub fn offset(&self) -> usize {
        (self.number - 1) * self.per_page
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_page_number(&self) -> Option<usize> {
        if self.has_next() {
            Some(self.number + 1)
        } else {
            None
        }
    }

    pub fn previous_page_number(&self) -> Option<usize> {
        if self.has_previous() {
            Some(self.number - 1)
        } else {
            None
        }
    }
}

fn is_unsigned_number(raw: &str) -> bool {
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// One page of items plus the window describing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub window: PageWindow,
}

/// Pick the requested page out of an already-ordered collection, for datastores that hold
/// everything in memory.
#[cfg(test)]
pub fn paginate<T>(items: Vec<T>, per_page: usize, requested: Option<&str>) -> Page<T> {
    let window = PageWindow::resolve(items.len(), per_page, requested);
    let items = items
        .into_iter()
        .skip(window.offset())
        .take(window.per_page)
        .collect();
    Page { items, window }
}
