//! ---
//! credo_section: "01-core-functionality"
//! credo_subsection: "module"
//! credo_type: "source"
//! credo_scope: "code"
//! credo_description: "Shared primitives and utilities for the Credo workspace."
//! credo_version: "v0.0.0-prealpha"
//! credo_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: usize = 50;

/// Pagination window accepted by every repository listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Maximum number of records to return.
    pub limit: usize,
    /// Number of records to skip from the front of the ordering.
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    /// Construct a window with an explicit limit and offset.
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// A window large enough to cover any realistic listing.
    pub fn all() -> Self {
        Self {
            limit: usize::MAX,
            offset: 0,
        }
    }

    /// Apply the window to an already-ordered vector of records.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_bounded() {
        let page = Page::default();
        assert_eq!(page.limit, DEFAULT_LIMIT);
        assert_eq!(page.offset, 0);
    }

    #[test]
    fn apply_skips_and_takes() {
        let page = Page::new(2, 1);
        assert_eq!(page.apply(vec![1, 2, 3, 4]), vec![2, 3]);
    }

    #[test]
    fn apply_beyond_end_is_empty() {
        let page = Page::new(10, 99);
        assert!(page.apply(vec![1, 2, 3]).is_empty());
    }
}
