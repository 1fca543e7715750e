//! Page query parameters

use std::fmt;
use std::sync::Arc;

use crate::pagination::PageDirection;
use crate::query::{Predicate, SortSpec};

/// What page of a collection to fetch
///
/// ```ignore
/// let query = PageQuery::first(20)
///     .sort(SortSpec::descending(ExampleSortKey::UpdatedAt))
///     .filter(TimeRange::new(start, end));
/// let page = db.fetch_page(collection, VersionBound::Latest, &query)?;
/// let next = PageQuery::after(20, page.end_cursor.as_deref().unwrap_or_default());
/// ```
#[derive(Clone, Default)]
pub struct PageQuery {
    /// Sort; `None` pages by descending example id
    pub sort: Option<SortSpec>,
    /// Row filter applied before paging
    pub predicate: Option<Arc<dyn Predicate>>,
    /// Rows per page; `None` uses the configured default
    pub page_size: Option<usize>,
    /// Token to continue from
    pub cursor: Option<String>,
    /// Paging direction
    pub direction: PageDirection,
}

impl PageQuery {
    /// First `n` rows
    pub fn first(n: usize) -> Self {
        Self {
            page_size: Some(n),
            ..Self::default()
        }
    }

    /// `n` rows after `cursor`
    pub fn after(n: usize, cursor: impl Into<String>) -> Self {
        Self {
            page_size: Some(n),
            cursor: Some(cursor.into()),
            ..Self::default()
        }
    }

    /// Last `n` rows
    pub fn last(n: usize) -> Self {
        Self {
            page_size: Some(n),
            direction: PageDirection::Backward,
            ..Self::default()
        }
    }

    /// `n` rows before `cursor`
    pub fn before(n: usize, cursor: impl Into<String>) -> Self {
        Self {
            page_size: Some(n),
            cursor: Some(cursor.into()),
            direction: PageDirection::Backward,
            ..Self::default()
        }
    }

    /// Set the sort
    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Set the row filter
    pub fn filter(mut self, predicate: impl Predicate + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }
}

impl fmt::Debug for PageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageQuery")
            .field("sort", &self.sort)
            .field("filtered", &self.predicate.is_some())
            .field("page_size", &self.page_size)
            .field("cursor", &self.cursor)
            .field("direction", &self.direction)
            .finish()
    }
}
