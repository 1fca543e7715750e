//! Keyset pagination
//!
//! Stateless: everything a follow-up request needs is in the cursor.
//!
//! # Ordering
//!
//! | Sort | Query order |
//! |------|-------------|
//! | none | row id descending |
//! | ascending | `(value, row id)` ascending, nulls first |
//! | descending | `(value, row id)` descending, nulls last |
//!
//! Row ids are unique, so the order is total and ties on the sort value are
//! broken the same way on every request.
//!
//! # Direction
//!
//! Forward (`first`/`after`) returns the rows strictly after the cursor in
//! query order. Backward (`last`/`before`) is the mirror image: it walks the
//! reversed order from the cursor, then restores query order before
//! returning. Both overfetch one row to learn whether more exist.

use std::cmp::Ordering;

use exemplar_core::{Error, Result, SortDirection, SortValue, SortValueType, Version};
use tracing::trace;

use crate::cursor::Cursor;
use crate::projection::ExampleState;
use crate::query::SortSpec;

/// Default upper bound on the page size
pub const DEFAULT_MAX_PAGE_SIZE: usize = 1000;

/// A row that can be paged through
pub trait PageRow {
    /// Unique, stable id used as the final tie-break and in cursors
    fn row_id(&self) -> u64;
}

impl PageRow for ExampleState {
    fn row_id(&self) -> u64 {
        self.example_id.as_u64()
    }
}

impl PageRow for Version {
    fn row_id(&self) -> u64 {
        self.id.as_u64()
    }
}

/// Which way to page from the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageDirection {
    /// `first` / `after`
    #[default]
    Forward,
    /// `last` / `before`
    Backward,
}

/// Sort applied to rows of type `T`
pub struct RowSort<'a, T> {
    /// Name for error messages
    pub name: String,
    /// Type tag minted into cursors
    pub value_type: SortValueType,
    /// Direction of the sort
    pub direction: SortDirection,
    /// Sort value of a row
    pub key: Box<dyn Fn(&T) -> Option<SortValue> + 'a>,
}

impl SortSpec {
    /// Adapt this sort to example rows
    pub fn row_sort(&self) -> RowSort<'_, ExampleState> {
        RowSort {
            name: self.expression.name(),
            value_type: self.expression.value_type(),
            direction: self.direction,
            key: Box::new(move |row| self.expression.evaluate(row)),
        }
    }
}

/// Position and size of a requested page
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    /// Maximum rows to return
    pub page_size: usize,
    /// Token of the row to start after (forward) or before (backward)
    pub cursor: Option<&'a str>,
    /// Paging direction
    pub direction: PageDirection,
}

impl<'a> PageRequest<'a> {
    /// First page of `page_size` rows
    pub fn first(page_size: usize) -> Self {
        Self {
            page_size,
            cursor: None,
            direction: PageDirection::Forward,
        }
    }

    /// `page_size` rows after `cursor`
    pub fn after(page_size: usize, cursor: &'a str) -> Self {
        Self {
            page_size,
            cursor: Some(cursor),
            direction: PageDirection::Forward,
        }
    }

    /// Last page of `page_size` rows
    pub fn last(page_size: usize) -> Self {
        Self {
            page_size,
            cursor: None,
            direction: PageDirection::Backward,
        }
    }

    /// `page_size` rows before `cursor`
    pub fn before(page_size: usize, cursor: &'a str) -> Self {
        Self {
            page_size,
            cursor: Some(cursor),
            direction: PageDirection::Backward,
        }
    }
}

/// One row of a page with its cursor
#[derive(Debug, Clone, PartialEq)]
pub struct Edge<T> {
    /// Token pointing at this row
    pub cursor: String,
    /// The row
    pub node: T,
}

/// One page of results, in query order
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Rows with cursors
    pub edges: Vec<Edge<T>>,
    /// More rows follow the last edge (forward paging only)
    pub has_next_page: bool,
    /// More rows precede the first edge (backward paging only)
    pub has_previous_page: bool,
    /// Cursor of the first edge
    pub start_cursor: Option<String>,
    /// Cursor of the last edge
    pub end_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Rows without cursors
    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|edge| &edge.node)
    }

    /// Consume into rows
    pub fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().map(|edge| edge.node).collect()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the page is empty
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Keyset pagination over an in-memory row set
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    max_page_size: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAGE_SIZE)
    }
}

/// Row with its sort value computed once
struct Keyed<T> {
    value: Option<SortValue>,
    id: u64,
    row: T,
}

impl Paginator {
    /// Paginator rejecting pages larger than `max_page_size`
    pub fn new(max_page_size: usize) -> Self {
        Self { max_page_size }
    }

    /// Largest accepted page size
    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    /// Cut one page out of `rows`
    ///
    /// `rows` may arrive in any order.
    ///
    /// A cursor is matched to the sort by presence and type tag only, since
    /// the token carries nothing more. A cursor minted under a different
    /// expression of the same type is accepted and positions by its
    /// `(value, row)` pair under the current sort.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a zero page size or one above the maximum
    /// - `MalformedCursor` if the cursor does not decode
    /// - `CursorSortMismatch` if the cursor's sort presence or type tag
    ///   differs from `sort`
    pub fn paginate<T: PageRow>(
        &self,
        rows: Vec<T>,
        sort: Option<&RowSort<'_, T>>,
        request: PageRequest<'_>,
    ) -> Result<Page<T>> {
        if request.page_size == 0 {
            return Err(Error::invalid_input("page size must be at least 1"));
        }
        if request.page_size > self.max_page_size {
            return Err(Error::invalid_input(format!(
                "page size {} exceeds the maximum of {}",
                request.page_size, self.max_page_size
            )));
        }

        let anchor = match request.cursor {
            Some(token) => {
                let cursor = Cursor::decode(token)?;
                check_sort(sort, &cursor)?;
                Some((cursor.sort.and_then(|s| s.value), cursor.row))
            }
            None => None,
        };

        let direction = sort.map(|s| s.direction);
        let order = |a: (&Option<SortValue>, u64), b: (&Option<SortValue>, u64)| {
            let ord = query_order(direction, a, b);
            match request.direction {
                PageDirection::Forward => ord,
                PageDirection::Backward => ord.reverse(),
            }
        };

        let total = rows.len();
        let mut keyed: Vec<Keyed<T>> = rows
            .into_iter()
            .map(|row| Keyed {
                value: sort.and_then(|s| (s.key)(&row)),
                id: row.row_id(),
                row,
            })
            .filter(|k| match &anchor {
                None => true,
                Some((value, row)) => order((&k.value, k.id), (value, *row)) == Ordering::Greater,
            })
            .collect();
        keyed.sort_by(|a, b| order((&a.value, a.id), (&b.value, b.id)));

        let has_more = keyed.len() > request.page_size;
        keyed.truncate(request.page_size);
        if request.direction == PageDirection::Backward {
            keyed.reverse();
        }

        let edges: Vec<Edge<T>> = keyed
            .into_iter()
            .map(|k| {
                let cursor = match sort {
                    Some(s) => Cursor::sorted(k.id, s.value_type, k.value),
                    None => Cursor::new(k.id),
                };
                Edge {
                    cursor: cursor.encode(),
                    node: k.row,
                }
            })
            .collect();

        trace!(
            rows = total,
            returned = edges.len(),
            has_more,
            "Cut page"
        );

        Ok(Page {
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: edges.last().map(|e| e.cursor.clone()),
            has_next_page: request.direction == PageDirection::Forward && has_more,
            has_previous_page: request.direction == PageDirection::Backward && has_more,
            edges,
        })
    }
}

/// Compare two rows in query order
///
/// `None` sort direction means unsorted: row id descending.
fn query_order(
    direction: Option<SortDirection>,
    a: (&Option<SortValue>, u64),
    b: (&Option<SortValue>, u64),
) -> Ordering {
    match direction {
        None => b.1.cmp(&a.1),
        Some(direction) => direction.apply(a.0.cmp(b.0).then(a.1.cmp(&b.1))),
    }
}

fn describe<T>(sort: Option<&RowSort<'_, T>>) -> String {
    match sort {
        Some(s) => format!("{} ({})", s.name, s.value_type),
        None => "no sort".to_owned(),
    }
}

fn check_sort<T>(sort: Option<&RowSort<'_, T>>, cursor: &Cursor) -> Result<()> {
    let matches = match (sort, &cursor.sort) {
        (None, None) => true,
        (Some(s), Some(c)) => s.value_type == c.value_type,
        _ => false,
    };
    if matches {
        return Ok(());
    }
    Err(Error::CursorSortMismatch {
        expected: describe(sort),
        actual: cursor
            .sort
            .as_ref()
            .map_or_else(|| "no sort".to_owned(), |c| c.value_type.to_string()),
    })
}
