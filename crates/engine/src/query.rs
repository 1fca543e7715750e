//! Sort expressions and filter predicates
//!
//! Both are opaque to the pagination engine beyond their traits: a sort
//! expression maps a row to an optional typed value, a predicate maps it to
//! a bool.

use std::fmt;
use std::sync::Arc;

use exemplar_core::{SortDirection, SortValue, SortValueType, Timestamp};
use serde_json::Value as JsonValue;

use crate::projection::ExampleState;

// ============================================================================
// Sorting
// ============================================================================

/// Something rows can be ordered by
pub trait SortExpression: Send + Sync {
    /// Human-readable name, used in error messages
    fn name(&self) -> String;

    /// Type of every non-null value this expression produces
    fn value_type(&self) -> SortValueType;

    /// Value for one row, `None` when the row has no value
    fn evaluate(&self, row: &ExampleState) -> Option<SortValue>;
}

/// Payload part a JSON sort path starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadField {
    /// `input`
    Input,
    /// `output`
    Output,
    /// `metadata`
    Metadata,
}

impl PayloadField {
    /// Field name
    pub const fn as_str(&self) -> &'static str {
        match self {
            PayloadField::Input => "input",
            PayloadField::Output => "output",
            PayloadField::Metadata => "metadata",
        }
    }

    fn select<'a>(&self, row: &'a ExampleState) -> &'a JsonValue {
        match self {
            PayloadField::Input => &row.input,
            PayloadField::Output => &row.output,
            PayloadField::Metadata => &row.metadata,
        }
    }
}

/// Built-in sort keys over example state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExampleSortKey {
    /// Example id (INT)
    Id,
    /// Example creation time (DATETIME)
    CreatedAt,
    /// Creation time of the winning revision's version (DATETIME)
    UpdatedAt,
    /// Dotted path into a payload field, read as `value_type`
    Path {
        /// Payload part the path starts from
        field: PayloadField,
        /// Dotted path, e.g. `"scores.overall"`
        path: String,
        /// Expected value type; anything else evaluates to null
        value_type: SortValueType,
    },
}

impl ExampleSortKey {
    /// Sort by a path into `input`
    pub fn input(path: impl Into<String>, value_type: SortValueType) -> Self {
        ExampleSortKey::Path {
            field: PayloadField::Input,
            path: path.into(),
            value_type,
        }
    }

    /// Sort by a path into `output`
    pub fn output(path: impl Into<String>, value_type: SortValueType) -> Self {
        ExampleSortKey::Path {
            field: PayloadField::Output,
            path: path.into(),
            value_type,
        }
    }

    /// Sort by a path into `metadata`
    pub fn metadata(path: impl Into<String>, value_type: SortValueType) -> Self {
        ExampleSortKey::Path {
            field: PayloadField::Metadata,
            path: path.into(),
            value_type,
        }
    }
}

fn lookup<'a>(root: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |node, segment| match node {
        JsonValue::Object(map) => map.get(segment),
        JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn typed(value: &JsonValue, value_type: SortValueType) -> Option<SortValue> {
    match value_type {
        SortValueType::Int => value.as_i64().map(SortValue::Int),
        SortValueType::Float => value.as_f64().map(SortValue::Float),
        SortValueType::Text => value.as_str().map(|s| SortValue::Text(s.to_owned())),
        SortValueType::Timestamp => value
            .as_str()
            .and_then(Timestamp::parse_rfc3339)
            .map(SortValue::Timestamp),
    }
}

impl SortExpression for ExampleSortKey {
    fn name(&self) -> String {
        match self {
            ExampleSortKey::Id => "id".to_owned(),
            ExampleSortKey::CreatedAt => "created_at".to_owned(),
            ExampleSortKey::UpdatedAt => "updated_at".to_owned(),
            ExampleSortKey::Path { field, path, .. } if path.is_empty() => field.as_str().to_owned(),
            ExampleSortKey::Path { field, path, .. } => format!("{}.{}", field.as_str(), path),
        }
    }

    fn value_type(&self) -> SortValueType {
        match self {
            ExampleSortKey::Id => SortValueType::Int,
            ExampleSortKey::CreatedAt | ExampleSortKey::UpdatedAt => SortValueType::Timestamp,
            ExampleSortKey::Path { value_type, .. } => *value_type,
        }
    }

    fn evaluate(&self, row: &ExampleState) -> Option<SortValue> {
        match self {
            ExampleSortKey::Id => i64::try_from(row.example_id.as_u64())
                .ok()
                .map(SortValue::Int),
            ExampleSortKey::CreatedAt => Some(SortValue::Timestamp(row.created_at)),
            ExampleSortKey::UpdatedAt => Some(SortValue::Timestamp(row.updated_at)),
            ExampleSortKey::Path {
                field,
                path,
                value_type,
            } => lookup(field.select(row), path).and_then(|v| typed(v, *value_type)),
        }
    }
}

/// A sort expression plus direction
#[derive(Clone)]
pub struct SortSpec {
    /// What to sort by
    pub expression: Arc<dyn SortExpression>,
    /// Which way
    pub direction: SortDirection,
}

impl SortSpec {
    /// Sort by `expression` in `direction`
    pub fn new(expression: impl SortExpression + 'static, direction: SortDirection) -> Self {
        Self {
            expression: Arc::new(expression),
            direction,
        }
    }

    /// Ascending sort
    pub fn ascending(expression: impl SortExpression + 'static) -> Self {
        Self::new(expression, SortDirection::Ascending)
    }

    /// Descending sort
    pub fn descending(expression: impl SortExpression + 'static) -> Self {
        Self::new(expression, SortDirection::Descending)
    }
}

impl fmt::Debug for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortSpec")
            .field("expression", &self.expression.name())
            .field("value_type", &self.expression.value_type())
            .field("direction", &self.direction)
            .finish()
    }
}

// ============================================================================
// Filtering
// ============================================================================

/// Row filter
pub trait Predicate: Send + Sync {
    /// Whether `row` is kept
    fn matches(&self, row: &ExampleState) -> bool;
}

impl<F> Predicate for F
where
    F: Fn(&ExampleState) -> bool + Send + Sync,
{
    fn matches(&self, row: &ExampleState) -> bool {
        self(row)
    }
}

/// Keeps every row
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchAll;

impl Predicate for MatchAll {
    fn matches(&self, _row: &ExampleState) -> bool {
        true
    }
}

/// Keeps rows whose `updated_at` lies in `[start, end)`
///
/// A missing endpoint leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive lower bound
    pub start: Option<Timestamp>,
    /// Exclusive upper bound
    pub end: Option<Timestamp>,
}

impl TimeRange {
    /// Range `[start, end)`
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Whether `t` falls in the range
    pub fn contains(&self, t: Timestamp) -> bool {
        self.start.map_or(true, |start| t >= start) && self.end.map_or(true, |end| t < end)
    }
}

impl Predicate for TimeRange {
    fn matches(&self, row: &ExampleState) -> bool {
        self.contains(row.updated_at)
    }
}
