//! Sortable values
//!
//! Sort values are a tagged union so that a cursor minted under one sort can
//! be checked against the sort of the next request by comparing type tags,
//! without inspecting the value itself.

use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Type tag of a sort value; these are the wire tags used in cursors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortValueType {
    /// Signed 64-bit integer
    #[serde(rename = "INT")]
    Int,
    /// 64-bit float, totally ordered via `f64::total_cmp`
    #[serde(rename = "FLOAT")]
    Float,
    /// UTF-8 string, byte-wise ordering
    #[serde(rename = "STRING")]
    Text,
    /// Microsecond timestamp
    #[serde(rename = "DATETIME")]
    Timestamp,
}

impl SortValueType {
    /// Wire tag
    pub const fn as_str(&self) -> &'static str {
        match self {
            SortValueType::Int => "INT",
            SortValueType::Float => "FLOAT",
            SortValueType::Text => "STRING",
            SortValueType::Timestamp => "DATETIME",
        }
    }
}

impl fmt::Display for SortValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value a row is sorted by
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SortValue {
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    Text(String),
    /// Timestamp value
    Timestamp(Timestamp),
}

impl SortValue {
    /// Type tag of this value
    pub const fn value_type(&self) -> SortValueType {
        match self {
            SortValue::Int(_) => SortValueType::Int,
            SortValue::Float(_) => SortValueType::Float,
            SortValue::Text(_) => SortValueType::Text,
            SortValue::Timestamp(_) => SortValueType::Timestamp,
        }
    }

    fn discriminant(&self) -> u8 {
        match self {
            SortValue::Int(_) => 0,
            SortValue::Float(_) => 1,
            SortValue::Text(_) => 2,
            SortValue::Timestamp(_) => 3,
        }
    }
}

impl PartialEq for SortValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortValue {}

impl PartialOrd for SortValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortValue {
    /// Same-type values compare naturally; mixed types order by type tag.
    ///
    /// Mixed comparisons never happen for a single sort expression, but the
    /// order must still be total for sorting.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Int(a), SortValue::Int(b)) => a.cmp(b),
            (SortValue::Float(a), SortValue::Float(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Timestamp(a), SortValue::Timestamp(b)) => a.cmp(b),
            _ => self.discriminant().cmp(&other.discriminant()),
        }
    }
}

impl fmt::Display for SortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortValue::Int(v) => write!(f, "{}", v),
            SortValue::Float(v) => write!(f, "{}", v),
            SortValue::Text(v) => write!(f, "{:?}", v),
            SortValue::Timestamp(v) => write!(f, "{}", v),
        }
    }
}

/// Direction of a sort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first
    #[serde(rename = "asc")]
    Ascending,
    /// Largest first
    #[default]
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    /// Apply this direction to an ascending comparison result
    #[inline]
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }

    /// The opposite direction
    #[inline]
    pub fn reversed(&self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}
