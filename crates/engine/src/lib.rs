//! Database engine for exemplar
//!
//! This crate orchestrates all lower layers:
//! - Database: main struct with open, ingestion and reads
//! - Version resolution: one grouped pass per read
//! - Collection projection: example state as of a version
//! - Keyset pagination with opaque cursors
//! - Sort expressions and filter predicates
//!
//! The engine is the only component that knows about:
//! - Cross-layer coordination (storage + journal)
//! - Replay on open
//! - Configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod database;
pub mod pagination;
pub mod projection;
pub mod query;
pub mod resolver;

pub use cursor::{Cursor, CursorSort};
pub use database::{Database, DatabaseBuilder, DatabaseConfig, PageQuery};
pub use pagination::{Edge, Page, PageDirection, PageRequest, PageRow, Paginator, RowSort};
pub use projection::{CollectionProjection, ExampleState};
pub use query::{
    ExampleSortKey, MatchAll, PayloadField, Predicate, SortExpression, SortSpec, TimeRange,
};
pub use resolver::{resolve, resolve_bound, resolve_examples, winning_revisions, VersionBound};
