//! Core types and traits for exemplar
//!
//! This crate defines the foundational types used throughout the system:
//! - Identifiers: CollectionId, VersionId, ExampleId, RevisionId
//! - Records: Collection, Version, Example, Revision (all immutable)
//! - RevisionKind and Payload
//! - Timestamp: microsecond timestamps with RFC 3339 rendering
//! - SortValue / SortValueType / SortDirection: cursor-visible sort values
//! - LogRecord / CommitBatch: the unit of commit and journaling
//! - Error: error type hierarchy
//! - LogView / CommitSink: read and durability seams of the revision log

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod log_record;
pub mod records;
pub mod sort;
pub mod timestamp;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use log_record::{CommitBatch, LogRecord};
pub use records::{Collection, Example, Revision, Version, VersionKey};
pub use sort::{SortDirection, SortValue, SortValueType};
pub use timestamp::Timestamp;
pub use traits::{CommitSink, LogView};
pub use types::{CollectionId, ExampleId, Payload, RevisionId, RevisionKind, VersionId};
