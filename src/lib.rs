//! Exemplar - versioned dataset store
//!
//! A collection holds examples (input, output, metadata). Every change to an
//! example is an immutable revision tagged with the version it belongs to,
//! so any past version of a collection can be read back exactly.
//!
//! # Quick Start
//!
//! ```ignore
//! use exemplar::{Database, PageQuery, Payload, VersionBound};
//! use serde_json::json;
//!
//! let db = Database::ephemeral();
//! let collection = db.create_collection("qa", None, json!({}))?;
//! let (v1, ids) = db.insert_examples(
//!     collection,
//!     Some("initial import".into()),
//!     vec![Payload::new(json!({"q": "2+2"}), json!({"a": "4"}), json!({}))],
//! )?;
//!
//! // Read the collection as of v1, one page at a time
//! let page = db.fetch_page(collection, v1, &PageQuery::first(20))?;
//! ```
//!
//! # Architecture
//!
//! - `exemplar-core`: ids, records, errors, sort values
//! - `exemplar-storage`: the in-memory revision log with snapshot reads
//! - `exemplar-durability`: the append-only journal
//! - `exemplar-engine`: the [`Database`], version resolution and pagination

pub use exemplar_core::{
    Collection, CollectionId, Error, Example, ExampleId, Payload, Result, Revision, RevisionId,
    RevisionKind, SortDirection, SortValue, SortValueType, Timestamp, Version, VersionId,
    VersionKey,
};
pub use exemplar_durability::DurabilityMode;
pub use exemplar_engine::*;
pub use exemplar_storage::LogSnapshot;
