//! Event-sourced records: collections, versions, examples, revisions
//!
//! Every record is created once and never updated. The payload of an example
//! lives only in its revisions.

use crate::timestamp::Timestamp;
use crate::types::{CollectionId, ExampleId, Payload, RevisionId, RevisionKind, VersionId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A named group of examples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection id
    pub id: CollectionId,
    /// Display name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Free-form metadata
    pub metadata: JsonValue,
    /// Creation time
    pub created_at: Timestamp,
}

/// Ordering key of a version within its collection
///
/// Versions order by creation time, ties broken by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionKey {
    /// Creation time (primary)
    pub created_at: Timestamp,
    /// Version id (tie-break)
    pub id: VersionId,
}

/// An immutable checkpoint marker within a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Version id
    pub id: VersionId,
    /// Owning collection
    pub collection_id: CollectionId,
    /// Optional description
    pub description: Option<String>,
    /// Free-form metadata
    pub metadata: JsonValue,
    /// Creation time
    pub created_at: Timestamp,
}

impl Version {
    /// Ordering key of this version
    #[inline]
    pub fn key(&self) -> VersionKey {
        VersionKey {
            created_at: self.created_at,
            id: self.id,
        }
    }
}

/// A logical record inside a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// Example id
    pub id: ExampleId,
    /// Owning collection
    pub collection_id: CollectionId,
    /// Creation time of the identity (not of any revision)
    pub created_at: Timestamp,
}

/// One immutable fact about an example as of a version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// Revision id
    pub id: RevisionId,
    /// Example this revision describes
    pub example_id: ExampleId,
    /// Version this revision belongs to
    pub version_id: VersionId,
    /// Ordering key of `version_id`, denormalized for resolution
    pub version_key: VersionKey,
    /// CREATE, PATCH or DELETE
    pub kind: RevisionKind,
    /// Payload (ignored for DELETE)
    pub payload: Payload,
}

impl Revision {
    /// Whether the example is visible when this revision wins
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.kind.is_visible()
    }
}
