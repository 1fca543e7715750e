//! Read abstraction over the revision log
//!
//! The resolver, projection and pagination layers only ever read through
//! `LogView`, so a different backing store can be swapped in without
//! touching them.

use std::sync::Arc;

use crate::error::Result;
use crate::log_record::CommitBatch;
use crate::records::{Collection, Example, Revision, Version, VersionKey};
use crate::types::{CollectionId, ExampleId, VersionId};

/// Consistent, read-only view of the revision log
///
/// Every method observes the same commit watermark for the lifetime of the
/// view. Thread safety: implementations must be `Send + Sync`.
pub trait LogView: Send + Sync {
    /// Commit watermark this view is pinned at
    fn watermark(&self) -> u64;

    /// Look up a collection
    fn collection(&self, id: CollectionId) -> Option<Collection>;

    /// All collections, ascending id
    fn collections(&self) -> Vec<Collection>;

    /// Look up a version (any collection)
    fn version(&self, id: VersionId) -> Option<Version>;

    /// Versions of a collection in ascending `VersionKey` order
    ///
    /// # Errors
    ///
    /// `UnknownCollection` if the collection is not visible.
    fn versions(&self, collection: CollectionId) -> Result<Vec<Version>>;

    /// Look up an example (any collection)
    fn example(&self, id: ExampleId) -> Option<Example>;

    /// Example identities of a collection, ascending id
    ///
    /// # Errors
    ///
    /// `UnknownCollection` if the collection is not visible.
    fn examples(&self, collection: CollectionId) -> Result<Vec<Example>>;

    /// Every revision of the collection whose version key is `<= bound`
    ///
    /// This is the whole candidate set for set-based resolution. No ordering
    /// guarantee across examples.
    ///
    /// # Errors
    ///
    /// `UnknownCollection` if the collection is not visible.
    fn revisions_up_to(&self, collection: CollectionId, bound: VersionKey)
        -> Result<Vec<Arc<Revision>>>;

    /// Revisions of the given examples whose version key is `<= bound`
    ///
    /// Within one example, revisions come in ascending version order.
    ///
    /// # Errors
    ///
    /// `UnknownExample` if any example is not visible.
    fn revisions_for(&self, examples: &[ExampleId], bound: VersionKey)
        -> Result<Vec<Arc<Revision>>>;

    /// Full revision history of one example, newest first
    ///
    /// # Errors
    ///
    /// `UnknownExample` if the example is not visible.
    fn example_history(&self, example: ExampleId) -> Result<Vec<Arc<Revision>>>;
}

/// Destination that must durably accept a batch before it becomes visible
///
/// The store calls `persist` under its commit lock, after validation and
/// before applying the batch in memory. A failure aborts the commit.
pub trait CommitSink: Send + Sync {
    /// Persist one validated batch
    ///
    /// # Errors
    ///
    /// Any I/O or serialization failure; the commit is then abandoned.
    fn persist(&self, batch: &CommitBatch) -> Result<()>;
}
