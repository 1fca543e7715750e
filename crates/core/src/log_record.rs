//! Log records and commit batches
//!
//! A commit is an ordered batch of creation records. The same batch type is
//! applied to the in-memory log and written to the journal, so replay goes
//! through exactly the validation a live commit does.

use crate::records::{Collection, Example, Revision, Version};
use serde::{Deserialize, Serialize};

/// One creation fact in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogRecord {
    /// A new collection
    CollectionCreated(Collection),
    /// A new version marker
    VersionCreated(Version),
    /// A new example identity
    ExampleCreated(Example),
    /// A new revision of an existing example
    RevisionAppended(Revision),
}

impl LogRecord {
    /// Short name for logging
    pub fn kind_name(&self) -> &'static str {
        match self {
            LogRecord::CollectionCreated(_) => "collection",
            LogRecord::VersionCreated(_) => "version",
            LogRecord::ExampleCreated(_) => "example",
            LogRecord::RevisionAppended(_) => "revision",
        }
    }
}

/// An atomically committed group of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitBatch {
    /// Commit sequence number (the watermark after this commit)
    pub seq: u64,
    /// Records in application order
    pub records: Vec<LogRecord>,
}
