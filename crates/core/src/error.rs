//! Error types for exemplar
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! # Categories
//!
//! | Category | Variants | Caller action |
//! |----------|----------|---------------|
//! | Integrity | `Integrity` | Fix the write; the log is unchanged |
//! | Cursor | `MalformedCursor`, `CursorSortMismatch` | Resend with a valid token |
//! | Not Found | `UnknownCollection`, `UnknownExample`, `UnknownVersion` | Check identifiers |
//! | Validation | `InvalidInput` | Fix the request |
//! | System | `Io`, `Serialization`, `Corruption`, `IncompleteEntry` | Passed through unmodified |

use crate::types::{CollectionId, ExampleId, VersionId};
use std::io;
use thiserror::Error;

/// Result type alias for exemplar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the exemplar store
#[derive(Debug, Error)]
pub enum Error {
    /// A revision log invariant would be violated by a write
    #[error("integrity error: {reason}")]
    Integrity {
        /// Which invariant failed and for which record
        reason: String,
    },

    /// Pagination token could not be decoded
    #[error("malformed cursor: {reason}")]
    MalformedCursor {
        /// Decoder diagnostic
        reason: String,
    },

    /// Pagination token was minted under a different sort
    #[error("cursor sort mismatch: request sorts by {expected}, cursor carries {actual}")]
    CursorSortMismatch {
        /// Sort description of the current request
        expected: String,
        /// Sort description embedded in the cursor
        actual: String,
    },

    /// Collection id not present in the log
    #[error("collection not found: {0}")]
    UnknownCollection(CollectionId),

    /// Example id not present in the log (or not in the requested collection)
    #[error("example not found: {0}")]
    UnknownExample(ExampleId),

    /// Version id not present in the log (or not in the requested collection)
    #[error("version not found: {0}")]
    UnknownVersion(VersionId),

    /// Invalid request parameter
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input
        reason: String,
    },

    /// I/O error (journal file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Data corruption detected
    #[error("data corruption: {0}")]
    Corruption(String),

    /// Journal frame is shorter than its declared length
    ///
    /// Only expected at the tail of the journal after a crash mid-write.
    #[error("incomplete entry at offset {offset}: have {have} bytes, need {needed}")]
    IncompleteEntry {
        /// File offset of the frame
        offset: u64,
        /// Bytes available
        have: usize,
        /// Bytes required by the frame header
        needed: usize,
    },
}

impl Error {
    /// Build an `Integrity` error
    pub fn integrity(reason: impl Into<String>) -> Self {
        Error::Integrity {
            reason: reason.into(),
        }
    }

    /// Build a `MalformedCursor` error
    pub fn malformed_cursor(reason: impl Into<String>) -> Self {
        Error::MalformedCursor {
            reason: reason.into(),
        }
    }

    /// Build an `InvalidInput` error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    /// True for the "referenced identifier absent" family
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::UnknownCollection(_) | Error::UnknownExample(_) | Error::UnknownVersion(_)
        )
    }

    /// True when the caller can fix the request and retry
    ///
    /// Storage failures are never user errors.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedCursor { .. }
                | Error::CursorSortMismatch { .. }
                | Error::InvalidInput { .. }
                | Error::Integrity { .. }
        ) || self.is_not_found()
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
