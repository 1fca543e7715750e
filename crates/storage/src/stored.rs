//! Storage wrapper tagging a record with its commit sequence
//!
//! - `Stored<T>`: internal storage type carrying the commit sequence
//!   (a storage concern)
//! - `T`: contract record handed to readers (no commit sequence)

use std::sync::Arc;

/// A record plus the commit that made it visible
#[derive(Debug)]
pub struct Stored<T> {
    seq: u64,
    record: Arc<T>,
}

impl<T> Stored<T> {
    /// Wrap a record committed at `seq`
    pub fn new(record: T, seq: u64) -> Self {
        Self {
            seq,
            record: Arc::new(record),
        }
    }

    /// Commit sequence that published this record
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether a snapshot pinned at `watermark` can see this record
    #[inline]
    pub fn visible_at(&self, watermark: u64) -> bool {
        self.seq <= watermark
    }

    /// Borrow the record
    #[inline]
    pub fn record(&self) -> &T {
        &self.record
    }

    /// Shared handle to the record
    #[inline]
    pub fn shared(&self) -> Arc<T> {
        Arc::clone(&self.record)
    }
}

impl<T> Clone for Stored<T> {
    fn clone(&self) -> Self {
        Self {
            seq: self.seq,
            record: Arc::clone(&self.record),
        }
    }
}
