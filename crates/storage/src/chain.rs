//! Per-example revision chain
//!
//! Revisions are stored newest-first for efficient as-of reads: we typically
//! want the most recent revision with version key <= bound.
//!
//! Revisions enter a chain in strictly increasing version key order (the
//! commit validator rejects anything else), and commits are serialized, so
//! commit sequence numbers also decrease from front to back. A snapshot at
//! watermark `w` therefore sees a suffix of the chain.

use std::collections::VecDeque;
use std::sync::Arc;

use exemplar_core::{Revision, RevisionKind, VersionKey};

use crate::stored::Stored;

/// Revision history of one example, newest first
#[derive(Debug, Clone)]
pub struct RevisionChain {
    /// VecDeque gives O(1) push_front for new revisions
    revisions: VecDeque<Stored<Revision>>,
}

impl RevisionChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            revisions: VecDeque::with_capacity(2),
        }
    }

    /// Add a revision newer than every existing one
    #[inline]
    pub fn push(&mut self, revision: Stored<Revision>) {
        debug_assert!(
            self.revisions
                .front()
                .map(|front| front.record().version_key < revision.record().version_key)
                .unwrap_or(true),
            "revisions must be pushed in increasing version order"
        );
        self.revisions.push_front(revision);
    }

    /// Latest committed revision regardless of snapshot
    ///
    /// Used by commit validation, which always runs against the newest state.
    #[inline]
    pub fn latest(&self) -> Option<&Revision> {
        self.revisions.front().map(|s| s.record())
    }

    /// Kind and version key of the latest revision
    pub fn head(&self) -> Option<(VersionKey, RevisionKind)> {
        self.latest().map(|r| (r.version_key, r.kind))
    }

    /// Revisions visible at `watermark`, newest first
    pub fn visible(&self, watermark: u64) -> impl Iterator<Item = &Stored<Revision>> + '_ {
        self.revisions
            .iter()
            .skip_while(move |s| !s.visible_at(watermark))
    }

    /// Winning revision as of `bound`: greatest version key <= bound
    pub fn get_at(&self, bound: VersionKey, watermark: u64) -> Option<Arc<Revision>> {
        self.visible(watermark)
            .find(|s| s.record().version_key <= bound)
            .map(Stored::shared)
    }

    /// Visible revisions with version key <= bound, oldest first
    pub fn up_to(&self, bound: VersionKey, watermark: u64) -> Vec<Arc<Revision>> {
        let mut out: Vec<Arc<Revision>> = self
            .visible(watermark)
            .filter(|s| s.record().version_key <= bound)
            .map(Stored::shared)
            .collect();
        out.reverse();
        out
    }

    /// Visible history, newest first
    pub fn history(&self, watermark: u64) -> Vec<Arc<Revision>> {
        self.visible(watermark).map(Stored::shared).collect()
    }

    /// Number of revisions in the chain (all commits)
    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    /// Check if the chain is empty
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }
}

impl Default for RevisionChain {
    fn default() -> Self {
        Self::new()
    }
}
