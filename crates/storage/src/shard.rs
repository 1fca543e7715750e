//! Per-collection shard
//!
//! Each collection gets its own shard so writers to different collections
//! lock different DashMap entries. Within a shard, versions are kept in
//! ascending key order and revisions in per-example chains.

use std::collections::BTreeMap;

use exemplar_core::{Collection, Example, ExampleId, Version, VersionId, VersionKey};
use rustc_hash::FxHashMap;

use crate::chain::RevisionChain;
use crate::stored::Stored;

/// All records belonging to one collection
#[derive(Debug)]
pub struct CollectionShard {
    pub(crate) collection: Stored<Collection>,
    /// Ascending `VersionKey`; the validator only admits newer keys
    pub(crate) versions: Vec<Stored<Version>>,
    pub(crate) version_index: FxHashMap<VersionId, usize>,
    pub(crate) examples: BTreeMap<ExampleId, Stored<Example>>,
    pub(crate) chains: FxHashMap<ExampleId, RevisionChain>,
}

impl CollectionShard {
    /// Create a shard for a freshly committed collection
    pub fn new(collection: Stored<Collection>) -> Self {
        Self {
            collection,
            versions: Vec::new(),
            version_index: FxHashMap::default(),
            examples: BTreeMap::new(),
            chains: FxHashMap::default(),
        }
    }

    /// Look up a version of this collection (ignores snapshots)
    pub fn version(&self, id: VersionId) -> Option<&Stored<Version>> {
        self.version_index.get(&id).map(|&i| &self.versions[i])
    }

    /// Key of the newest committed version
    pub fn latest_version_key(&self) -> Option<VersionKey> {
        self.versions.last().map(|v| v.record().key())
    }

    pub(crate) fn push_version(&mut self, version: Stored<Version>) {
        self.version_index
            .insert(version.record().id, self.versions.len());
        self.versions.push(version);
    }

    /// Number of example identities (all commits)
    pub fn example_count(&self) -> usize {
        self.examples.len()
    }
}
