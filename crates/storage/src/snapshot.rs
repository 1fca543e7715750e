//! Point-in-time read view of the revision store
//!
//! A snapshot holds an `Arc` to the live store plus the watermark at the
//! moment it was taken. Reads filter every record by commit sequence, so
//! commits that land after the snapshot stay invisible.
//!
//! Acquisition is O(1): one atomic load and one `Arc::clone`.

use std::sync::Arc;

use exemplar_core::{
    Collection, CollectionId, Error, Example, ExampleId, LogView, Result, Revision, Version,
    VersionId, VersionKey,
};

use crate::shard::CollectionShard;
use crate::store::RevisionStore;

/// Snapshot of a `RevisionStore` at a commit watermark
#[derive(Clone)]
pub struct LogSnapshot {
    store: Arc<RevisionStore>,
    watermark: u64,
}

impl LogSnapshot {
    pub(crate) fn new(store: Arc<RevisionStore>, watermark: u64) -> Self {
        Self { store, watermark }
    }

    /// Run `f` on the shard if its collection is visible here
    fn shard<R>(
        &self,
        collection: CollectionId,
        f: impl FnOnce(&CollectionShard) -> R,
    ) -> Option<R> {
        let watermark = self.watermark;
        self.store
            .with_shard(collection, |shard| {
                shard
                    .collection
                    .visible_at(watermark)
                    .then(|| f(shard))
            })
            .flatten()
    }
}

impl std::fmt::Debug for LogSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSnapshot")
            .field("watermark", &self.watermark)
            .finish()
    }
}

impl LogView for LogSnapshot {
    fn watermark(&self) -> u64 {
        self.watermark
    }

    fn collection(&self, id: CollectionId) -> Option<Collection> {
        self.shard(id, |shard| shard.collection.record().clone())
    }

    fn collections(&self) -> Vec<Collection> {
        let mut out: Vec<Collection> = self
            .store
            .collection_ids()
            .into_iter()
            .filter_map(|id| self.collection(id))
            .collect();
        out.sort_by_key(|c| c.id);
        out
    }

    fn version(&self, id: VersionId) -> Option<Version> {
        let owner = self.store.version_collection(id)?;
        let watermark = self.watermark;
        self.shard(owner, |shard| {
            shard
                .version(id)
                .filter(|v| v.visible_at(watermark))
                .map(|v| v.record().clone())
        })
        .flatten()
    }

    fn versions(&self, collection: CollectionId) -> Result<Vec<Version>> {
        let watermark = self.watermark;
        self.shard(collection, |shard| {
            shard
                .versions
                .iter()
                .filter(|v| v.visible_at(watermark))
                .map(|v| v.record().clone())
                .collect()
        })
        .ok_or(Error::UnknownCollection(collection))
    }

    fn example(&self, id: ExampleId) -> Option<Example> {
        let owner = self.store.example_collection(id)?;
        let watermark = self.watermark;
        self.shard(owner, |shard| {
            shard
                .examples
                .get(&id)
                .filter(|e| e.visible_at(watermark))
                .map(|e| *e.record())
        })
        .flatten()
    }

    fn examples(&self, collection: CollectionId) -> Result<Vec<Example>> {
        let watermark = self.watermark;
        self.shard(collection, |shard| {
            shard
                .examples
                .values()
                .filter(|e| e.visible_at(watermark))
                .map(|e| *e.record())
                .collect()
        })
        .ok_or(Error::UnknownCollection(collection))
    }

    fn revisions_up_to(
        &self,
        collection: CollectionId,
        bound: VersionKey,
    ) -> Result<Vec<Arc<Revision>>> {
        let watermark = self.watermark;
        self.shard(collection, |shard| {
            shard
                .chains
                .values()
                .flat_map(|chain| chain.up_to(bound, watermark))
                .collect()
        })
        .ok_or(Error::UnknownCollection(collection))
    }

    fn revisions_for(
        &self,
        examples: &[ExampleId],
        bound: VersionKey,
    ) -> Result<Vec<Arc<Revision>>> {
        let mut out = Vec::new();
        for &id in examples {
            let example = self.example(id).ok_or(Error::UnknownExample(id))?;
            let watermark = self.watermark;
            let revisions = self
                .shard(example.collection_id, |shard| {
                    shard
                        .chains
                        .get(&id)
                        .map(|chain| chain.up_to(bound, watermark))
                        .unwrap_or_default()
                })
                .unwrap_or_default();
            out.extend(revisions);
        }
        Ok(out)
    }

    fn example_history(&self, example: ExampleId) -> Result<Vec<Arc<Revision>>> {
        let record = self
            .example(example)
            .ok_or(Error::UnknownExample(example))?;
        let watermark = self.watermark;
        Ok(self
            .shard(record.collection_id, |shard| {
                shard
                    .chains
                    .get(&example)
                    .map(|chain| chain.history(watermark))
                    .unwrap_or_default()
            })
            .unwrap_or_default())
    }
}
