//! Append-only revision store
//!
//! # Design
//!
//! - DashMap keyed by collection: writers to different collections lock
//!   different shards, readers never block on each other
//! - Owner maps resolve a version/example/revision id to its shard in O(1)
//! - A single commit lock serializes validate -> persist -> apply -> publish
//!
//! # Visibility
//!
//! Every stored record carries the sequence number of the commit that
//! created it. The watermark is published only after a batch is fully
//! applied, so a snapshot taken at watermark `w` sees exactly the batches
//! `1..=w`, never a partial one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use exemplar_core::{
    CollectionId, CommitBatch, CommitSink, Error, ExampleId, LogRecord, Payload, Result,
    Revision, RevisionId, RevisionKind, Version, VersionId, VersionKey,
};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::chain::RevisionChain;
use crate::shard::CollectionShard;
use crate::snapshot::LogSnapshot;
use crate::stored::Stored;
use crate::validate::CommitValidator;

/// Monotonic id counters, one per record type
///
/// Ids start at 1. Replayed records bump the counters past themselves so
/// fresh ids never collide with journaled ones.
#[derive(Debug)]
struct IdAllocator {
    collection: AtomicU64,
    version: AtomicU64,
    example: AtomicU64,
    revision: AtomicU64,
}

impl IdAllocator {
    fn new() -> Self {
        Self {
            collection: AtomicU64::new(1),
            version: AtomicU64::new(1),
            example: AtomicU64::new(1),
            revision: AtomicU64::new(1),
        }
    }

    #[inline]
    fn next(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::AcqRel)
    }

    #[inline]
    fn observe(counter: &AtomicU64, used: u64) {
        counter.fetch_max(used.saturating_add(1), Ordering::AcqRel);
    }
}

/// In-memory revision log
pub struct RevisionStore {
    shards: DashMap<CollectionId, CollectionShard>,
    version_owner: DashMap<VersionId, CollectionId>,
    example_owner: DashMap<ExampleId, CollectionId>,
    revision_owner: DashMap<RevisionId, ExampleId>,
    /// Sequence of the last fully applied commit
    watermark: AtomicU64,
    commit_lock: Mutex<()>,
    ids: IdAllocator,
    sink: Option<Arc<dyn CommitSink>>,
}

impl RevisionStore {
    /// Create an empty store with no durability sink
    pub fn new() -> Self {
        Self {
            shards: DashMap::new(),
            version_owner: DashMap::new(),
            example_owner: DashMap::new(),
            revision_owner: DashMap::new(),
            watermark: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
            ids: IdAllocator::new(),
            sink: None,
        }
    }

    /// Create an empty store that persists every commit to `sink` first
    pub fn with_sink(sink: Arc<dyn CommitSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::new()
        }
    }

    /// Sequence of the last applied commit
    #[inline]
    pub fn watermark(&self) -> u64 {
        self.watermark.load(Ordering::Acquire)
    }

    /// Number of collections
    pub fn collection_count(&self) -> usize {
        self.shards.len()
    }

    /// Allocate a fresh collection id
    pub fn allocate_collection_id(&self) -> CollectionId {
        CollectionId::new(IdAllocator::next(&self.ids.collection))
    }

    /// Allocate a fresh version id
    pub fn allocate_version_id(&self) -> VersionId {
        VersionId::new(IdAllocator::next(&self.ids.version))
    }

    /// Allocate a fresh example id
    pub fn allocate_example_id(&self) -> ExampleId {
        ExampleId::new(IdAllocator::next(&self.ids.example))
    }

    /// Allocate a fresh revision id
    pub fn allocate_revision_id(&self) -> RevisionId {
        RevisionId::new(IdAllocator::next(&self.ids.revision))
    }

    // ========================================================================
    // Commit path
    // ========================================================================

    /// Atomically commit a batch of records
    ///
    /// The batch is validated as a whole, persisted to the sink (if any), then
    /// applied and published. Returns the commit sequence number.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty batch
    /// - `Integrity` / `Unknown*` if any record breaks a log rule; nothing is
    ///   applied in that case
    /// - Whatever the sink returns if persisting fails
    pub fn commit(&self, records: Vec<LogRecord>) -> Result<u64> {
        self.commit_with(|_| Ok(records))
    }

    /// Build a batch under the commit lock, then commit it
    ///
    /// `build` sees the committed state with no other commit in flight, so
    /// ids it allocates and keys it derives from the latest version cannot be
    /// overtaken by a concurrent writer.
    ///
    /// # Errors
    ///
    /// Whatever `build` returns, plus everything `commit` can return.
    pub fn commit_with<F>(&self, build: F) -> Result<u64>
    where
        F: FnOnce(&RevisionStore) -> Result<Vec<LogRecord>>,
    {
        let _guard = self.commit_lock.lock();

        let records = build(self)?;
        if records.is_empty() {
            return Err(Error::invalid_input("cannot commit an empty batch"));
        }
        if let Err(e) = CommitValidator::new(self).validate(&records) {
            warn!(error = %e, records = records.len(), "Rejected commit");
            return Err(e);
        }

        let batch = CommitBatch {
            seq: self.watermark() + 1,
            records,
        };
        if let Some(sink) = &self.sink {
            sink.persist(&batch)?;
        }
        self.apply(&batch);
        self.watermark.store(batch.seq, Ordering::Release);

        debug!(seq = batch.seq, records = batch.records.len(), "Committed batch");
        Ok(batch.seq)
    }

    /// Re-apply a journaled batch during recovery
    ///
    /// Runs the same validation as a live commit but never touches the sink.
    ///
    /// # Errors
    ///
    /// `Corruption` if the batch is out of sequence or fails validation.
    pub fn replay(&self, batch: CommitBatch) -> Result<()> {
        let _guard = self.commit_lock.lock();

        let watermark = self.watermark();
        if batch.seq <= watermark {
            return Err(Error::Corruption(format!(
                "replayed batch {} does not follow watermark {}",
                batch.seq, watermark
            )));
        }
        CommitValidator::new(self)
            .validate(&batch.records)
            .map_err(|e| Error::Corruption(format!("replayed batch {}: {}", batch.seq, e)))?;

        self.apply(&batch);
        self.watermark.store(batch.seq, Ordering::Release);
        trace!(seq = batch.seq, records = batch.records.len(), "Replayed batch");
        Ok(())
    }

    /// Append one revision at an existing version
    ///
    /// # Errors
    ///
    /// `UnknownVersion` / `UnknownExample` for missing references, `Integrity`
    /// if the revision breaks a log rule.
    pub fn append(
        &self,
        example: ExampleId,
        version: VersionId,
        kind: RevisionKind,
        payload: Payload,
    ) -> Result<RevisionId> {
        let version_key = self
            .committed_version(version)
            .ok_or(Error::UnknownVersion(version))?
            .key();
        let id = self.allocate_revision_id();
        self.commit(vec![LogRecord::RevisionAppended(Revision {
            id,
            example_id: example,
            version_id: version,
            version_key,
            kind,
            payload,
        })])?;
        Ok(id)
    }

    /// Pin a read view at the current watermark
    #[inline]
    pub fn snapshot(self: &Arc<Self>) -> LogSnapshot {
        LogSnapshot::new(Arc::clone(self), self.watermark())
    }

    /// Apply a validated batch. Caller holds the commit lock.
    fn apply(&self, batch: &CommitBatch) {
        let seq = batch.seq;
        for record in &batch.records {
            match record {
                LogRecord::CollectionCreated(collection) => {
                    IdAllocator::observe(&self.ids.collection, collection.id.as_u64());
                    self.shards.insert(
                        collection.id,
                        CollectionShard::new(Stored::new(collection.clone(), seq)),
                    );
                }
                LogRecord::VersionCreated(version) => {
                    IdAllocator::observe(&self.ids.version, version.id.as_u64());
                    self.version_owner.insert(version.id, version.collection_id);
                    if let Some(mut shard) = self.shards.get_mut(&version.collection_id) {
                        shard.push_version(Stored::new(version.clone(), seq));
                    }
                }
                LogRecord::ExampleCreated(example) => {
                    IdAllocator::observe(&self.ids.example, example.id.as_u64());
                    self.example_owner.insert(example.id, example.collection_id);
                    if let Some(mut shard) = self.shards.get_mut(&example.collection_id) {
                        shard.examples.insert(example.id, Stored::new(*example, seq));
                        shard.chains.insert(example.id, RevisionChain::new());
                    }
                }
                LogRecord::RevisionAppended(revision) => {
                    IdAllocator::observe(&self.ids.revision, revision.id.as_u64());
                    self.revision_owner.insert(revision.id, revision.example_id);
                    let Some(owner) = self.example_collection(revision.example_id) else {
                        continue;
                    };
                    if let Some(mut shard) = self.shards.get_mut(&owner) {
                        shard
                            .chains
                            .entry(revision.example_id)
                            .or_default()
                            .push(Stored::new(revision.clone(), seq));
                    }
                }
            }
        }
    }

    // ========================================================================
    // Committed-state lookups (no snapshot filtering; used by validation)
    // ========================================================================

    pub(crate) fn has_collection(&self, id: CollectionId) -> bool {
        self.shards.contains_key(&id)
    }

    pub(crate) fn has_revision(&self, id: RevisionId) -> bool {
        self.revision_owner.contains_key(&id)
    }

    /// Collection owning a version
    pub fn version_collection(&self, id: VersionId) -> Option<CollectionId> {
        self.version_owner.get(&id).map(|owner| *owner)
    }

    /// Collection owning an example
    pub fn example_collection(&self, id: ExampleId) -> Option<CollectionId> {
        self.example_owner.get(&id).map(|owner| *owner)
    }

    /// Latest committed record of a version
    pub fn committed_version(&self, id: VersionId) -> Option<Version> {
        let owner = self.version_collection(id)?;
        let shard = self.shards.get(&owner)?;
        shard.version(id).map(|v| v.record().clone())
    }

    /// Key of the newest committed version of a collection
    pub fn latest_version_key(&self, collection: CollectionId) -> Option<VersionKey> {
        self.shards.get(&collection)?.latest_version_key()
    }

    pub(crate) fn example_head(&self, id: ExampleId) -> Option<(VersionKey, RevisionKind)> {
        let owner = self.example_collection(id)?;
        let shard = self.shards.get(&owner)?;
        shard.chains.get(&id).and_then(RevisionChain::head)
    }

    /// Run `f` against a collection's shard under a shared read guard
    pub(crate) fn with_shard<R>(
        &self,
        collection: CollectionId,
        f: impl FnOnce(&CollectionShard) -> R,
    ) -> Option<R> {
        self.shards.get(&collection).map(|shard| f(shard.value()))
    }

    /// Ids of every collection (unfiltered)
    pub(crate) fn collection_ids(&self) -> Vec<CollectionId> {
        self.shards.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for RevisionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RevisionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionStore")
            .field("collections", &self.collection_count())
            .field("watermark", &self.watermark())
            .field("durable", &self.sink.is_some())
            .finish()
    }
}
