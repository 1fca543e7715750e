//! Commit validation
//!
//! A batch is validated record by record against the committed state plus
//! the records staged earlier in the same batch. Nothing is applied until the
//! whole batch passes, so a failed commit leaves the log unchanged.
//!
//! Rules enforced per record:
//!
//! | Record | Rule |
//! |--------|------|
//! | collection | id is fresh |
//! | version | collection exists, id is fresh, key is newer than the collection's latest |
//! | example | collection exists, id is fresh |
//! | revision | example and version exist in the same collection, id is fresh, denormalized key matches, version is newer than the example's latest revision, kind transition is legal |

use exemplar_core::{
    CollectionId, Error, ExampleId, LogRecord, Result, Revision, RevisionId, RevisionKind,
    Version, VersionId, VersionKey,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::store::RevisionStore;

pub(crate) struct CommitValidator<'a> {
    store: &'a RevisionStore,
    collections: FxHashSet<CollectionId>,
    versions: FxHashMap<VersionId, Version>,
    latest_version: FxHashMap<CollectionId, VersionKey>,
    examples: FxHashMap<ExampleId, CollectionId>,
    heads: FxHashMap<ExampleId, (VersionKey, RevisionKind)>,
    revisions: FxHashSet<RevisionId>,
}

impl<'a> CommitValidator<'a> {
    pub(crate) fn new(store: &'a RevisionStore) -> Self {
        Self {
            store,
            collections: FxHashSet::default(),
            versions: FxHashMap::default(),
            latest_version: FxHashMap::default(),
            examples: FxHashMap::default(),
            heads: FxHashMap::default(),
            revisions: FxHashSet::default(),
        }
    }

    pub(crate) fn validate(mut self, records: &[LogRecord]) -> Result<()> {
        for record in records {
            self.check(record)?;
        }
        Ok(())
    }

    fn collection_exists(&self, id: CollectionId) -> bool {
        self.collections.contains(&id) || self.store.has_collection(id)
    }

    fn version(&self, id: VersionId) -> Option<Version> {
        self.versions
            .get(&id)
            .cloned()
            .or_else(|| self.store.committed_version(id))
    }

    fn latest_version_key(&self, collection: CollectionId) -> Option<VersionKey> {
        self.latest_version
            .get(&collection)
            .copied()
            .or_else(|| self.store.latest_version_key(collection))
    }

    fn example_collection(&self, id: ExampleId) -> Option<CollectionId> {
        self.examples
            .get(&id)
            .copied()
            .or_else(|| self.store.example_collection(id))
    }

    fn example_head(&self, id: ExampleId) -> Option<(VersionKey, RevisionKind)> {
        self.heads
            .get(&id)
            .copied()
            .or_else(|| self.store.example_head(id))
    }

    fn check(&mut self, record: &LogRecord) -> Result<()> {
        match record {
            LogRecord::CollectionCreated(collection) => {
                if self.collection_exists(collection.id) {
                    return Err(Error::integrity(format!(
                        "{} already exists",
                        collection.id
                    )));
                }
                self.collections.insert(collection.id);
            }
            LogRecord::VersionCreated(version) => {
                if !self.collection_exists(version.collection_id) {
                    return Err(Error::UnknownCollection(version.collection_id));
                }
                if self.version(version.id).is_some() {
                    return Err(Error::integrity(format!("{} already exists", version.id)));
                }
                if let Some(latest) = self.latest_version_key(version.collection_id) {
                    if version.key() <= latest {
                        return Err(Error::integrity(format!(
                            "{} created at {} does not follow the latest version of {} ({} at {})",
                            version.id,
                            version.created_at,
                            version.collection_id,
                            latest.id,
                            latest.created_at
                        )));
                    }
                }
                self.latest_version
                    .insert(version.collection_id, version.key());
                self.versions.insert(version.id, version.clone());
            }
            LogRecord::ExampleCreated(example) => {
                if !self.collection_exists(example.collection_id) {
                    return Err(Error::UnknownCollection(example.collection_id));
                }
                if self.example_collection(example.id).is_some() {
                    return Err(Error::integrity(format!("{} already exists", example.id)));
                }
                self.examples.insert(example.id, example.collection_id);
            }
            LogRecord::RevisionAppended(revision) => self.check_revision(revision)?,
        }
        Ok(())
    }

    fn check_revision(&mut self, revision: &Revision) -> Result<()> {
        let example_collection = self
            .example_collection(revision.example_id)
            .ok_or(Error::UnknownExample(revision.example_id))?;
        let version = self
            .version(revision.version_id)
            .ok_or(Error::UnknownVersion(revision.version_id))?;

        if version.collection_id != example_collection {
            return Err(Error::integrity(format!(
                "{} belongs to {} but {} belongs to {}",
                revision.example_id, example_collection, version.id, version.collection_id
            )));
        }
        if self.revisions.contains(&revision.id) || self.store.has_revision(revision.id) {
            return Err(Error::integrity(format!("{} already exists", revision.id)));
        }
        if revision.version_key != version.key() {
            return Err(Error::integrity(format!(
                "{} carries a version key that does not match {}",
                revision.id, version.id
            )));
        }

        let head = self.example_head(revision.example_id);
        if let Some((latest, _)) = head {
            if latest == version.key() {
                return Err(Error::integrity(format!(
                    "{} already has a revision at {}",
                    revision.example_id, version.id
                )));
            }
            if latest > version.key() {
                return Err(Error::integrity(format!(
                    "{} has a revision at {} which is newer than {}",
                    revision.example_id, latest.id, version.id
                )));
            }
        }
        let previous = head.map(|(_, kind)| kind);
        if !RevisionKind::may_follow(previous, revision.kind) {
            return Err(Error::integrity(format!(
                "{} cannot follow {} for {}",
                revision.kind,
                previous.map(|k| k.as_str()).unwrap_or("nothing"),
                revision.example_id
            )));
        }

        self.revisions.insert(revision.id);
        self.heads
            .insert(revision.example_id, (version.key(), revision.kind));
        Ok(())
    }
}
