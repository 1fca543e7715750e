//! Database struct and open logic
//!
//! This module provides the main Database struct that orchestrates:
//! - Storage initialization
//! - Journal opening
//! - Replay on startup
//! - Ingestion (collections, versions, examples, revisions)
//! - Reads: collection state as of a version, single examples, pages
//!
//! Every read takes one store snapshot and does all of its work against it,
//! so resolution, filtering, pagination and cursor minting agree even while
//! writers commit.

pub mod builder;
pub mod config;
mod query;

pub use builder::DatabaseBuilder;
pub use config::{DatabaseConfig, CONFIG_FILE_NAME, DEFAULT_PAGE_SIZE};
pub use query::PageQuery;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use exemplar_core::{
    Collection, CollectionId, CommitSink, Error, Example, ExampleId, LogRecord, LogView, Payload,
    Result, Revision, RevisionId, RevisionKind, Timestamp, Version, VersionId,
};
use exemplar_durability::{read_journal, DurabilityMode, Journal, Replay, JOURNAL_FILE_NAME};
use exemplar_storage::{LogSnapshot, RevisionStore};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::pagination::{Page, PageDirection, PageRequest, Paginator};
use crate::projection::{CollectionProjection, ExampleState};
use crate::resolver::VersionBound;

/// Revision staged for `Database::commit_version`
struct PendingRevision {
    example: ExampleId,
    /// Create the example identity in the same batch
    new_example: bool,
    kind: RevisionKind,
    payload: Payload,
}

/// Main database struct
///
/// Owns the revision store and, for on-disk databases, the journal every
/// commit is written to before it becomes visible.
pub struct Database {
    store: Arc<RevisionStore>,
    /// Present unless the database is ephemeral or in cache mode
    journal: Option<Arc<Journal>>,
    data_dir: Option<PathBuf>,
    config: DatabaseConfig,
    mode: DurabilityMode,
    paginator: Paginator,
}

impl Database {
    // ========================================================================
    // Opening
    // ========================================================================

    /// Open database at the given path with settings from `exemplar.toml`
    ///
    /// Creates the directory and a default config file if missing, then
    /// replays the journal.
    ///
    /// # Errors
    ///
    /// Invalid config, directory creation, journal opening, or replay
    /// failure (`Corruption` for a damaged journal record).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let config = Self::load_config(path.as_ref())?;
        let mode = config.durability_mode()?;
        Self::open_with_mode_and_config(path, mode, config)
    }

    /// Open database at the given path with an explicit configuration
    ///
    /// The supplied config is written to `exemplar.toml` so that subsequent
    /// `Database::open()` calls pick up the same settings.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: DatabaseConfig) -> Result<Arc<Self>> {
        Self::builder().path(path.as_ref()).config(config).open()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// In-memory database with default settings; nothing touches disk
    pub fn ephemeral() -> Arc<Self> {
        let config = DatabaseConfig::default();
        Arc::new(Self {
            store: Arc::new(RevisionStore::new()),
            journal: None,
            data_dir: None,
            paginator: Paginator::new(config.max_page_size),
            config,
            mode: DurabilityMode::Cache,
        })
    }

    pub(crate) fn load_config(data_dir: &Path) -> Result<DatabaseConfig> {
        std::fs::create_dir_all(data_dir)?;
        let config_path = data_dir.join(CONFIG_FILE_NAME);
        DatabaseConfig::write_default_if_missing(&config_path)?;
        DatabaseConfig::from_file(&config_path)
    }

    pub(crate) fn open_with_mode_and_config<P: AsRef<Path>>(
        path: P,
        mode: DurabilityMode,
        config: DatabaseConfig,
    ) -> Result<Arc<Self>> {
        let data_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        let journal_path = data_dir.join(JOURNAL_FILE_NAME);

        let (store, journal, replay) = if mode.requires_journal() {
            let (journal, replay) = Journal::open(&journal_path, mode)?;
            let journal = Arc::new(journal);
            let sink: Arc<dyn CommitSink> = journal.clone();
            (RevisionStore::with_sink(sink), Some(journal), replay)
        } else {
            (RevisionStore::new(), None, read_journal(&journal_path)?)
        };

        let Replay {
            batches,
            valid_len,
            truncated_bytes,
        } = replay;
        let replayed = batches.len();
        for batch in batches {
            store.replay(batch)?;
        }

        info!(
            target: "exemplar::db",
            path = ?data_dir,
            durability = mode.description(),
            batches = replayed,
            journal_bytes = valid_len,
            truncated_bytes,
            watermark = store.watermark(),
            "Database opened"
        );

        Ok(Arc::new(Self {
            store: Arc::new(store),
            journal,
            data_dir: Some(data_dir),
            paginator: Paginator::new(config.max_page_size),
            config,
            mode,
        }))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Data directory, `None` for ephemeral databases
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Whether nothing is persisted
    pub fn is_ephemeral(&self) -> bool {
        self.data_dir.is_none()
    }

    /// Active durability mode
    pub fn durability_mode(&self) -> DurabilityMode {
        self.mode
    }

    /// Active configuration
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Pin a read view at the current commit watermark
    pub fn snapshot(&self) -> LogSnapshot {
        self.store.snapshot()
    }

    /// Force buffered journal writes to disk
    ///
    /// No-op without a journal.
    pub fn flush(&self) -> Result<()> {
        match &self.journal {
            Some(journal) => journal.sync(),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Create a collection
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty name.
    pub fn create_collection(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        metadata: JsonValue,
    ) -> Result<CollectionId> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::invalid_input("collection name must not be empty"));
        }
        let id = self.store.allocate_collection_id();
        self.store.commit(vec![LogRecord::CollectionCreated(Collection {
            id,
            name,
            description,
            metadata,
            created_at: Timestamp::now(),
        })])?;
        Ok(id)
    }

    /// Create a version stamped with the current time
    ///
    /// If the clock reads earlier than the collection's latest version, the
    /// new version takes the latest version's time instead.
    ///
    /// # Errors
    ///
    /// `UnknownCollection` if the collection does not exist.
    pub fn create_version(
        &self,
        collection: CollectionId,
        description: Option<String>,
        metadata: JsonValue,
    ) -> Result<VersionId> {
        self.commit_version(collection, description, metadata, None, Vec::new)
            .map(|(id, _)| id)
    }

    /// Create a version with an explicit creation time
    ///
    /// # Errors
    ///
    /// `Integrity` if `created_at` precedes the latest version of the
    /// collection, `UnknownCollection` if it does not exist.
    pub fn create_version_at(
        &self,
        collection: CollectionId,
        description: Option<String>,
        metadata: JsonValue,
        created_at: Timestamp,
    ) -> Result<VersionId> {
        self.commit_version(collection, description, metadata, Some(created_at), Vec::new)
            .map(|(id, _)| id)
    }

    /// Create an example identity with no revisions
    ///
    /// # Errors
    ///
    /// `UnknownCollection` if the collection does not exist.
    pub fn create_example(&self, collection: CollectionId) -> Result<ExampleId> {
        let id = self.store.allocate_example_id();
        self.store.commit(vec![LogRecord::ExampleCreated(Example {
            id,
            collection_id: collection,
            created_at: Timestamp::now(),
        })])?;
        Ok(id)
    }

    /// Append one revision in a new version of its own
    ///
    /// Returns the new version. Nothing is committed if the revision is
    /// rejected.
    ///
    /// # Errors
    ///
    /// `Integrity` for an illegal transition or an example of another
    /// collection, `UnknownExample` / `UnknownCollection` for missing ids.
    pub fn append_revision(
        &self,
        collection: CollectionId,
        example: ExampleId,
        kind: RevisionKind,
        payload: Payload,
    ) -> Result<VersionId> {
        self.commit_version(collection, None, JsonValue::Null, None, || {
            vec![PendingRevision {
                example,
                new_example: false,
                kind,
                payload,
            }]
        })
        .map(|(id, _)| id)
    }

    /// Append one revision at an existing version
    ///
    /// # Errors
    ///
    /// `Integrity` for an illegal transition, a version the example has
    /// already moved past, or an example of another collection.
    pub fn append_revision_at(
        &self,
        version: VersionId,
        example: ExampleId,
        kind: RevisionKind,
        payload: Payload,
    ) -> Result<RevisionId> {
        self.store.append(example, version, kind, payload)
    }

    /// Create a version holding one new example per payload
    ///
    /// Returns the version and the example ids in payload order.
    ///
    /// # Errors
    ///
    /// `UnknownCollection` if the collection does not exist.
    pub fn insert_examples(
        &self,
        collection: CollectionId,
        description: Option<String>,
        payloads: Vec<Payload>,
    ) -> Result<(VersionId, Vec<ExampleId>)> {
        let (version, revisions) =
            self.commit_version(collection, description, JsonValue::Null, None, || {
                payloads
                    .into_iter()
                    .map(|payload| PendingRevision {
                        example: self.store.allocate_example_id(),
                        new_example: true,
                        kind: RevisionKind::Create,
                        payload,
                    })
                    .collect()
            })?;
        let examples = revisions.into_iter().map(|(example, _)| example).collect();
        Ok((version, examples))
    }

    /// Commit one version plus revisions at it, as a single batch
    ///
    /// The version id and time are picked under the commit lock so
    /// concurrent writers cannot interleave out of order.
    fn commit_version<F>(
        &self,
        collection: CollectionId,
        description: Option<String>,
        metadata: JsonValue,
        created_at: Option<Timestamp>,
        revisions: F,
    ) -> Result<(VersionId, Vec<(ExampleId, RevisionId)>)>
    where
        F: FnOnce() -> Vec<PendingRevision>,
    {
        let mut outcome = None;
        self.store.commit_with(|store| {
            let latest = store.latest_version_key(collection);
            let created_at = created_at.unwrap_or_else(|| {
                let now = Timestamp::now();
                latest.map_or(now, |key| now.max(key.created_at))
            });
            let version = Version {
                id: store.allocate_version_id(),
                collection_id: collection,
                description,
                metadata,
                created_at,
            };

            let mut records = vec![LogRecord::VersionCreated(version.clone())];
            let mut appended = Vec::new();
            for pending in revisions() {
                if pending.new_example {
                    records.push(LogRecord::ExampleCreated(Example {
                        id: pending.example,
                        collection_id: collection,
                        created_at,
                    }));
                }
                let revision = Revision {
                    id: store.allocate_revision_id(),
                    example_id: pending.example,
                    version_id: version.id,
                    version_key: version.key(),
                    kind: pending.kind,
                    payload: pending.payload,
                };
                appended.push((pending.example, revision.id));
                records.push(LogRecord::RevisionAppended(revision));
            }
            outcome = Some((version.id, appended));
            Ok(records)
        })?;
        outcome.ok_or_else(|| Error::integrity("commit produced no version"))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Look up a collection
    pub fn collection(&self, id: CollectionId) -> Option<Collection> {
        self.snapshot().collection(id)
    }

    /// All collections, ascending id
    pub fn collections(&self) -> Vec<Collection> {
        self.snapshot().collections()
    }

    /// Newest version of a collection, `None` if it has none
    ///
    /// # Errors
    ///
    /// `UnknownCollection` if the collection does not exist.
    pub fn latest_version(&self, collection: CollectionId) -> Result<Option<Version>> {
        Ok(self.snapshot().versions(collection)?.pop())
    }

    /// Visible examples as of `bound`, descending example id
    ///
    /// # Errors
    ///
    /// `UnknownCollection`, or `UnknownVersion` for a version of another
    /// collection.
    pub fn get_collection_state(
        &self,
        collection: CollectionId,
        bound: impl Into<VersionBound>,
    ) -> Result<Vec<ExampleState>> {
        let snapshot = self.snapshot();
        CollectionProjection::new(&snapshot, collection, bound.into())?.states()
    }

    /// One example as of `bound`, `None` if absent there
    ///
    /// # Errors
    ///
    /// `UnknownExample` if the example is not in the collection, plus the
    /// bound errors of `get_collection_state`.
    pub fn example_state(
        &self,
        collection: CollectionId,
        example: ExampleId,
        bound: impl Into<VersionBound>,
    ) -> Result<Option<ExampleState>> {
        let snapshot = self.snapshot();
        CollectionProjection::new(&snapshot, collection, bound.into())?.get(example)
    }

    /// Number of visible examples as of `bound`
    ///
    /// # Errors
    ///
    /// Same as `get_collection_state`.
    pub fn example_count(
        &self,
        collection: CollectionId,
        bound: impl Into<VersionBound>,
    ) -> Result<usize> {
        let snapshot = self.snapshot();
        CollectionProjection::new(&snapshot, collection, bound.into())?.count()
    }

    /// Every revision of an example, newest first
    ///
    /// # Errors
    ///
    /// `UnknownExample` if the example does not exist.
    pub fn example_revisions(&self, example: ExampleId) -> Result<Vec<Arc<Revision>>> {
        self.snapshot().example_history(example)
    }

    /// One page of the collection as of `bound`
    ///
    /// The predicate runs before pagination, so pages are dense.
    ///
    /// # Errors
    ///
    /// Bound errors as for `get_collection_state`; `InvalidInput`,
    /// `MalformedCursor` and `CursorSortMismatch` from pagination.
    pub fn fetch_page(
        &self,
        collection: CollectionId,
        bound: impl Into<VersionBound>,
        query: &PageQuery,
    ) -> Result<Page<ExampleState>> {
        let snapshot = self.snapshot();
        let projection = CollectionProjection::new(&snapshot, collection, bound.into())?;

        let mut rows = projection.states()?;
        if let Some(predicate) = &query.predicate {
            rows.retain(|row| predicate.matches(row));
        }
        let sort = query.sort.as_ref().map(|spec| spec.row_sort());
        let request = PageRequest {
            page_size: query.page_size.unwrap_or(self.config.default_page_size),
            cursor: query.cursor.as_deref(),
            direction: query.direction,
        };
        let candidates = rows.len();
        let page = self.paginator.paginate(rows, sort.as_ref(), request)?;

        debug!(
            target: "exemplar::db",
            %collection,
            version = ?projection.version().map(|v| v.id),
            watermark = snapshot.watermark(),
            candidates,
            returned = page.len(),
            "Fetched page"
        );
        Ok(page)
    }

    /// Versions of a collection, newest first, cursor-paged forward
    ///
    /// # Errors
    ///
    /// `UnknownCollection`; `InvalidInput` / `MalformedCursor` /
    /// `CursorSortMismatch` from pagination.
    pub fn list_versions(
        &self,
        collection: CollectionId,
        first: Option<usize>,
        after: Option<&str>,
    ) -> Result<Page<Version>> {
        let versions = self.snapshot().versions(collection)?;
        let request = PageRequest {
            page_size: first.unwrap_or(self.config.default_page_size),
            cursor: after,
            direction: PageDirection::Forward,
        };
        self.paginator.paginate(versions, None, request)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("data_dir", &self.data_dir)
            .field("durability", &self.mode)
            .field("watermark", &self.store.watermark())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(input: JsonValue) -> Payload {
        Payload::new(input, json!({}), json!({}))
    }

    #[test]
    fn test_append_revision_creates_version_and_example() {
        let db = Database::ephemeral();
        let c = db.create_collection("animals", None, json!({})).unwrap();
        let e = db.create_example(c).unwrap();

        let v1 = db
            .append_revision(c, e, RevisionKind::Create, payload(json!({"in": "foo"})))
            .unwrap();
        assert_eq!(db.latest_version(c).unwrap().unwrap().id, v1);
        let state = db.example_state(c, e, v1).unwrap().unwrap();
        assert_eq!(state.input, json!({"in": "foo"}));
        assert_eq!(state.version_id, v1);
    }

    #[test]
    fn test_rejected_revision_leaves_no_version() {
        let db = Database::ephemeral();
        let c = db.create_collection("animals", None, json!({})).unwrap();
        let e = db.create_example(c).unwrap();

        let err = db
            .append_revision(c, e, RevisionKind::Patch, payload(json!({})))
            .unwrap_err();
        assert!(matches!(err, Error::Integrity { .. }));
        assert!(db.latest_version(c).unwrap().is_none());
    }

    #[test]
    fn test_insert_examples_returns_ids_in_order() {
        let db = Database::ephemeral();
        let c = db.create_collection("numbers", None, json!({})).unwrap();
        let (v, ids) = db
            .insert_examples(
                c,
                Some("bulk".into()),
                (0..3).map(|i| payload(json!({ "n": i }))).collect(),
            )
            .unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(db.example_count(c, v).unwrap(), 3);
        let first = db.example_state(c, ids[0], v).unwrap().unwrap();
        assert_eq!(first.input, json!({"n": 0}));
    }

    #[test]
    fn test_empty_collection_name_rejected() {
        let db = Database::ephemeral();
        assert!(matches!(
            db.create_collection("  ", None, json!({})),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_versions_never_go_backwards_in_time() {
        let db = Database::ephemeral();
        let c = db.create_collection("future", None, json!({})).unwrap();
        let far_future = Timestamp::now().saturating_add(std::time::Duration::from_secs(3600));
        db.create_version_at(c, None, json!({}), far_future).unwrap();

        // Clock reads earlier than the latest version; the new one is clamped
        let v = db.create_version(c, None, json!({})).unwrap();
        let latest = db.latest_version(c).unwrap().unwrap();
        assert_eq!(latest.id, v);
        assert_eq!(latest.created_at, far_future);

        // Explicit earlier time is an error
        let err = db
            .create_version_at(c, None, json!({}), Timestamp::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::Integrity { .. }));
    }

    #[test]
    fn test_unknown_collection() {
        let db = Database::ephemeral();
        let missing = CollectionId::new(42);
        assert!(matches!(
            db.create_version(missing, None, json!({})),
            Err(Error::UnknownCollection(_))
        ));
        assert!(matches!(
            db.get_collection_state(missing, VersionBound::Latest),
            Err(Error::UnknownCollection(_))
        ));
        assert!(db.collection(missing).is_none());
    }

    #[test]
    fn test_ephemeral_has_no_files() {
        let db = Database::ephemeral();
        assert!(db.is_ephemeral());
        assert!(db.data_dir().is_none());
        assert_eq!(db.durability_mode(), DurabilityMode::Cache);
        db.flush().unwrap();
    }
}
