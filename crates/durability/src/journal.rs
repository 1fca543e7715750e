//! Append-only journal file
//!
//! The journal is the durable form of the revision log: one frame per commit
//! batch, appended in commit order. Nothing is ever rewritten in place; the
//! only mutation besides appending is truncating a torn trailing frame on open.
//!
//! ## Recovery
//!
//! `read_journal` decodes frames until the end of the file. A frame cut short
//! by a crash (`IncompleteEntry`) ends the replay and is reported as
//! `truncated_bytes`; any other decode failure is real corruption and is
//! returned as an error rather than silently skipped.
//!
//! ## Failed appends
//!
//! An append that fails after some of its bytes reached the file is rolled
//! back by truncating to the length before the append, so a later commit
//! reusing the same sequence number never lands behind a half-written frame.
//! If the rollback itself fails the journal is poisoned and refuses every
//! further append.

use crate::encoding::{decode_batch, encode_batch};
use crate::mode::DurabilityMode;
use exemplar_core::{CommitBatch, CommitSink, Error, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Journal file name inside a database directory
pub const JOURNAL_FILE_NAME: &str = "revisions.journal";

/// Result of scanning a journal file
#[derive(Debug, Default)]
pub struct Replay {
    /// Decoded batches in commit order
    pub batches: Vec<CommitBatch>,
    /// Byte length of the valid prefix
    pub valid_len: u64,
    /// Bytes after the valid prefix belonging to a torn frame
    pub truncated_bytes: u64,
}

/// Scan a journal file
///
/// A missing file is an empty journal.
///
/// # Errors
///
/// `Io` on read failure, `Corruption` on a damaged frame that is not the
/// torn tail.
pub fn read_journal(path: &Path) -> Result<Replay> {
    let mut buffer = Vec::new();
    match File::open(path) {
        Ok(mut file) => {
            file.read_to_end(&mut buffer)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Replay::default()),
        Err(e) => return Err(e.into()),
    }

    let mut replay = Replay::default();
    let mut offset = 0usize;
    while offset < buffer.len() {
        match decode_batch(&buffer[offset..], offset as u64) {
            Ok((batch, consumed)) => {
                replay.batches.push(batch);
                offset += consumed;
            }
            Err(Error::IncompleteEntry { .. }) => {
                replay.truncated_bytes = (buffer.len() - offset) as u64;
                break;
            }
            Err(e) => return Err(e),
        }
    }
    replay.valid_len = offset as u64;
    Ok(replay)
}

/// File operations the journal writer relies on
trait JournalFile: Write + Send {
    /// Cut the file to `len` bytes and continue writing there
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;

    fn sync_data(&self) -> io::Result<()>;
}

impl JournalFile for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len))?;
        Ok(())
    }

    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }
}

struct JournalWriter {
    file: Box<dyn JournalFile>,
    /// Length of the file up to the last acknowledged frame
    len: u64,
    pending_syncs: usize,
    /// A failed append could not be rolled back
    poisoned: bool,
}

impl JournalWriter {
    fn write_frame(&mut self, frame: &[u8], mode: DurabilityMode) -> io::Result<()> {
        self.file.write_all(frame)?;
        self.file.flush()?;
        let mut pending = self.pending_syncs + 1;
        if mode.should_sync(pending) {
            self.file.sync_data()?;
            pending = 0;
        }
        self.pending_syncs = pending;
        self.len += frame.len() as u64;
        Ok(())
    }
}

/// Writer half of the journal
///
/// Appends are serialized by an internal mutex; callers are expected to hold
/// the store's commit lock anyway, so the mutex is uncontended.
pub struct Journal {
    path: PathBuf,
    mode: DurabilityMode,
    writer: Mutex<JournalWriter>,
}

impl Journal {
    /// Open (or create) the journal at `path`, returning it with its replay
    ///
    /// A torn trailing frame is truncated away so new frames append after the
    /// last valid one.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for `DurabilityMode::Cache`; I/O and corruption errors
    /// from scanning.
    pub fn open(path: impl Into<PathBuf>, mode: DurabilityMode) -> Result<(Self, Replay)> {
        if !mode.requires_journal() {
            return Err(Error::invalid_input(
                "cache durability mode does not use a journal",
            ));
        }
        let path = path.into();
        let replay = read_journal(&path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        if replay.truncated_bytes > 0 {
            warn!(
                path = %path.display(),
                valid_len = replay.valid_len,
                truncated_bytes = replay.truncated_bytes,
                "Truncating torn journal tail"
            );
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(replay.valid_len))?;

        debug!(
            path = %path.display(),
            batches = replay.batches.len(),
            mode = mode.description(),
            "Opened journal"
        );

        Ok((
            Self {
                path,
                mode,
                writer: Mutex::new(JournalWriter {
                    file: Box::new(file),
                    len: replay.valid_len,
                    pending_syncs: 0,
                    poisoned: false,
                }),
            },
            replay,
        ))
    }

    /// Path of the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durability mode in effect
    pub fn mode(&self) -> DurabilityMode {
        self.mode
    }

    /// Append one commit batch
    ///
    /// The frame is always handed to the OS; fsync follows the durability
    /// mode. On failure the file is truncated back to where it was, so the
    /// journal holds exactly the acknowledged frames.
    ///
    /// # Errors
    ///
    /// Serialization or I/O failure, or `Io` on a poisoned journal. The batch
    /// must not be applied in memory when this fails.
    pub fn append(&self, batch: &CommitBatch) -> Result<()> {
        let frame = encode_batch(batch)?;
        let mut writer = self.writer.lock();
        if writer.poisoned {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "journal is poisoned by an append that could not be rolled back",
            )));
        }

        let Err(e) = writer.write_frame(&frame, self.mode) else {
            return Ok(());
        };
        let len = writer.len;
        match writer.file.truncate_to(len) {
            Ok(()) => warn!(
                path = %self.path.display(),
                seq = batch.seq,
                error = %e,
                "Rolled back failed journal append"
            ),
            Err(rollback) => {
                writer.poisoned = true;
                error!(
                    path = %self.path.display(),
                    seq = batch.seq,
                    error = %e,
                    rollback_error = %rollback,
                    "Journal append failed and could not be rolled back"
                );
            }
        }
        Err(e.into())
    }

    /// Force buffered frames to disk
    ///
    /// # Errors
    ///
    /// I/O failure.
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.file.flush()?;
        writer.file.sync_data()?;
        writer.pending_syncs = 0;
        Ok(())
    }
}

impl CommitSink for Journal {
    fn persist(&self, batch: &CommitBatch) -> Result<()> {
        self.append(batch)
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            warn!(path = %self.path.display(), error = %e, "Journal sync on close failed");
        }
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exemplar_core::{Collection, CollectionId, LogRecord, Timestamp};
    use exemplar_storage::RevisionStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Switches for making the next writes, syncs or truncations fail
    #[derive(Default)]
    struct Faults {
        /// Bytes still accepted before writes fail; `usize::MAX` is unlimited
        write_budget: AtomicUsize,
        fail_sync: AtomicBool,
        fail_truncate: AtomicBool,
    }

    impl Faults {
        fn healthy() -> Arc<Self> {
            let faults = Faults::default();
            faults.write_budget.store(usize::MAX, Ordering::SeqCst);
            Arc::new(faults)
        }
    }

    /// Real file that writes a prefix and then errors, like a full disk
    struct FaultyFile {
        inner: File,
        faults: Arc<Faults>,
    }

    impl Write for FaultyFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let budget = self.faults.write_budget.load(Ordering::SeqCst);
            if budget == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "file too large"));
            }
            let n = buf.len().min(budget);
            let written = self.inner.write(&buf[..n])?;
            if budget != usize::MAX {
                self.faults
                    .write_budget
                    .store(budget - written, Ordering::SeqCst);
            }
            Ok(written)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl JournalFile for FaultyFile {
        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            if self.faults.fail_truncate.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "read-only filesystem"));
            }
            self.inner.truncate_to(len)
        }

        fn sync_data(&self) -> io::Result<()> {
            if self.faults.fail_sync.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "fsync failed"));
            }
            JournalFile::sync_data(&self.inner)
        }
    }

    fn faulty_journal(path: &Path, mode: DurabilityMode, faults: &Arc<Faults>) -> Journal {
        let (journal, _) = Journal::open(path, mode).unwrap();
        let mut inner = OpenOptions::new().write(true).open(path).unwrap();
        inner.seek(SeekFrom::End(0)).unwrap();
        journal.writer.lock().file = Box::new(FaultyFile {
            inner,
            faults: Arc::clone(faults),
        });
        journal
    }

    fn collection_record(store: &RevisionStore, name: &str) -> LogRecord {
        LogRecord::CollectionCreated(Collection {
            id: store.allocate_collection_id(),
            name: name.into(),
            description: None,
            metadata: json!({}),
            created_at: Timestamp::from_secs(1),
        })
    }

    fn batch(seq: u64) -> CommitBatch {
        CommitBatch {
            seq,
            records: vec![LogRecord::CollectionCreated(Collection {
                id: CollectionId::new(seq),
                name: format!("collection {}", seq),
                description: None,
                metadata: json!({}),
                created_at: Timestamp::from_secs(seq),
            })],
        }
    }

    #[test]
    fn test_missing_file_is_empty_journal() {
        let dir = TempDir::new().unwrap();
        let replay = read_journal(&dir.path().join(JOURNAL_FILE_NAME)).unwrap();
        assert!(replay.batches.is_empty());
        assert_eq!(replay.valid_len, 0);
    }

    #[test]
    fn test_append_then_reopen_replays_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(JOURNAL_FILE_NAME);
        {
            let (journal, replay) = Journal::open(&path, DurabilityMode::Always).unwrap();
            assert!(replay.batches.is_empty());
            journal.append(&batch(1)).unwrap();
            journal.append(&batch(2)).unwrap();
        }
        let (_journal, replay) = Journal::open(&path, DurabilityMode::Always).unwrap();
        let seqs: Vec<u64> = replay.batches.iter().map(|b| b.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(replay.truncated_bytes, 0);
    }

    #[test]
    fn test_torn_tail_is_truncated_and_appends_continue() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(JOURNAL_FILE_NAME);
        {
            let (journal, _) = Journal::open(&path, DurabilityMode::Always).unwrap();
            journal.append(&batch(1)).unwrap();
        }
        // Simulate a crash halfway through the second frame
        let frame = encode_batch(&batch(2)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&frame[..frame.len() / 2]).unwrap();
        }

        {
            let (journal, replay) = Journal::open(&path, DurabilityMode::Always).unwrap();
            assert_eq!(replay.batches.len(), 1);
            assert_eq!(replay.truncated_bytes as usize, frame.len() / 2);
            journal.append(&batch(3)).unwrap();
        }

        let replay = read_journal(&path).unwrap();
        let seqs: Vec<u64> = replay.batches.iter().map(|b| b.seq).collect();
        assert_eq!(seqs, vec![1, 3]);
    }

    #[test]
    fn test_corruption_in_middle_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(JOURNAL_FILE_NAME);
        {
            let (journal, _) = Journal::open(&path, DurabilityMode::Always).unwrap();
            journal.append(&batch(1)).unwrap();
            journal.append(&batch(2)).unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[8] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let err = read_journal(&path).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }

    #[test]
    fn test_cache_mode_has_no_journal() {
        let dir = TempDir::new().unwrap();
        let err = Journal::open(dir.path().join(JOURNAL_FILE_NAME), DurabilityMode::Cache)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn test_partial_write_is_rolled_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(JOURNAL_FILE_NAME);
        let faults = Faults::healthy();
        {
            let journal = faulty_journal(&path, DurabilityMode::Always, &faults);
            journal.append(&batch(1)).unwrap();

            faults.write_budget.store(7, Ordering::SeqCst);
            let err = journal.append(&batch(2)).unwrap_err();
            assert!(matches!(err, Error::Io(_)));

            // The commit is retried under the same sequence number
            faults.write_budget.store(usize::MAX, Ordering::SeqCst);
            journal.append(&batch(2)).unwrap();
        }

        let replay = read_journal(&path).unwrap();
        let seqs: Vec<u64> = replay.batches.iter().map(|b| b.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(replay.truncated_bytes, 0);
    }

    #[test]
    fn test_failed_sync_is_rolled_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(JOURNAL_FILE_NAME);
        let faults = Faults::healthy();
        let journal = faulty_journal(&path, DurabilityMode::Always, &faults);
        journal.append(&batch(1)).unwrap();

        faults.fail_sync.store(true, Ordering::SeqCst);
        assert!(journal.append(&batch(2)).is_err());
        faults.fail_sync.store(false, Ordering::SeqCst);

        let replay = read_journal(&path).unwrap();
        assert_eq!(replay.batches.len(), 1);
        assert_eq!(replay.truncated_bytes, 0);

        journal.append(&batch(2)).unwrap();
        assert_eq!(read_journal(&path).unwrap().batches.len(), 2);
    }

    #[test]
    fn test_failed_rollback_poisons_journal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(JOURNAL_FILE_NAME);
        let faults = Faults::healthy();
        let journal = faulty_journal(&path, DurabilityMode::Always, &faults);
        journal.append(&batch(1)).unwrap();

        faults.write_budget.store(5, Ordering::SeqCst);
        faults.fail_truncate.store(true, Ordering::SeqCst);
        assert!(journal.append(&batch(2)).is_err());

        // Even with the disk healthy again nothing more is written
        faults.write_budget.store(usize::MAX, Ordering::SeqCst);
        faults.fail_truncate.store(false, Ordering::SeqCst);
        let err = journal.append(&batch(2)).unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        // What is on disk is the acknowledged frame plus a torn tail
        let replay = read_journal(&path).unwrap();
        assert_eq!(replay.batches.len(), 1);
        assert_eq!(replay.truncated_bytes, 5);
    }

    #[test]
    fn test_store_recovers_after_failed_commit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(JOURNAL_FILE_NAME);
        let faults = Faults::healthy();
        {
            let journal = Arc::new(faulty_journal(&path, DurabilityMode::Always, &faults));
            let store = RevisionStore::with_sink(journal);
            store.commit(vec![collection_record(&store, "kept")]).unwrap();

            faults.write_budget.store(10, Ordering::SeqCst);
            let err = store
                .commit(vec![collection_record(&store, "lost")])
                .unwrap_err();
            assert!(matches!(err, Error::Io(_)));
            assert_eq!(store.watermark(), 1);

            faults.write_budget.store(usize::MAX, Ordering::SeqCst);
            store.commit(vec![collection_record(&store, "after")]).unwrap();
            assert_eq!(store.collection_count(), 2);
        }

        let (_journal, replay) = Journal::open(&path, DurabilityMode::Always).unwrap();
        let store = RevisionStore::new();
        for batch in replay.batches {
            store.replay(batch).unwrap();
        }
        assert_eq!(store.watermark(), 2);
        assert_eq!(store.collection_count(), 2);
    }
}
