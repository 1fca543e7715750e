//! Durability layer for exemplar
//!
//! This crate persists the revision log as an append-only journal:
//! - Frame encoding with CRC32 checksums (`encoding`)
//! - Journal writer and replay scanner (`journal`)
//! - Durability modes controlling fsync (`mode`)
//!
//! The journal stores `CommitBatch`es exactly as they were committed; the
//! engine replays them through the store's normal commit validation on open.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod journal;
pub mod mode;

pub use encoding::{decode_batch, encode_batch};
pub use journal::{read_journal, Journal, Replay, JOURNAL_FILE_NAME};
pub use mode::DurabilityMode;
