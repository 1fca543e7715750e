//! Storage layer for exemplar
//!
//! This crate implements the in-memory revision log:
//! - RevisionStore: DashMap sharded by collection, serialized commits
//! - RevisionChain: per-example revision history, newest first
//! - LogSnapshot: watermark-pinned `LogView` implementation
//! - Commit validation: transition rules and version ordering, all-or-nothing
//!
//! # Concurrency
//!
//! - Reads take a snapshot (one atomic load) and never block writers
//! - Commits are serialized by a single lock
//! - Different collections live in different DashMap shards

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod shard;
pub mod snapshot;
pub mod store;
pub mod stored;
mod validate;

pub use chain::RevisionChain;
pub use shard::CollectionShard;
pub use snapshot::LogSnapshot;
pub use store::RevisionStore;
pub use stored::Stored;
