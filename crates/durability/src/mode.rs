//! Durability mode configuration
//!
//! Controls journal sync behavior (Cache, Standard, Always).

/// Durability mode for journal writes
///
/// | Mode | Journal | fsync | Data Loss Window |
/// |------|---------|-------|------------------|
/// | Cache | none | never | everything |
/// | Standard | yes | every `batch_size` commits | up to `batch_size - 1` commits |
/// | Always | yes | every commit | zero |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// In-memory only; no journal file is written
    Cache,

    /// Write every commit, fsync every `batch_size` commits
    Standard {
        /// Commits between fsyncs
        batch_size: usize,
    },

    /// fsync after every commit
    Always,
}

impl DurabilityMode {
    /// Default commits between fsyncs in standard mode
    pub const DEFAULT_BATCH_SIZE: usize = 64;

    /// Standard mode with the default batch size
    pub const fn standard_default() -> Self {
        DurabilityMode::Standard {
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }

    /// Whether a journal file is written at all
    pub fn requires_journal(&self) -> bool {
        !matches!(self, DurabilityMode::Cache)
    }

    /// Whether the journal must be synced after `pending` unsynced commits
    pub fn should_sync(&self, pending: usize) -> bool {
        match self {
            DurabilityMode::Cache => false,
            DurabilityMode::Always => pending > 0,
            DurabilityMode::Standard { batch_size } => pending >= (*batch_size).max(1),
        }
    }

    /// Human-readable description of the mode
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::Cache => "cache (no journal, all data lost on exit)",
            DurabilityMode::Standard { .. } => "standard (batched fsync)",
            DurabilityMode::Always => "always (fsync every commit)",
        }
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        Self::standard_default()
    }
}
