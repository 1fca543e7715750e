//! Database builder for fluent configuration
//!
//! Provides a builder pattern for opening databases with a durability mode
//! or config other than what `exemplar.toml` says.

use std::path::PathBuf;
use std::sync::Arc;

use exemplar_core::{Error, Result};
use exemplar_durability::DurabilityMode;

use super::config::DatabaseConfig;
use super::Database;

/// Builder for Database configuration
///
/// # Three Ways to Open a Database
///
/// ```ignore
/// use exemplar_engine::Database;
///
/// // 1. Simple open, settings from exemplar.toml
/// let db = Database::open("/data/mydb")?;
///
/// // 2. Builder for custom durability
/// let db = Database::builder()
///     .path("/data/mydb")
///     .always()  // or .standard() or .cache()
///     .open()?;
///
/// // 3. Ephemeral (no files, testing)
/// let db = Database::ephemeral();
/// ```
#[derive(Debug, Clone, Default)]
pub struct DatabaseBuilder {
    /// Database path (required for open())
    path: Option<PathBuf>,
    /// Overrides the mode derived from the config
    durability: Option<DurabilityMode>,
    /// Overrides `exemplar.toml`
    config: Option<DatabaseConfig>,
}

impl DatabaseBuilder {
    /// Create new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set database path
    ///
    /// Required for `open()`. Use `Database::ephemeral()` for no-file testing.
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Use an explicit config instead of the one on disk
    ///
    /// The config is written to `exemplar.toml` so later plain opens keep it.
    pub fn config(mut self, config: DatabaseConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// No journal writes; an existing journal is still replayed on open
    ///
    /// Everything committed through this instance is lost when it closes.
    pub fn cache(mut self) -> Self {
        self.durability = Some(DurabilityMode::Cache);
        self
    }

    /// Journal every commit, fsync in batches
    pub fn standard(mut self) -> Self {
        self.durability = Some(DurabilityMode::standard_default());
        self
    }

    /// Journal and fsync every commit
    pub fn always(mut self) -> Self {
        self.durability = Some(DurabilityMode::Always);
        self
    }

    /// Open the database
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No path was configured (use `.path()` or `Database::ephemeral()`)
    /// - The config is invalid
    /// - Directory creation, journal opening, or replay fails
    pub fn open(self) -> Result<Arc<Database>> {
        let path = self.path.ok_or_else(|| {
            Error::invalid_input(
                "DatabaseBuilder::open() requires a path. Use Database::ephemeral() for testing.",
            )
        })?;

        let config = match self.config {
            Some(config) => {
                config.validate()?;
                std::fs::create_dir_all(&path)?;
                config.write_to_file(&path.join(super::config::CONFIG_FILE_NAME))?;
                config
            }
            None => Database::load_config(&path)?,
        };
        let mode = match self.durability {
            Some(DurabilityMode::Standard { .. }) => DurabilityMode::Standard {
                batch_size: config.sync_batch_size,
            },
            Some(mode) => mode,
            None => config.durability_mode()?,
        };
        Database::open_with_mode_and_config(path, mode, config)
    }
}
