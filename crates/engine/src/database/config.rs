//! Database configuration via `exemplar.toml`
//!
//! On first open, a default `exemplar.toml` is created in the data directory.
//! To change settings, edit the file and reopen.

use std::io;
use std::path::Path;

use exemplar_core::{Error, Result};
use exemplar_durability::DurabilityMode;
use serde::{Deserialize, Serialize};

use crate::pagination::DEFAULT_MAX_PAGE_SIZE;

/// Config file name placed in the database data directory.
pub const CONFIG_FILE_NAME: &str = "exemplar.toml";

/// Page size used when a request does not name one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Database configuration loaded from `exemplar.toml`.
///
/// # Example
///
/// ```toml
/// durability = "standard"
/// default_page_size = 50
/// max_page_size = 1000
/// sync_batch_size = 64
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Durability mode: `"standard"` or `"always"`.
    #[serde(default = "default_durability_str")]
    pub durability: String,
    /// Page size when the caller does not specify one.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    /// Largest page a caller may request.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    /// Commits between fsyncs in standard mode.
    #[serde(default = "default_sync_batch_size")]
    pub sync_batch_size: usize,
}

fn default_durability_str() -> String {
    "standard".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> usize {
    DEFAULT_MAX_PAGE_SIZE
}

fn default_sync_batch_size() -> usize {
    DurabilityMode::DEFAULT_BATCH_SIZE
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            durability: default_durability_str(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            sync_batch_size: default_sync_batch_size(),
        }
    }
}

impl DatabaseConfig {
    /// Parse the durability string into a `DurabilityMode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"standard"` or `"always"`.
    pub fn durability_mode(&self) -> Result<DurabilityMode> {
        match self.durability.as_str() {
            "standard" => Ok(DurabilityMode::Standard {
                batch_size: self.sync_batch_size.max(1),
            }),
            "always" => Ok(DurabilityMode::Always),
            other => Err(Error::invalid_input(format!(
                "Invalid durability mode '{}' in {}. Expected \"standard\" or \"always\".",
                other, CONFIG_FILE_NAME
            ))),
        }
    }

    /// Check every field.
    ///
    /// # Errors
    ///
    /// `InvalidInput` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        self.durability_mode()?;
        if self.max_page_size == 0 {
            return Err(Error::invalid_input("max_page_size must be at least 1"));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(Error::invalid_input(format!(
                "default_page_size must be between 1 and max_page_size ({}), got {}",
                self.max_page_size, self.default_page_size
            )));
        }
        if self.sync_batch_size == 0 {
            return Err(Error::invalid_input("sync_batch_size must be at least 1"));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Exemplar database configuration
#
# Durability mode: "standard" (default) or "always"
#   "standard" = fsync every sync_batch_size commits, may lose the last batch on crash
#   "always"   = fsync every commit, zero data loss
durability = "standard"

# Commits between fsyncs in standard mode (default: 64)
sync_batch_size = 64

# Page size used when a request does not specify one (default: 50)
default_page_size = 50

# Largest page a request may ask for (default: 1000)
max_page_size = 1000
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: DatabaseConfig = toml::from_str(&content).map_err(|e| {
            Error::invalid_input(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
