//! # subledger-config
//!
//! YAML configuration for the Subledger CLI.
//!
//! Settings are resolved in three layers, later layers winning:
//! 1. `~/.subledger/config.yaml` (every field optional)
//! 2. `SUBLEDGER_DB_PATH` / `SUBLEDGER_LOG_DIR` environment variables
//! 3. command-line flags, applied by the binary
//!
//! ```yaml
//! database:
//!   path: /var/lib/subledger/subscriptions.db
//! logging:
//!   dir: /var/log/subledger
//!   verbose: false
//! listing:
//!   default_limit: 50
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use subledger_core::{LedgerError, MAX_LIST_LIMIT};
use thiserror::Error;
use tracing::debug;

/// Environment variable overriding the database path.
pub const ENV_DB_PATH: &str = "SUBLEDGER_DB_PATH";

/// Environment variable overriding the log directory.
pub const ENV_LOG_DIR: &str = "SUBLEDGER_LOG_DIR";

/// Database file name used when no path is configured.
pub const DEFAULT_DB_FILE_NAME: &str = "subscriptions.db";

/// Default config file location (`~/.subledger/config.yaml`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".subledger").join("config.yaml"))
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage settings
    pub database: DatabaseConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Listing settings
    pub listing: ListingConfig,
}

/// Storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; `~/.subledger/subscriptions.db` when unset
    pub path: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rolling JSON logs; `~/.subledger/logs` when unset
    pub dir: Option<PathBuf>,
    /// Enable debug-level output
    pub verbose: bool,
}

/// Listing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Page size used when a listing does not specify one
    pub default_limit: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_limit: MAX_LIST_LIMIT,
        }
    }
}

impl Config {
    /// Load from the default path, falling back to defaults when there is no
    /// home directory or no config file.
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SUBLEDGER_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = non_empty(ENV_DB_PATH) {
            debug!(%path, "Database path overridden from environment");
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(dir) = non_empty(ENV_LOG_DIR) {
            debug!(%dir, "Log directory overridden from environment");
            self.logging.dir = Some(PathBuf::from(dir));
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let limit = self.listing.default_limit;
        if limit == 0 || limit > MAX_LIST_LIMIT {
            return Err(ConfigError::Validation {
                message: format!(
                    "listing.default_limit must be between 1 and {MAX_LIST_LIMIT}, got {limit}"
                ),
            });
        }

        if let Some(path) = &self.database.path
            && path.as_os_str().is_empty()
        {
            return Err(ConfigError::Validation {
                message: "database.path must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Resolved database path.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(subledger_core::logging::data_dir()?.join(DEFAULT_DB_FILE_NAME)),
        }
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file exists but could not be read
    #[error("Failed to read config from {path}: {source}")]
    Read {
        /// Path to config file
        path: PathBuf,
        /// Source error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for this schema
    #[error("Failed to parse config: {message}")]
    Parse {
        /// Error message
        message: String,
    },

    /// Config parsed but holds an unusable value
    #[error("Config validation failed: {message}")]
    Validation {
        /// Validation message
        message: String,
    },

    /// Default locations could not be resolved
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
