/// Configuration for opening an XmlSpace store
use crate::db::DEFAULT_BUSY_TIMEOUT_MS;
use crate::utils::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound accepted for `max_depth`
const MAX_SUPPORTED_DEPTH: usize = 100_000;

pub const ENV_DATABASE_PATH: &str = "XMLSPACE_DB";
pub const ENV_BUSY_TIMEOUT_MS: &str = "XMLSPACE_BUSY_TIMEOUT_MS";
pub const ENV_MAX_DEPTH: &str = "XMLSPACE_MAX_DEPTH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct XmlSpaceConfig {
    /// Database file; `None` means `~/.xmlspace/database/xmlspace.db`
    pub database_path: Option<PathBuf>,

    /// How long a connection waits on a locked database, in milliseconds
    pub busy_timeout_ms: u64,

    /// Deepest element nesting accepted by `store` and `insert`
    pub max_depth: usize,
}

impl Default for XmlSpaceConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl XmlSpaceConfig {
    /// Configuration for an explicit database file, defaults elsewhere
    pub fn with_database_path(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Defaults overridden by `XMLSPACE_DB`, `XMLSPACE_BUSY_TIMEOUT_MS` and
    /// `XMLSPACE_MAX_DEPTH` when set
    pub fn from_env() -> Result<Self, String> {
        Self::default().apply_overrides(|key| std::env::var(key).ok())
    }

    /// Read a JSON configuration file; missing keys take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read config file {}: {}", path.display(), e))?;
        serde_json::from_str(&raw)
            .map_err(|e| format!("Invalid config file {}: {}", path.display(), e))
    }

    /// Apply variables looked up through `lookup` on top of `self`
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|v| !v.is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }

        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            self.busy_timeout_ms = raw
                .trim()
                .parse()
                .map_err(|_| format!("{} must be an integer, got '{}'", ENV_BUSY_TIMEOUT_MS, raw))?;
        }

        if let Some(raw) = lookup(ENV_MAX_DEPTH) {
            self.max_depth = raw
                .trim()
                .parse()
                .map_err(|_| format!("{} must be an integer, got '{}'", ENV_MAX_DEPTH, raw))?;
        }

        Ok(self)
    }

    /// Get the database path, defaulting to ~/.xmlspace/database/xmlspace.db
    ///
    /// Follows the same centralized data directory pattern on every platform:
    /// - macOS/Linux: ~/.xmlspace/database/xmlspace.db
    /// - Windows: %USERPROFILE%\.xmlspace\database\xmlspace.db
    pub fn resolve_database_path(&self) -> Result<PathBuf, std::io::Error> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }

        let home_dir = dirs::home_dir().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Cannot determine home directory",
            )
        })?;

        Ok(home_dir
            .join(".xmlspace")
            .join("database")
            .join("xmlspace.db"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err("database_path cannot be empty".to_string());
            }
        }

        if self.max_depth == 0 {
            return Err("max_depth must be greater than 0".to_string());
        }

        if self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(format!(
                "max_depth cannot exceed {}",
                MAX_SUPPORTED_DEPTH
            ));
        }

        Ok(())
    }
}
