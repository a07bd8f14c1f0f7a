//! Deck configuration.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! a JSON file (`savedeck.json` in the working directory unless a path is
//! given), and the `SAVEDECK_ROOT` environment variable.
//!
//! ```
//! use savedeck_core::config::{validate_config, DeckConfig};
//!
//! let config = DeckConfig::from_json_str(r#"{"save_root": "/games/saves", "max_backups": 3}"#).unwrap();
//! assert!(config.backups);
//! assert!(validate_config(&config).is_empty());
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{io_at, Result, SaveError};
use crate::meta_file::MetaStyle;

pub const CONFIG_FILE_NAME: &str = "savedeck.json";
pub const ROOT_ENV: &str = "SAVEDECK_ROOT";

/// Name of the backup directory inside the save root when none is configured.
pub const DEFAULT_BACKUP_DIR: &str = ".savedeck-backups";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    /// Directory holding one subdirectory per save slot.
    pub save_root: PathBuf,
    /// Snapshot a slot before every overwrite.
    pub backups: bool,
    /// Where snapshots go (None = hidden directory inside the save root).
    pub backup_dir: Option<PathBuf>,
    /// Snapshots kept per slot; older ones are pruned.
    pub max_backups: usize,
    pub meta_style: MetaStyle,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            save_root: PathBuf::from("."),
            backups: true,
            backup_dir: None,
            max_backups: 10,
            meta_style: MetaStyle::Compact,
        }
    }
}

impl DeckConfig {
    /// Load configuration from `path`, or from `savedeck.json` if it exists,
    /// then apply environment overrides.
    ///
    /// An explicitly given path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(CONFIG_FILE_NAME), false),
        };

        let mut config = match fs::read_to_string(&path) {
            Ok(text) => {
                log::debug!("Loading config from {}", path.display());
                Self::from_json_str(&text).map_err(|source| SaveError::Config {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => Self::default(),
            Err(e) => return Err(io_at(&path)(e)),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup(ROOT_ENV).filter(|r| !r.trim().is_empty()) {
            log::debug!("{ROOT_ENV} overrides save root with {root}");
            self.save_root = PathBuf::from(root);
        }
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.save_root.join(DEFAULT_BACKUP_DIR))
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("save_root is empty")]
    EmptySaveRoot,
    #[error("backups are enabled but max_backups is 0")]
    ZeroMaxBackups,
    #[error("backup_dir must not be the save root itself")]
    BackupDirIsSaveRoot,
}

/// Validate a configuration. Returns all errors found (empty = valid).
pub fn validate_config(config: &DeckConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if config.save_root.as_os_str().is_empty() {
        errors.push(ConfigError::EmptySaveRoot);
    }
    if config.backups && config.max_backups == 0 {
        errors.push(ConfigError::ZeroMaxBackups);
    }
    if config.backup_dir.as_deref() == Some(config.save_root.as_path()) {
        errors.push(ConfigError::BackupDirIsSaveRoot);
    }

    errors
}
