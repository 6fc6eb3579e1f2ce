// src/config.rs

//! Director configuration
//!
//! Loaded from a TOML file with a single `[director]` table:
//!
//! ```toml
//! [director]
//! version = 1
//! strict = false
//! rollback_db = "/var/lib/provisor/rollback.db"
//! unstage_on_failure = true
//! ```
//!
//! Every key is optional. Without `rollback_db` snapshots are kept in memory.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current configuration file version
pub const CONFIG_VERSION: u32 = 1;

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub director: DirectorConfig,
}

/// Settings of a [`crate::Director`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorConfig {
    /// Configuration file version (for forward compatibility)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Never pull optional requirements, even greedy ones
    #[serde(default)]
    pub strict: bool,

    /// SQLite database for the rollback repository
    #[serde(default)]
    pub rollback_db: Option<PathBuf>,

    /// Release staged artifacts when a change fails or is cancelled
    #[serde(default = "default_true")]
    pub unstage_on_failure: bool,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_true() -> bool {
    true
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            strict: false,
            rollback_db: None,
            unstage_on_failure: true,
        }
    }
}

impl DirectorConfig {
    pub fn with_rollback_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.rollback_db = Some(path.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.version != CONFIG_VERSION {
            return Err(Error::Config(format!(
                "unsupported config version {} (expected {})",
                self.version, CONFIG_VERSION
            )));
        }
        if let Some(path) = &self.rollback_db
            && path.as_os_str().is_empty()
        {
            return Err(Error::Config("rollback_db must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Parse a configuration file from disk
pub fn parse_config_file(path: &Path) -> Result<DirectorConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config_string(&content)
}

/// Parse configuration from TOML text
pub fn parse_config_string(content: &str) -> Result<DirectorConfig> {
    let file: ConfigFile = toml::from_str(content)?;
    file.director.validate()?;
    Ok(file.director)
}
