//! Configuration loading and management
//!
//! Handles parsing of `wyrd.toml` configuration files. The configuration
//! names the data files inside the session's data directory, the store
//! format, and the time representation used on disk.

use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the configuration file inside the data directory
pub const CONFIG_FILE: &str = "wyrd.toml";

/// Persistence formats a session can be asked to use.
///
/// Only XML is implemented; requesting anything else surfaces
/// [`Error::UnsupportedFormat`] at the first load or save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    Xml,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// File holding the newline-delimited project list
    #[serde(default = "default_projects_file")]
    pub projects_file: String,

    /// File holding tasks and groupings
    #[serde(default = "default_tasks_file")]
    pub tasks_file: String,

    /// File holding the work-slot log; equal to `tasks_file` for the
    /// single shared-file layout
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Store format for tasks and work slots
    #[serde(default = "default_format")]
    pub format: String,

    /// strftime pattern used for timestamps in the store
    #[serde(default = "default_time_format")]
    pub time_format: String,

    /// IANA timezone name written as the file-level default
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Suffix appended to a file name to form its backup path
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            projects_file: default_projects_file(),
            tasks_file: default_tasks_file(),
            log_file: default_log_file(),
            format: default_format(),
            time_format: default_time_format(),
            timezone: default_timezone(),
            backup_suffix: default_backup_suffix(),
        }
    }
}

fn default_projects_file() -> String {
    "projects.lst".to_string()
}

fn default_tasks_file() -> String {
    "tasks.xml".to_string()
}

fn default_log_file() -> String {
    // Shared-file layout by default: the log lives next to the tasks.
    "tasks.xml".to_string()
}

fn default_format() -> String {
    "xml".to_string()
}

fn default_time_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_backup_suffix() -> String {
    "~".to_string()
}

impl Config {
    /// Load configuration from a `wyrd.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a data directory, or return defaults when
    /// no configuration file exists there
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The configured store format, or [`Error::UnsupportedFormat`]
    pub fn store_format(&self) -> Result<StoreFormat> {
        match self.format.trim() {
            "xml" => Ok(StoreFormat::Xml),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }

    /// The configured default timezone. Validation guarantees the name
    /// resolves; an unvalidated config falls back to UTC.
    pub fn default_tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(Tz::UTC)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("projects_file", &self.projects_file),
            ("tasks_file", &self.tasks_file),
            ("log_file", &self.log_file),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{field} cannot be empty")));
            }
        }

        if self.backup_suffix.is_empty() {
            return Err(Error::InvalidConfig(
                "backup_suffix cannot be empty".to_string(),
            ));
        }

        if self.timezone.parse::<Tz>().is_err() {
            return Err(Error::InvalidConfig(format!(
                "unknown timezone '{}'",
                self.timezone
            )));
        }

        if self.time_format.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "time_format cannot be empty".to_string(),
            ));
        }
        let mut items = chrono::format::StrftimeItems::new(&self.time_format);
        if items.any(|item| matches!(item, chrono::format::Item::Error)) {
            return Err(Error::InvalidConfig(format!(
                "invalid time_format '{}'",
                self.time_format
            )));
        }

        Ok(())
    }
}
