//! Error types for wyrd
//!
//! All failures in this crate are local and synchronous: a failed load or
//! save aborts the current operation and nothing is retried. Load-time
//! structural errors are fatal to startup; a failed write restores the
//! backup taken beforehand (see the `backup` module) and surfaces here.

use thiserror::Error;

/// Main error type for wyrd operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed interval, duration, timestamp, or other bad value.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("no task with id {0}")]
    TaskNotFound(u32),

    #[error("no project named '{0}'")]
    ProjectNotFound(String),

    #[error("unknown group type '{0}'")]
    GroupTypeUnknown(String),

    #[error("no work slot is currently open")]
    NoOpenSlot,

    /// The configured persistence format has no codec implementation.
    #[error("unsupported store format '{0}'")]
    UnsupportedFormat(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Result type alias for wyrd operations
pub type Result<T> = std::result::Result<T, Error>;
