//! Error types for microinit.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for init operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the init process.
///
/// None of these are allowed to take PID 1 down. Callers either log and
/// discard them or, for the services directory, report them once.
#[derive(Error, Debug)]
pub enum Error {
    /// Not running as PID 1
    #[error("Not running as PID 1 (current PID: {0})")]
    NotPid1(u32),

    /// Mount error
    #[error("Mount error: {fstype} -> {target}: {reason}")]
    Mount {
        target: PathBuf,
        fstype: String,
        reason: String,
    },

    /// Services directory could not be listed
    #[error("Failed to read services directory {path}: {source}")]
    ServicesDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Service failed to start
    #[error("Service failed to start: {name}: {reason}")]
    ServiceStart { name: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reboot request failed
    #[error("Reboot failed: {0}")]
    Reboot(String),

    /// Signal error
    #[error("Signal error: {0}")]
    Signal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Nix error
    #[error("System error: {0}")]
    Nix(#[from] nix::Error),
}
