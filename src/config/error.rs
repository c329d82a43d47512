//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed as the expected number type.
    #[error("failed to parse {name}='{value}': {reason}")]
    InvalidNumber {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A boolean environment variable held something other than a recognized flag.
    #[error("failed to parse {name}='{value}': expected true/false, 1/0, yes/no or on/off")]
    InvalidBool { name: &'static str, value: String },

    /// A value parsed but violates a configuration invariant.
    #[error("invalid {name} ({value}): must be {expected}")]
    OutOfRange {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    /// Path exists but is not a directory (when a directory was expected).
    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}
