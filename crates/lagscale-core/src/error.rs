//! Error types for trigger configuration.

use thiserror::Error;

/// Result type alias for configuration parsing and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors detected while building a scaler from its trigger configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("missing required field: {0}")]
    Missing(&'static str),

    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: i64,
    },

    #[error("{0} and {1} cannot be set simultaneously")]
    Conflict(&'static str, &'static str),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
