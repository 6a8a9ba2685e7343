//! Scaler error types.

use thiserror::Error;

use lagscale_core::ConfigError;

/// Errors surfaced by scaler adapters and their collaborators.
#[derive(Debug, Error)]
pub enum ScalerError {
    #[error("invalid trigger configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("backend unavailable: {0}")]
    Backend(String),

    #[error("login failed: {0}")]
    Login(String),

    #[error("partition not found: {0}")]
    PartitionNotFound(String),

    #[error("checkpoint store not found: {0}")]
    CheckpointStoreMissing(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("scaler is closed")]
    Closed,
}

pub type ScalerResult<T> = Result<T, ScalerError>;
