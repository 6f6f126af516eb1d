//! Error types for the ColdIQ core library

use thiserror::Error;

use crate::client::ApiError;

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by storage, configuration and the analysis API
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Token store error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Stored value is not valid UTF-8 (key {0})")]
    Encoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
