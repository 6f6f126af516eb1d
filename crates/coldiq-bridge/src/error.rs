//! Error types for the ColdIQ bridge

use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// A required field could not be located inside a composition surface
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryFailure {
    #[error("compose toolbar not found")]
    MissingToolbar,

    #[error("message body field not found")]
    MissingBody,

    #[error("subject field not found")]
    MissingSubject,
}

/// Errors recovered locally by the bridge (never surfaced into the host page)
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Discovery failure: {0}")]
    Discovery(#[from] DiscoveryFailure),

    #[error("Please write some email content first.")]
    EmptyBody,

    #[error("No analysis result to act on")]
    NoResult,

    #[error("No control injected for this surface")]
    NoControl,

    #[error("Clipboard error: {0}")]
    Clipboard(String),
}

impl From<arboard::Error> for BridgeError {
    fn from(err: arboard::Error) -> Self {
        BridgeError::Clipboard(err.to_string())
    }
}
