use std::time::Duration;
/// Distributed key-value store error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Unexpected store status {status} for key '{key}'")]
    Status { status: u16, key: String },
    #[error("Store call for key '{key}' timed out after {after:?}")]
    Timeout { key: String, after: Duration },
    #[error("Failed to decode value of key '{key}': {reason}")]
    Decode { key: String, reason: String },
    #[error("Failed to encode pipeline: {0}")]
    Encode(String),
}

impl StoreError {
    /// Create a new Unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a new Decode error
    pub fn decode(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a new Encode error
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
