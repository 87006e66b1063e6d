/// Pipeline registry error types
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No active pipeline")]
    NoActivePipeline,
    #[error("Unknown pipeline: {0}")]
    UnknownPipeline(String),
    #[error("Invalid service: {0}")]
    InvalidService(String),
}

impl RegistryError {
    /// Create a new UnknownPipeline error
    pub fn unknown_pipeline(name: impl Into<String>) -> Self {
        Self::UnknownPipeline(name.into())
    }

    /// Create a new InvalidService error
    pub fn invalid_service(msg: impl Into<String>) -> Self {
        Self::InvalidService(msg.into())
    }
}

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
