/// Unified error type for pipetopo
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Bootstrap error: {0}")]
    Bootstrap(#[from] crate::error::BootstrapError),

    #[error("Registry error: {0}")]
    Registry(#[from] crate::error::RegistryError),

    #[error("Store error: {0}")]
    Store(#[from] crate::error::StoreError),

    #[error("Render error: {0}")]
    Render(#[from] crate::error::RenderError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using TopologyError
pub type Result<T> = std::result::Result<T, TopologyError>;
