/// Diagram rendering error types
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Node id '{id}' is shared by '{first}' and '{second}'")]
    IdentifierCollision {
        id: String,
        first: String,
        second: String,
    },
}

/// Result type alias for render operations
pub type RenderResult<T> = Result<T, RenderError>;
