use thiserror::Error;

/// Errors raised by agent clients
#[derive(Debug, Error)]
pub enum ClientError {
    /// The agent has no container with this id
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// The agent could not be reached
    #[error("Agent unreachable: {0}")]
    Unreachable(String),

    /// The agent answered with an unexpected status
    #[error("Agent responded with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The agent sent a payload that could not be decoded
    #[error("Malformed agent response: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether the error means the requested container does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::ContainerNotFound(_))
    }
}

/// Result type alias for agent client operations
pub type ClientResult<T> = Result<T, ClientError>;
