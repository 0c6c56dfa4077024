//! Error types shared across zkweave crates

use thiserror::Error;

/// Result type alias for zkweave runtime operations
pub type Result<T> = std::result::Result<T, ZkWeaveError>;

#[derive(Debug, Error)]
pub enum ZkWeaveError {
    /// Malformed or inconsistent compiler configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl ZkWeaveError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn serialization_error(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

impl From<serde_json::Error> for ZkWeaveError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
