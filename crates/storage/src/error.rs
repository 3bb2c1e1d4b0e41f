use legalrag_core::Error as CoreError;
use thiserror::Error;

/// Result alias for backend transport operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage-specific error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Backend rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Collection already exists: {0}")]
    AlreadyExists(String),

    #[error("Backend returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Backend connection is closed")]
    Closed,
}

impl StorageError {
    /// Whether the failure happened before the backend could answer
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::Timeout(_) | Self::Closed
        )
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            Self::SerializationError(err.to_string())
        } else {
            Self::BackendError(err.to_string())
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidConfig(msg) => CoreError::config(msg),
            other if other.is_transport() => CoreError::connectivity(other.to_string()),
            other => CoreError::schema(other.to_string()),
        }
    }
}
