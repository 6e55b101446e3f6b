use approval_types::ApprovalError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StorageError> for ApprovalError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(m) => ApprovalError::Conflict(m),
            // A record vanishing between the engine's read and its write
            // is a lost race, not a missing resource.
            StorageError::NotFound(m) => ApprovalError::Conflict(m),
            other => ApprovalError::Storage(other.to_string()),
        }
    }
}
