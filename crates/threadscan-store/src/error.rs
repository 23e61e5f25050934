//! Store error types

use thiserror::Error;
use threadscan_core::ScanError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is held exclusively (maintenance, compaction); connections
    /// cannot be opened until the lock is released.
    #[error("store is locked: {0}")]
    Locked(String),

    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    #[error("message not found: {0}")]
    MessageNotFound(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("duplicate message id: {0}")]
    DuplicateMessage(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Locked(_) => "STORE_LOCKED",
            Self::ThreadNotFound(_) => "THREAD_NOT_FOUND",
            Self::MessageNotFound(_) => "MESSAGE_NOT_FOUND",
            Self::InvalidQuery(_) => "INVALID_QUERY",
            Self::DuplicateMessage(_) => "DUPLICATE_MESSAGE",
            Self::InvalidMessage(_) => "INVALID_MESSAGE",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether retrying the same call later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Locked(_) | Self::Io(_))
    }
}

impl From<StoreError> for ScanError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Locked(msg) => Self::StoreUnavailable(msg),
            StoreError::ThreadNotFound(id) => Self::ThreadNotFound(id),
            StoreError::MessageNotFound(id) => Self::MessageNotFound(id),
            StoreError::InvalidQuery(msg) => Self::InvalidQuery(msg),
            StoreError::DuplicateMessage(id) => {
                Self::InvalidArgument(format!("duplicate message id: {id}"))
            }
            StoreError::InvalidMessage(msg) => Self::InvalidArgument(msg),
            StoreError::Io(e) => Self::Io(e),
            StoreError::Serialization(e) => Self::Serialization(e),
        }
    }
}
