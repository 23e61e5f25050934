//! Error types for threadscan
//!
//! Lookup failures (a listed thread or message vanished from the store) are
//! recoverable and meant to be shown to the user. Store-connection failures end
//! a single collection run; they never take down the process.

use thiserror::Error;

/// Result type alias for threadscan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for threadscan
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Lookup Errors
    // ==========================================================================
    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    // ==========================================================================
    // Validation Errors
    // ==========================================================================
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid thread record {id}: {matched} matched messages exceeds {total} total")]
    InvalidRecord {
        id: String,
        matched: usize,
        total: usize,
    },

    // ==========================================================================
    // Store / Collection Errors
    // ==========================================================================
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Collector error: {0}")]
    Collector(String),

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ==========================================================================
    // Internal Errors
    // ==========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error type string (for structured output)
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::ThreadNotFound(_) => "THREAD_NOT_FOUND",
            Self::MessageNotFound(_) => "MESSAGE_NOT_FOUND",
            Self::InvalidQuery(_) => "INVALID_QUERY",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::InvalidRecord { .. } => "INVALID_RECORD",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Collector(_) => "COLLECTOR_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error should be reported to the user as a message and the
    /// current view kept alive.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ThreadNotFound(_)
                | Self::MessageNotFound(_)
                | Self::InvalidQuery(_)
                | Self::StoreUnavailable(_)
        )
    }
}
