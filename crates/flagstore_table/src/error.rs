//! Error types for table operations.

use thiserror::Error;

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Errors that can occur during table operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    /// A conditional put's precondition did not hold.
    #[error("conditional check failed")]
    ConditionalCheckFailed,

    /// The named table does not exist.
    #[error("table not found: {table}")]
    ResourceNotFound {
        /// The requested table.
        table: String,
    },

    /// The request was malformed (empty string attribute, oversized batch, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// The table rejected the request due to throughput limits.
    #[error("throttled: {0}")]
    Throttled(String),

    /// Network or service error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A batch write left some requests unprocessed.
    #[error("{count} batch write requests were not processed")]
    UnprocessedItems {
        /// Number of requests left unprocessed.
        count: usize,
    },

    /// The client is closed.
    #[error("table client is closed")]
    Closed,
}

impl TableError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if a caller-side retry policy may retry this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            TableError::Transport { retryable, .. } => *retryable,
            TableError::Throttled(_) => true,
            TableError::UnprocessedItems { .. } => true,
            _ => false,
        }
    }
}
