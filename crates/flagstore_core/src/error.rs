//! Error types for flagstore core.

use crate::init::InitPhase;
use flagstore_table::TableError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
///
/// Superseded upserts and oversized items are outcomes, not errors; see
/// [`crate::UpsertOutcome`] and [`crate::InitSummary`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The table client failed. Passed through unchanged.
    #[error("table error: {0}")]
    Table(#[from] TableError),

    /// A stored item is missing a required attribute or holds a malformed one.
    #[error("corrupt item {namespace}/{key}: {reason}")]
    DataIntegrity {
        /// Partition value of the item.
        namespace: String,
        /// Sort value of the item.
        key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A live item's payload equals the tombstone sentinel.
    #[error("payload of {namespace}/{key} collides with the deleted-item placeholder")]
    ReservedPayload {
        /// Partition value of the item.
        namespace: String,
        /// Sort value of the item.
        key: String,
    },

    /// An init plan was driven out of order.
    #[error("invalid init phase transition from {from:?} to {to:?}")]
    InvalidInitPhase {
        /// Current phase.
        from: InitPhase,
        /// Attempted phase.
        to: InitPhase,
    },

    /// The store has been closed.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Creates a data integrity error.
    pub fn data_integrity(
        namespace: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::DataIntegrity {
            namespace: namespace.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if a caller-side retry policy may retry this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Table(err) => err.is_retryable(),
            _ => false,
        }
    }
}
