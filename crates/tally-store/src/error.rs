//! Error types for tally storage.

use tally_core::PayoutId;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Attempted to settle a payout that already reached a terminal
    /// state.
    #[error("payout already settled: {payout_id}")]
    PayoutSettled {
        /// The payout that was already posted or voided.
        payout_id: PayoutId,
    },
}
