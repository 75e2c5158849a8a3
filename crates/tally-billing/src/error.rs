//! Error types for billing jobs.

/// Result type for billing job operations.
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors surfaced by a billing job to its scheduler.
///
/// Per-subscriber failures during periodic billing are logged and
/// skipped rather than surfaced; only failures that abort a whole job
/// reach the caller, and the caller's recourse is to retry on the next
/// scheduled run.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// A store, engine, or collaborator failure, wrapping the cause.
    #[error("server error: {0}")]
    Server(String),
}

impl From<tally_core::LedgerError> for JobError {
    fn from(err: tally_core::LedgerError) -> Self {
        Self::Server(err.to_string())
    }
}

impl From<tally_store::StoreError> for JobError {
    fn from(err: tally_store::StoreError) -> Self {
        Self::Server(err.to_string())
    }
}
