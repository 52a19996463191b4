//! Error types for Crosslink.
//!
//! Only [`Error::StorageUnavailable`], [`Error::DocumentNotIndexed`] and
//! [`Error::InvalidConfig`] abort an operation. The other variants are
//! reported alongside a successful result so callers can log them.

use thiserror::Error;

use crate::models::RejectReason;

/// Result type alias using Crosslink's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Crosslink operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Markup could not be decoded cleanly; text was extracted best-effort.
    #[error("malformed content in {document_id}: {detail}")]
    MalformedContent { document_id: String, detail: String },

    /// The stored fingerprint changed between read and write.
    #[error("concurrent index write for {document_id}")]
    IndexWriteConflict { document_id: String },

    /// A single candidate link was not committed.
    #[error("candidate {source_id} -> {target_id} rejected: {reason}")]
    CandidateRejected {
        source_id: String,
        target_id: String,
        reason: RejectReason,
    },

    /// Authority iteration hit the iteration cap.
    #[error("authority scores did not converge after {iterations} iterations (max delta {max_delta:e})")]
    ConvergenceNotReached { iterations: usize, max_delta: f64 },

    /// The persistence backend failed; nothing from the operation was committed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The document has no index record.
    #[error("document not indexed: {0}")]
    DocumentNotIndexed(String),

    /// A tuning parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Wrap a backend error as [`Error::StorageUnavailable`].
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::StorageUnavailable(Box::new(err))
    }

    /// Whether the error aborts the current operation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::StorageUnavailable(_)
                | Error::DocumentNotIndexed(_)
                | Error::InvalidConfig(_)
                | Error::IndexWriteConflict { .. }
        )
    }
}
