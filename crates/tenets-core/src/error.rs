//! Error taxonomy
//!
//! Mirrors spec.md §7: `InputError`, `LLMError`, `StoreError` and
//! cancellation are distinct failure modes with distinct propagation
//! policies. Only `Input` and the initial enumeration failure inside a
//! `StoreError` are meant to abort a caller; everything else is recorded
//! and the scan continues (report-and-continue, not fast-fail).

use thiserror::Error;

/// Top-level error type returned by the public `tenets-core` API.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TenetsError {
    /// Invalid argument from the caller (e.g. merging zero behaviors).
    #[error("invalid input: {0}")]
    Input(String),

    /// Failure of the configured LLM client (network, timeout, protocol).
    ///
    /// Never propagated directly by the Similarity Engine or the LLM-merge
    /// path — both demote this to a fallthrough. Kept as a variant so
    /// collaborators that want the detail (logging, metrics) can see it
    /// before it's discarded.
    #[error("llm client error: {0}")]
    Llm(String),

    /// Failure from the backing `GraphStore`.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The caller's cancellation/deadline handle fired.
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, TenetsError>;

/// Error type for the Graph Store Port and its reference implementations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("node not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("initialization error: {0}")]
    Init(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}
