//! Error types for index coordination and the backend variants
//!
//! The taxonomy separates fatal conditions (corrupt storage, misconfigured
//! backend, startup timeout) from transient backend outages and from
//! per-record failures that are logged and dropped.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for indexing operations
pub type IndexResult<T> = Result<T, IndexerError>;

/// Error types for indexing operations
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Index storage unreadable at init; cannot be repaired automatically
    #[error("index storage corrupt or unreadable: {0}")]
    Corrupted(String),

    /// Backend kind string did not match any known variant
    #[error("unknown index backend kind: {0:?}")]
    UnknownBackend(String),

    /// Backend did not come up within the configured startup window
    #[error("index initialization timed out after {0:?}")]
    StartupTimeout(Duration),

    /// Backend initialization was cancelled; indexing is permanently off
    #[error("indexing unavailable: backend initialization was cancelled")]
    Unavailable,

    /// Keyword could not be parsed into a backend query
    #[error("invalid search query: {0}")]
    QueryParsing(String),

    /// Search execution failed
    #[error("search execution failed: {0}")]
    SearchExecution(String),

    /// A batch apply was rejected by the backend
    #[error("indexing failed: {0}")]
    IndexingFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tantivy error wrapper
    #[error("tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    /// HTTP transport error talking to an external search service
    #[error("search service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Wire body could not be serialized
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Check whether this error should take the process down.
    ///
    /// Serving traffic with a half-open index is considered worse than
    /// refusing to start, so these conditions are never retried.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IndexerError::Corrupted(_)
                | IndexerError::UnknownBackend(_)
                | IndexerError::StartupTimeout(_)
        )
    }
}
