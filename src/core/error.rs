//! Centralized error types for the payout pipeline

use thiserror::Error;

/// Main pipeline error type
#[derive(Error, Debug)]
pub enum PayoutError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("export error: {0}")]
    Export(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised by the on-chain data collaborators.
///
/// These are fatal for the partner whose pipeline triggered them, but the
/// orchestrator isolates them so sibling partners keep processing.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("batch result count mismatch: expected {expected}, got {got}")]
    BatchShape { expected: usize, got: usize },
}

/// Result type alias for pipeline operations
pub type PayoutResult<T> = Result<T, PayoutError>;

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::MalformedResponse(err.to_string())
    }
}
