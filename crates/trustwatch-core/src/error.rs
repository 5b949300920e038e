//! Error types shared by snapshot producers and consumers.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while reading or writing snapshot documents.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Baseline/snapshot file read or write failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot JSON could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document parsed but held neither a snapshot nor an envelope.
    #[error("baseline error: {0}")]
    Baseline(String),
}
