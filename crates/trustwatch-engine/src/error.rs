//! Error types for the engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that refuse a scan or a serve-mode start.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration is invalid; the process refuses to start.
    #[error("config error: {0}")]
    Config(String),

    /// Config file read failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file parse failed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Metrics registry setup failed.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Serve-mode HTTP server failed.
    #[error("serve error: {0}")]
    Serve(String),
}
