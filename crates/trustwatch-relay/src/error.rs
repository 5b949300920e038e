//! Error types for the tunnel relay.
//!
//! Relay errors are fatal to the current run: probes routed through a dead
//! tunnel would silently fail-open, so callers short-circuit with cleanup.

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur while managing the relay pod and tunnel.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Pod creation was rejected by the API server.
    #[error("create relay pod in {namespace}: {reason}")]
    PodCreate {
        /// Namespace the pod was created in.
        namespace: String,
        /// API server error.
        reason: String,
    },

    /// The image cannot be pulled; retrying will not help.
    #[error("relay image pull failed ({reason}): {message}")]
    ImagePull {
        /// Container waiting reason (ErrImagePull, ImagePullBackOff, InvalidImageName).
        reason: String,
        /// Kubelet message, when present.
        message: String,
    },

    /// The pod never became ready within the caller's deadline.
    #[error("relay pod {pod} not ready: {reason}")]
    NotReady {
        /// Pod name.
        pod: String,
        /// Last observed status.
        reason: String,
    },

    /// Port-forward setup or the local listener failed.
    #[error("port-forward: {0}")]
    PortForward(String),

    /// The relay was used before `start()` or after `close()`.
    #[error("relay is not running")]
    NotRunning,

    /// `start()` was called twice.
    #[error("relay already started")]
    AlreadyStarted,

    /// Local socket error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
