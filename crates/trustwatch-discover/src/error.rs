//! Error types for discovery.

use thiserror::Error;

/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoverError>;

/// Errors that can occur while enumerating trust surfaces.
///
/// Discoverer-level failures are recorded per discoverer in the snapshot's
/// error map and never abort a scan.
#[derive(Error, Debug)]
pub enum DiscoverError {
    /// Kubernetes API call failed.
    #[error("kubernetes: {0}")]
    Kube(#[from] kube::Error),

    /// Certificate material in an object could not be parsed.
    #[error("certificate material: {0}")]
    CertMaterial(String),
}
