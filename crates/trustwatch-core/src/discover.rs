//! Discoverer capability: pluggable enumeration of one trust-surface kind.

use async_trait::async_trait;

use crate::types::CertFinding;

/// Result of one discoverer run.
///
/// Best-effort: findings gathered before a failure are retained alongside
/// the error, and the orchestrator records both.
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    /// Findings in insertion order.
    pub findings: Vec<CertFinding>,
    /// Discoverer-level failure, if any.
    pub error: Option<String>,
}

impl DiscoveryOutcome {
    /// A fully successful run.
    #[must_use]
    pub fn ok(findings: Vec<CertFinding>) -> Self {
        Self {
            findings,
            error: None,
        }
    }

    /// A run that produced nothing but an error.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            findings: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// A run that failed partway through.
    #[must_use]
    pub fn partial(findings: Vec<CertFinding>, error: impl Into<String>) -> Self {
        Self {
            findings,
            error: Some(error.into()),
        }
    }
}

/// A pluggable enumerator of one kind of trust surface.
///
/// The orchestrator launches every registered discoverer concurrently and
/// merges their findings in registration order.
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Stable label for this discoverer; used as the error-map key.
    fn name(&self) -> &str;

    /// Enumerate the trust surfaces this discoverer covers.
    async fn discover(&self) -> DiscoveryOutcome;
}
