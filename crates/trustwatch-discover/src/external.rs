//! External endpoint discovery.
//!
//! Targets come from config and from TrustPolicy targets of kind
//! `External`; every URL is probed directly.

use std::sync::Arc;

use async_trait::async_trait;

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, Prober, SourceKind};

use crate::util::probe_all;

/// Probes a fixed list of external URLs.
pub struct ExternalDiscoverer {
    targets: Vec<String>,
    prober: Arc<dyn Prober>,
}

impl ExternalDiscoverer {
    /// Construct from config targets plus policy-provided ones.
    #[must_use]
    pub fn new(targets: Vec<String>, prober: Arc<dyn Prober>) -> Self {
        Self { targets, prober }
    }
}

#[async_trait]
impl Discoverer for ExternalDiscoverer {
    fn name(&self) -> &str {
        "external"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        let pending: Vec<CertFinding> = self
            .targets
            .iter()
            .map(|t| external_finding(t))
            .collect();
        DiscoveryOutcome::ok(probe_all(Arc::clone(&self.prober), pending).await)
    }
}

/// Name the finding after the URL's host where possible.
#[must_use]
pub fn external_finding(target: &str) -> CertFinding {
    let name = url::Url::parse(target)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_else(|| target.to_string());
    let mut f = CertFinding::new(SourceKind::External, name);
    f.target = Some(target.to_string());
    f
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn findings_are_named_by_host() {
        let f = external_finding("https://vault.example.com:8200");
        assert_eq!(f.name, "vault.example.com");
        assert_eq!(f.target.as_deref(), Some("https://vault.example.com:8200"));

        let raw = external_finding("tcp://db.internal:5432?sni=db.example.com");
        assert_eq!(raw.name, "db.internal");
    }
}
