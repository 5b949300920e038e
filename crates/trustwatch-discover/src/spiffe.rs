//! SPIFFE trust-bundle discovery.
//!
//! The SPIRE server publishes its trust bundle to the `spire-bundle`
//! ConfigMap; operators can also point at a bundle file directly. Either
//! way the bundle is a PEM set of trust anchors, one finding per root.

use std::path::PathBuf;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::Api;
use kube::Client;

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, SourceKind};

/// Namespace SPIRE conventionally installs into.
const DEFAULT_SPIRE_NAMESPACE: &str = "spire";
/// ConfigMap the SPIRE server publishes the bundle to.
const BUNDLE_CONFIGMAP: &str = "spire-bundle";
/// Key holding the PEM bundle.
const BUNDLE_KEY: &str = "bundle.crt";

/// Discovers SPIFFE trust-bundle roots.
pub struct SpiffeDiscoverer {
    client: Client,
    namespace: String,
    bundle_path: Option<PathBuf>,
}

impl SpiffeDiscoverer {
    /// Construct; `bundle_path` short-circuits the in-cluster lookup.
    #[must_use]
    pub fn new(client: Client, namespace: Option<String>, bundle_path: Option<PathBuf>) -> Self {
        Self {
            client,
            namespace: namespace.unwrap_or_else(|| DEFAULT_SPIRE_NAMESPACE.to_string()),
            bundle_path,
        }
    }
}

#[async_trait]
impl Discoverer for SpiffeDiscoverer {
    fn name(&self) -> &str {
        "spiffe"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        let pem_bytes = if let Some(path) = &self.bundle_path {
            match tokio::fs::read(path).await {
                Ok(b) => b,
                Err(e) => {
                    return DiscoveryOutcome::fail(format!(
                        "read bundle {}: {e}",
                        path.display()
                    ))
                }
            }
        } else {
            let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.namespace);
            match api.get_opt(BUNDLE_CONFIGMAP).await {
                Ok(Some(cm)) => {
                    let Some(bundle) = cm.data.as_ref().and_then(|d| d.get(BUNDLE_KEY)) else {
                        return DiscoveryOutcome::fail(format!(
                            "configmap {}/{BUNDLE_CONFIGMAP} has no {BUNDLE_KEY}",
                            self.namespace
                        ));
                    };
                    bundle.clone().into_bytes()
                }
                Ok(None) => return DiscoveryOutcome::ok(Vec::new()),
                Err(e) => {
                    return DiscoveryOutcome::fail(format!(
                        "get configmap {}/{BUNDLE_CONFIGMAP}: {e}",
                        self.namespace
                    ))
                }
            }
        };

        match bundle_findings(&pem_bytes) {
            Ok(findings) => DiscoveryOutcome::ok(findings),
            Err(e) => DiscoveryOutcome::fail(format!("parse trust bundle: {e}")),
        }
    }
}

/// One finding per trust anchor in the bundle.
pub fn bundle_findings(pem_bytes: &[u8]) -> crate::Result<Vec<CertFinding>> {
    let ders = trustwatch_probe::cert::pem_to_der_chain(pem_bytes)
        .map_err(|e| crate::DiscoverError::CertMaterial(e.to_string()))?;

    let mut findings = Vec::new();
    for der in ders {
        let report = trustwatch_probe::cert::report_from_chain(vec![der])
            .map_err(|e| crate::DiscoverError::CertMaterial(e.to_string()))?;
        let mut f = CertFinding::new(SourceKind::Spiffe, report.subject.clone());
        f.notes = "trust anchor".to_string();
        report.apply_to(&mut f);
        findings.push(f);
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(count: usize) -> Vec<u8> {
        let mut out = String::new();
        for i in 0..count {
            let key = rcgen::KeyPair::generate().unwrap();
            let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
            params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
            params
                .distinguished_name
                .push(rcgen::DnType::CommonName, format!("SPIRE Root {i}"));
            out.push_str(&params.self_signed(&key).unwrap().pem());
        }
        out.into_bytes()
    }

    #[test]
    fn one_finding_per_root() {
        let findings = bundle_findings(&bundle(2)).unwrap();
        assert_eq!(findings.len(), 2);
        for f in &findings {
            assert!(f.probe_ok);
            assert!(f.self_signed);
            assert_eq!(f.notes, "trust anchor");
            assert_eq!(f.source, SourceKind::Spiffe);
        }
        assert!(findings[0].name.contains("SPIRE Root 0"));
    }

    #[test]
    fn empty_bundle_is_an_error() {
        assert!(bundle_findings(b"no pem here").is_err());
    }
}
