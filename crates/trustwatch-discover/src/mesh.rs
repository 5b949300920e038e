//! Service-mesh identity issuer discovery.
//!
//! Linkerd and Istio keep their identity issuer material in well-known
//! secrets. These are the certificates every mesh workload's mTLS chains up
//! to; an expired issuer takes the whole mesh down at once.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::Client;

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, SourceKind};

/// Secret keys tried, in order, for issuer certificate material.
const ISSUER_CERT_KEYS: &[&str] = &["crt.pem", "tls.crt", "ca-cert.pem", "ca.crt"];

/// Discovers the Linkerd identity issuer.
pub struct LinkerdDiscoverer {
    client: Client,
    namespace: String,
}

impl LinkerdDiscoverer {
    /// Construct for the mesh namespace (default `linkerd`).
    #[must_use]
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self {
            client,
            namespace: namespace.unwrap_or_else(|| "linkerd".to_string()),
        }
    }
}

#[async_trait]
impl Discoverer for LinkerdDiscoverer {
    fn name(&self) -> &str {
        "mesh.linkerd"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        issuer_secrets(
            &self.client,
            &self.namespace,
            &["linkerd-identity-issuer"],
            SourceKind::Linkerd,
        )
        .await
    }
}

/// Discovers the Istio CA / identity issuer.
pub struct IstioDiscoverer {
    client: Client,
    namespace: String,
}

impl IstioDiscoverer {
    /// Construct for the mesh namespace (default `istio-system`).
    #[must_use]
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self {
            client,
            namespace: namespace.unwrap_or_else(|| "istio-system".to_string()),
        }
    }
}

#[async_trait]
impl Discoverer for IstioDiscoverer {
    fn name(&self) -> &str {
        "mesh.istio"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        issuer_secrets(
            &self.client,
            &self.namespace,
            &["cacerts", "istio-ca-secret"],
            SourceKind::Istio,
        )
        .await
    }
}

async fn issuer_secrets(
    client: &Client,
    namespace: &str,
    names: &[&str],
    source: SourceKind,
) -> DiscoveryOutcome {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let mut findings = Vec::new();

    for name in names {
        match api.get_opt(name).await {
            Ok(Some(secret)) => {
                if let Some(f) = issuer_finding(namespace, name, &secret, source) {
                    findings.push(f);
                }
            }
            Ok(None) => {}
            Err(e) => {
                return DiscoveryOutcome::partial(
                    findings,
                    format!("get secret {namespace}/{name}: {e}"),
                )
            }
        }
    }
    DiscoveryOutcome::ok(findings)
}

/// Parse a mesh issuer secret into a finding.
#[must_use]
pub fn issuer_finding(
    namespace: &str,
    name: &str,
    secret: &Secret,
    source: SourceKind,
) -> Option<CertFinding> {
    let data = secret.data.as_ref()?;
    let pem_bytes = ISSUER_CERT_KEYS
        .iter()
        .find_map(|k| data.get(*k).map(|b| b.0.clone()))?;

    let mut f = CertFinding::new(source, name);
    f.namespace = Some(namespace.to_string());
    match trustwatch_probe::cert::pem_to_der_chain(&pem_bytes)
        .and_then(trustwatch_probe::cert::report_from_chain)
    {
        Ok(report) => {
            report.apply_to(&mut f);
            f.notes = if f.self_signed {
                "identity issuer trust anchor".to_string()
            } else {
                "identity issuer".to_string()
            };
        }
        Err(e) => f.probe_err = format!("issuer material: {e}"),
    }
    Some(f)
}
