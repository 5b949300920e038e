//! TLS secret discovery.
//!
//! Secrets are parsed in place; no probe. A secret of type
//! `kubernetes.io/tls` (or any secret carrying `tls.crt`) holds the exact
//! chain a workload will serve, whether or not anything currently does.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ListParams, ResourceExt};
use kube::Client;
use tracing::debug;

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, SourceKind};

/// Secret key that holds the certificate chain.
const TLS_CERT_KEY: &str = "tls.crt";
/// Well-known TLS secret type.
const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";

/// Discovers certificate material inside TLS secrets.
pub struct SecretDiscoverer {
    client: Client,
    namespaces: Vec<String>,
}

impl SecretDiscoverer {
    /// Construct scoped to the accessible namespaces.
    #[must_use]
    pub fn new(client: Client, namespaces: Vec<String>) -> Self {
        Self { client, namespaces }
    }
}

#[async_trait]
impl Discoverer for SecretDiscoverer {
    fn name(&self) -> &str {
        "k8s.tlsSecret"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        let mut findings = Vec::new();
        for ns in &self.namespaces {
            let api: Api<Secret> = Api::namespaced(self.client.clone(), ns);
            let list = match api.list(&ListParams::default()).await {
                Ok(l) => l,
                Err(e) => {
                    return DiscoveryOutcome::partial(findings, format!("list secrets in {ns}: {e}"))
                }
            };
            for secret in &list.items {
                if let Some(f) = secret_finding(ns, &secret.name_any(), secret) {
                    findings.push(f);
                }
            }
        }
        DiscoveryOutcome::ok(findings)
    }
}

/// Parse one secret into a finding, when it carries TLS material.
#[must_use]
pub fn secret_finding(namespace: &str, name: &str, secret: &Secret) -> Option<CertFinding> {
    let is_tls_type = secret.type_.as_deref() == Some(TLS_SECRET_TYPE);
    let cert_bytes = secret
        .data
        .as_ref()
        .and_then(|d| d.get(TLS_CERT_KEY))
        .map(|b| b.0.clone());

    if !is_tls_type && cert_bytes.is_none() {
        return None;
    }

    let mut f = CertFinding::new(SourceKind::TlsSecret, name);
    f.namespace = Some(namespace.to_string());

    let Some(pem_bytes) = cert_bytes else {
        f.probe_err = format!("{TLS_SECRET_TYPE} secret without {TLS_CERT_KEY}");
        return Some(f);
    };

    match trustwatch_probe::cert::pem_to_der_chain(&pem_bytes)
        .and_then(trustwatch_probe::cert::report_from_chain)
    {
        Ok(report) => report.apply_to(&mut f),
        Err(e) => {
            debug!(namespace = %namespace, name = %name, error = %e, "bad tls secret");
            f.probe_err = format!("{TLS_CERT_KEY}: {e}");
        }
    }
    Some(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn tls_secret(type_: Option<&str>, crt: Option<&[u8]>) -> Secret {
        Secret {
            type_: type_.map(String::from),
            data: crt.map(|c| {
                BTreeMap::from([(TLS_CERT_KEY.to_string(), k8s_openapi::ByteString(c.to_vec()))])
            }),
            ..Secret::default()
        }
    }

    fn pem_chain() -> Vec<u8> {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["app.example.com".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        cert.pem().into_bytes()
    }

    #[test]
    fn tls_secret_parses_into_material() {
        let secret = tls_secret(Some(TLS_SECRET_TYPE), Some(&pem_chain()));
        let f = secret_finding("default", "app-tls", &secret).unwrap();

        assert!(f.probe_ok);
        assert_eq!(f.namespace.as_deref(), Some("default"));
        assert!(f.dns_names.contains(&"app.example.com".to_string()));
        assert!(f.not_after.is_some());
        assert!(f.target.is_none());
    }

    #[test]
    fn opaque_secret_with_tls_crt_is_still_observed() {
        let secret = tls_secret(Some("Opaque"), Some(&pem_chain()));
        assert!(secret_finding("default", "byo-cert", &secret).is_some());
    }

    #[test]
    fn unrelated_secret_is_skipped() {
        let secret = tls_secret(Some("Opaque"), None);
        assert!(secret_finding("default", "password", &secret).is_none());
    }

    #[test]
    fn corrupt_material_records_the_failure() {
        let secret = tls_secret(Some(TLS_SECRET_TYPE), Some(b"garbage"));
        let f = secret_finding("default", "broken", &secret).unwrap();
        assert!(!f.probe_ok);
        assert!(f.probe_err.contains(TLS_CERT_KEY));
    }
}
