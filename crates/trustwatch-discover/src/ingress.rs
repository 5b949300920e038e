//! Ingress TLS discovery.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, ListParams, ResourceExt};
use kube::Client;

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, Prober, SourceKind};

use crate::util::probe_all;

/// Discovers `Ingress.spec.tls` host/secret pairs and probes each host.
pub struct IngressDiscoverer {
    client: Client,
    namespaces: Vec<String>,
    prober: Arc<dyn Prober>,
}

impl IngressDiscoverer {
    /// Construct scoped to the accessible namespaces.
    #[must_use]
    pub fn new(client: Client, namespaces: Vec<String>, prober: Arc<dyn Prober>) -> Self {
        Self {
            client,
            namespaces,
            prober,
        }
    }
}

#[async_trait]
impl Discoverer for IngressDiscoverer {
    fn name(&self) -> &str {
        "k8s.ingressTLS"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        let mut pending = Vec::new();
        for ns in &self.namespaces {
            let api: Api<Ingress> = Api::namespaced(self.client.clone(), ns);
            let list = match api.list(&ListParams::default()).await {
                Ok(l) => l,
                Err(e) => {
                    return DiscoveryOutcome::partial(
                        probe_all(Arc::clone(&self.prober), pending).await,
                        format!("list ingresses in {ns}: {e}"),
                    )
                }
            };
            for ingress in &list.items {
                pending.extend(ingress_findings(ns, &ingress.name_any(), ingress));
            }
        }
        DiscoveryOutcome::ok(probe_all(Arc::clone(&self.prober), pending).await)
    }
}

/// One finding per TLS host on the ingress.
#[must_use]
pub fn ingress_findings(namespace: &str, name: &str, ingress: &Ingress) -> Vec<CertFinding> {
    let mut findings = Vec::new();
    let Some(tls_entries) = ingress.spec.as_ref().and_then(|s| s.tls.as_ref()) else {
        return findings;
    };
    for entry in tls_entries {
        for host in entry.hosts.iter().flatten() {
            let mut f = CertFinding::new(SourceKind::IngressTls, format!("{name}/{host}"));
            f.namespace = Some(namespace.to_string());
            f.target = Some(format!("tcp://{host}:443"));
            f.sni = Some(host.clone());
            if let Some(secret) = &entry.secret_name {
                f.notes = format!("secret={secret}");
            }
            findings.push(f);
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::networking::v1::{IngressSpec, IngressTLS};

    #[test]
    fn each_tls_host_becomes_a_finding() {
        let ingress = Ingress {
            spec: Some(IngressSpec {
                tls: Some(vec![IngressTLS {
                    hosts: Some(vec![
                        "shop.example.com".to_string(),
                        "api.example.com".to_string(),
                    ]),
                    secret_name: Some("shop-tls".to_string()),
                }]),
                ..IngressSpec::default()
            }),
            ..Ingress::default()
        };

        let findings = ingress_findings("prod", "shop", &ingress);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].name, "shop/shop.example.com");
        assert_eq!(findings[0].target.as_deref(), Some("tcp://shop.example.com:443"));
        assert_eq!(findings[0].notes, "secret=shop-tls");
        assert_eq!(findings[1].name, "shop/api.example.com");
    }

    #[test]
    fn ingress_without_tls_yields_nothing() {
        assert!(ingress_findings("prod", "plain", &Ingress::default()).is_empty());
    }
}
