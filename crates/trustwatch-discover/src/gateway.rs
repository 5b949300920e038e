//! Gateway-API listener discovery.
//!
//! Gateway API is a CRD; clusters without it are common. The discoverer
//! reads `Gateway` objects dynamically and treats an absent CRD as an empty
//! result, not an error.

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, ListParams, ResourceExt};
use kube::core::{ApiResource, GroupVersionKind};
use kube::Client;

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, Prober, SourceKind};

use crate::util::probe_all;

/// Discovers Gateway-API TLS listeners.
pub struct GatewayDiscoverer {
    client: Client,
    namespaces: Vec<String>,
    prober: Arc<dyn Prober>,
}

impl GatewayDiscoverer {
    /// Construct scoped to the accessible namespaces.
    #[must_use]
    pub fn new(client: Client, namespaces: Vec<String>, prober: Arc<dyn Prober>) -> Self {
        Self {
            client,
            namespaces,
            prober,
        }
    }

    fn api_resource() -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk(
            "gateway.networking.k8s.io",
            "v1",
            "Gateway",
        ))
    }
}

#[async_trait]
impl Discoverer for GatewayDiscoverer {
    fn name(&self) -> &str {
        "k8s.gateway"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        let ar = Self::api_resource();
        let mut pending = Vec::new();
        for ns in &self.namespaces {
            let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), ns, &ar);
            let list = match api.list(&ListParams::default()).await {
                Ok(l) => l,
                Err(kube::Error::Api(ae)) if ae.code == 404 => {
                    // Gateway API not installed.
                    return DiscoveryOutcome::ok(Vec::new());
                }
                Err(e) => {
                    return DiscoveryOutcome::partial(
                        probe_all(Arc::clone(&self.prober), pending).await,
                        format!("list gateways in {ns}: {e}"),
                    )
                }
            };
            for gw in &list.items {
                pending.extend(gateway_findings(ns, &gw.name_any(), gw));
            }
        }
        DiscoveryOutcome::ok(probe_all(Arc::clone(&self.prober), pending).await)
    }
}

/// One finding per TLS-terminating listener with a dialable hostname.
#[must_use]
pub fn gateway_findings(namespace: &str, name: &str, gw: &DynamicObject) -> Vec<CertFinding> {
    let mut findings = Vec::new();
    let Some(listeners) = gw
        .data
        .get("spec")
        .and_then(|s| s.get("listeners"))
        .and_then(|l| l.as_array())
    else {
        return findings;
    };

    for listener in listeners {
        let protocol = listener
            .get("protocol")
            .and_then(|p| p.as_str())
            .unwrap_or_default();
        if protocol != "HTTPS" && protocol != "TLS" {
            continue;
        }
        let listener_name = listener
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or("listener");
        let Some(hostname) = listener.get("hostname").and_then(|h| h.as_str()) else {
            // Wildcardless listener with no hostname: nothing to dial.
            continue;
        };
        // Wildcard hosts are dialed at the apex.
        let dial_host = hostname.trim_start_matches("*.");
        let port = listener.get("port").and_then(serde_json::Value::as_u64).unwrap_or(443);

        let mut f = CertFinding::new(SourceKind::Gateway, format!("{name}/{listener_name}"));
        f.namespace = Some(namespace.to_string());
        f.target = Some(format!("tcp://{dial_host}:{port}"));
        f.sni = Some(dial_host.to_string());
        if let Some(refs) = listener
            .get("tls")
            .and_then(|t| t.get("certificateRefs"))
            .and_then(|r| r.as_array())
        {
            let names: Vec<&str> = refs
                .iter()
                .filter_map(|r| r.get("name").and_then(|n| n.as_str()))
                .collect();
            if !names.is_empty() {
                f.notes = format!("certificateRefs={}", names.join(","));
            }
        }
        findings.push(f);
    }
    findings
}
