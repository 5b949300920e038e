//! Annotation-driven service discovery.
//!
//! Teams opt services into probing with the `trustwatch.io/probe`
//! annotation. The value is `"true"` (probe the first service port) or an
//! explicit port number.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, ListParams, ResourceExt};
use kube::Client;

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, Prober, SourceKind};

use crate::util::probe_all;

/// Annotation that opts a service into probing.
pub const PROBE_ANNOTATION: &str = "trustwatch.io/probe";

/// Discovers services bearing the probe annotation.
pub struct AnnotationDiscoverer {
    client: Client,
    namespaces: Vec<String>,
    prober: Arc<dyn Prober>,
}

impl AnnotationDiscoverer {
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
impl Discoverer for AnnotationDiscoverer {
    fn name(&self) -> &str {
        "annotation"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        let mut pending = Vec::new();
        for ns in &self.namespaces {
            let api: Api<Service> = Api::namespaced(self.client.clone(), ns);
            let list = match api.list(&ListParams::default()).await {
                Ok(l) => l,
                Err(e) => {
                    return DiscoveryOutcome::partial(
                        probe_all(Arc::clone(&self.prober), pending).await,
                        format!("list services in {ns}: {e}"),
                    )
                }
            };
            for svc in &list.items {
                if let Some(f) = annotated_finding(ns, &svc.name_any(), svc) {
                    pending.push(f);
                }
            }
        }
        DiscoveryOutcome::ok(probe_all(Arc::clone(&self.prober), pending).await)
    }
}

/// Build a finding for an annotated service, resolving the probe port.
#[must_use]
pub fn annotated_finding(namespace: &str, name: &str, svc: &Service) -> Option<CertFinding> {
    let value = svc
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(PROBE_ANNOTATION))?;

    let port = value.parse::<u16>().ok().or_else(|| {
        svc.spec
            .as_ref()
            .and_then(|s| s.ports.as_ref())
            .and_then(|p| p.first())
            .and_then(|p| u16::try_from(p.port).ok())
    })?;

    let mut f = CertFinding::new(SourceKind::Annotation, name);
    f.namespace = Some(namespace.to_string());
    f.target = Some(format!("tcp://{name}.{namespace}.svc:{port}"));
    Some(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};
    use std::collections::BTreeMap;

    fn service(annotation: Option<&str>, first_port: Option<i32>) -> Service {
        Service {
            metadata: kube::api::ObjectMeta {
                annotations: annotation.map(|v| {
                    BTreeMap::from([(PROBE_ANNOTATION.to_string(), v.to_string())])
                }),
                ..kube::api::ObjectMeta::default()
            },
            spec: first_port.map(|p| ServiceSpec {
                ports: Some(vec![ServicePort {
                    port: p,
                    ..ServicePort::default()
                }]),
                ..ServiceSpec::default()
            }),
            ..Service::default()
        }
    }

    #[test]
    fn annotation_value_overrides_the_port() {
        let svc = service(Some("8443"), Some(443));
        let f = annotated_finding("default", "api", &svc).unwrap();
        assert_eq!(f.target.as_deref(), Some("tcp://api.default.svc:8443"));
    }

    #[test]
    fn true_value_falls_back_to_first_service_port() {
        let svc = service(Some("true"), Some(9443));
        let f = annotated_finding("default", "api", &svc).unwrap();
        assert_eq!(f.target.as_deref(), Some("tcp://api.default.svc:9443"));
    }

    #[test]
    fn unannotated_service_is_skipped() {
        assert!(annotated_finding("default", "api", &service(None, Some(443))).is_none());
    }

    #[test]
    fn annotated_service_without_any_port_is_skipped() {
        assert!(annotated_finding("default", "api", &service(Some("true"), None)).is_none());
    }
}
