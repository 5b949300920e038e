//! Aggregated API service discovery.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::kube_aggregator::pkg::apis::apiregistration::v1::APIService;
use kube::api::{Api, ListParams, ResourceExt};
use kube::Client;

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, Prober, SourceKind};

use crate::util::probe_all;

/// Discovers aggregated API services backed by in-cluster endpoints.
pub struct ApiServiceDiscoverer {
    client: Client,
    prober: Arc<dyn Prober>,
}

impl ApiServiceDiscoverer {
    /// Construct with the prober the probes run through.
    #[must_use]
    pub fn new(client: Client, prober: Arc<dyn Prober>) -> Self {
        Self { client, prober }
    }
}

#[async_trait]
impl Discoverer for ApiServiceDiscoverer {
    fn name(&self) -> &str {
        "k8s.apiservice"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        let api: Api<APIService> = Api::all(self.client.clone());
        let list = match api.list(&ListParams::default()).await {
            Ok(l) => l,
            Err(e) => return DiscoveryOutcome::fail(format!("list apiservices: {e}")),
        };

        let pending: Vec<CertFinding> = list
            .items
            .iter()
            .filter_map(|svc| apiservice_finding(&svc.name_any(), svc))
            .collect();

        DiscoveryOutcome::ok(probe_all(Arc::clone(&self.prober), pending).await)
    }
}

/// Build a finding for an aggregated API service, when it carries a trust
/// surface worth observing (a CA bundle or a backing service).
#[must_use]
pub fn apiservice_finding(name: &str, svc: &APIService) -> Option<CertFinding> {
    let spec = svc.spec.as_ref()?;
    let has_bundle = spec.ca_bundle.as_ref().is_some_and(|b| !b.0.is_empty());
    let backing = spec.service.as_ref();
    if !has_bundle && backing.is_none() {
        // Locally-served groups carry no TLS surface of their own.
        return None;
    }

    let mut f = CertFinding::new(SourceKind::ApiService, name);
    f.notes = format!(
        "group={} version={}",
        spec.group.as_deref().unwrap_or_default(),
        spec.version.as_deref().unwrap_or_default()
    );
    if let Some(service) = backing {
        let svc_name = service.name.as_deref().unwrap_or_default();
        let svc_ns = service.namespace.as_deref().unwrap_or_default();
        if !svc_name.is_empty() && !svc_ns.is_empty() {
            let port = service.port.unwrap_or(443);
            f.namespace = Some(svc_ns.to_string());
            f.target = Some(format!("tcp://{svc_name}.{svc_ns}.svc:{port}"));
        }
    }
    if f.target.is_none() {
        // No endpoint to dial; the CA bundle itself is the observable material.
        match spec
            .ca_bundle
            .as_ref()
            .ok_or_else(|| "empty caBundle".to_string())
            .and_then(|b| {
                trustwatch_probe::cert::pem_to_der_chain(&b.0).map_err(|e| e.to_string())
            })
            .and_then(|ders| {
                trustwatch_probe::cert::report_from_chain(ders).map_err(|e| e.to_string())
            }) {
            Ok(report) => report.apply_to(&mut f),
            Err(e) => f.probe_err = format!("caBundle: {e}"),
        }
    }
    Some(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::kube_aggregator::pkg::apis::apiregistration::v1::{
        APIServiceSpec, ServiceReference,
    };

    fn apiservice(
        ca_bundle: Option<&[u8]>,
        service: Option<(&str, &str, Option<i32>)>,
    ) -> APIService {
        APIService {
            spec: Some(APIServiceSpec {
                group: Some("metrics.k8s.io".to_string()),
                version: Some("v1beta1".to_string()),
                ca_bundle: ca_bundle.map(|b| k8s_openapi::ByteString(b.to_vec())),
                service: service.map(|(name, ns, port)| ServiceReference {
                    name: Some(name.to_string()),
                    namespace: Some(ns.to_string()),
                    port,
                }),
                ..APIServiceSpec::default()
            }),
            ..APIService::default()
        }
    }

    #[test]
    fn service_backed_apiservice_gets_a_target() {
        let svc = apiservice(None, Some(("metrics-server", "kube-system", Some(4443))));
        let f = apiservice_finding("v1beta1.metrics.k8s.io", &svc).unwrap();
        assert_eq!(
            f.target.as_deref(),
            Some("tcp://metrics-server.kube-system.svc:4443")
        );
        assert_eq!(f.namespace.as_deref(), Some("kube-system"));
        assert!(f.notes.contains("metrics.k8s.io"));
    }

    #[test]
    fn bundle_only_apiservice_parses_the_bundle() {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["agg.example.com".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        let svc = apiservice(Some(cert.pem().as_bytes()), None);

        let f = apiservice_finding("v1beta1.metrics.k8s.io", &svc).unwrap();
        assert!(f.target.is_none());
        assert!(f.probe_ok);
        assert!(f.not_after.is_some());
        assert!(f.self_signed);
    }

    #[test]
    fn garbage_bundle_records_the_parse_failure() {
        let svc = apiservice(Some(b"not pem"), None);
        let f = apiservice_finding("v1beta1.metrics.k8s.io", &svc).unwrap();
        assert!(!f.probe_ok);
        assert!(f.probe_err.contains("caBundle"));
    }

    #[test]
    fn local_apiservice_is_skipped() {
        let svc = apiservice(None, None);
        assert!(apiservice_finding("v1.apps", &svc).is_none());
    }
}
