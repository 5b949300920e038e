//! Assembles a full orchestrator from config, a cluster client, and a
//! prober.

use std::sync::Arc;

use kube::Client;
use tracing::{info, warn};

use trustwatch_core::{Prober, Snapshot};
use trustwatch_discover::access::{self, SCOPED_CHECKS};
use trustwatch_discover::annotation::AnnotationDiscoverer;
use trustwatch_discover::apiserver::ApiServerDiscoverer;
use trustwatch_discover::apiservice::ApiServiceDiscoverer;
use trustwatch_discover::certmanager::CertManagerDiscoverer;
use trustwatch_discover::cloud;
use trustwatch_discover::external::ExternalDiscoverer;
use trustwatch_discover::gateway::GatewayDiscoverer;
use trustwatch_discover::ingress::IngressDiscoverer;
use trustwatch_discover::mesh::{IstioDiscoverer, LinkerdDiscoverer};
use trustwatch_discover::policy_crd;
use trustwatch_discover::secret::SecretDiscoverer;
use trustwatch_discover::spiffe::SpiffeDiscoverer;
use trustwatch_discover::webhook::WebhookDiscoverer;
use trustwatch_probe::RevocationChecker;

use crate::config::Config;
use crate::ct::CtChecker;
use crate::orchestrator::{DriftOptions, Enrichers, Orchestrator};

/// Everything a scan needs besides the config.
pub struct ScanDeps {
    /// Cluster client.
    pub client: Client,
    /// Cluster URL from the active kube config (for the apiserver probe).
    pub cluster_url: String,
    /// Prober injected into every probing discoverer.
    pub prober: Arc<dyn Prober>,
    /// Baseline snapshot for drift comparison.
    pub baseline: Option<Snapshot>,
}

/// Build the orchestrator with the standard discoverer registry and the
/// config-selected enrichers.
///
/// Registration order is fixed; the snapshot merges findings in this order
/// and consumers rely on it being stable.
pub async fn build_orchestrator(config: &Config, deps: ScanDeps) -> Orchestrator {
    let client = deps.client;
    let prober = deps.prober;

    // Resolve the accessible namespace subset once, up front.
    let namespaces = match &config.namespaces {
        Some(explicit) => explicit.clone(),
        None => match access::list_namespaces(&client).await {
            Ok(all) => access::filter_accessible(&client, all, SCOPED_CHECKS).await,
            Err(e) => {
                warn!(error = %e, "namespace listing failed; scoped discoverers see nothing");
                Vec::new()
            }
        },
    };
    info!(namespaces = namespaces.len(), "namespace scope resolved");

    // Policies are optional: a load failure warns and the scan continues.
    let policies = match policy_crd::load_policies(&client).await {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "policy load failed; continuing without policies");
            Vec::new()
        }
    };

    let mut external_targets = config.external_targets.clone();
    external_targets.extend(policy_crd::external_targets(&policies));

    let mut orchestrator = Orchestrator::new(config.warn_before(), config.crit_before());
    orchestrator
        .register(Arc::new(WebhookDiscoverer::new(
            client.clone(),
            Arc::clone(&prober),
        )))
        .register(Arc::new(ApiServiceDiscoverer::new(
            client.clone(),
            Arc::clone(&prober),
        )))
        .register(Arc::new(ApiServerDiscoverer::new(
            deps.cluster_url,
            Arc::clone(&prober),
        )))
        .register(Arc::new(SecretDiscoverer::new(
            client.clone(),
            namespaces.clone(),
        )))
        .register(Arc::new(IngressDiscoverer::new(
            client.clone(),
            namespaces.clone(),
            Arc::clone(&prober),
        )))
        .register(Arc::new(GatewayDiscoverer::new(
            client.clone(),
            namespaces.clone(),
            Arc::clone(&prober),
        )))
        .register(Arc::new(CertManagerDiscoverer::new(
            client.clone(),
            namespaces.clone(),
            config.warn_before(),
        )))
        .register(Arc::new(LinkerdDiscoverer::new(
            client.clone(),
            config.mesh.linkerd_namespace.clone(),
        )))
        .register(Arc::new(IstioDiscoverer::new(
            client.clone(),
            config.mesh.istio_namespace.clone(),
        )))
        .register(Arc::new(AnnotationDiscoverer::new(
            client.clone(),
            namespaces,
            Arc::clone(&prober),
        )))
        .register(Arc::new(ExternalDiscoverer::new(
            external_targets,
            Arc::clone(&prober),
        )))
        .register(Arc::new(SpiffeDiscoverer::new(
            client.clone(),
            config.spiffe.namespace.clone(),
            config.spiffe.bundle_path.clone(),
        )));

    for discoverer in cloud::discoverers(cloud::CloudConfig {
        gcp_project: config.cloud.gcp_project.clone(),
        azure_vault_url: config.cloud.azure_vault_url.clone(),
    }) {
        orchestrator.register(discoverer);
    }

    orchestrator.with_enrichers(Enrichers {
        revocation: Some(RevocationChecker::new()),
        ct: (!config.ct.domains.is_empty()).then(|| {
            CtChecker::new(config.ct.domains.clone(), config.ct.allowed_issuers.clone())
        }),
        drift: deps.baseline.map(|baseline| DriftOptions {
            baseline,
            on_renewal: config.drift_on_renewal,
        }),
        policies,
        rotation: true,
    });

    orchestrator
}
