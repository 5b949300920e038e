//! Admission webhook discovery.
//!
//! Every validating and mutating webhook terminates TLS somewhere: either
//! at an explicit `clientConfig.url` or at an in-cluster service. A broken
//! certificate there blocks admission for the whole cluster, so webhooks
//! rank among the highest-value trust surfaces.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration, WebhookClientConfig,
};
use kube::api::{Api, ListParams, ResourceExt};
use kube::Client;

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, Prober, SourceKind};

use crate::util::probe_all;

/// Discovers validating and mutating webhook configurations.
pub struct WebhookDiscoverer {
    client: Client,
    prober: Arc<dyn Prober>,
}

impl WebhookDiscoverer {
    /// Construct with the prober the probes run through.
    #[must_use]
    pub fn new(client: Client, prober: Arc<dyn Prober>) -> Self {
        Self { client, prober }
    }
}

#[async_trait]
impl Discoverer for WebhookDiscoverer {
    fn name(&self) -> &str {
        "k8s.webhook"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        let mut pending = Vec::new();

        let validating: Api<ValidatingWebhookConfiguration> = Api::all(self.client.clone());
        match validating.list(&ListParams::default()).await {
            Ok(list) => {
                for cfg in &list.items {
                    for wh in cfg.webhooks.iter().flatten() {
                        pending.push(webhook_finding(
                            &cfg.name_any(),
                            &wh.name,
                            &wh.client_config,
                            wh.failure_policy.as_deref(),
                            &wh.side_effects,
                        ));
                    }
                }
            }
            Err(e) => {
                return DiscoveryOutcome::partial(
                    probe_all(Arc::clone(&self.prober), pending).await,
                    format!("list validating webhooks: {e}"),
                )
            }
        }

        let mutating: Api<MutatingWebhookConfiguration> = Api::all(self.client.clone());
        match mutating.list(&ListParams::default()).await {
            Ok(list) => {
                for cfg in &list.items {
                    for wh in cfg.webhooks.iter().flatten() {
                        pending.push(webhook_finding(
                            &cfg.name_any(),
                            &wh.name,
                            &wh.client_config,
                            wh.failure_policy.as_deref(),
                            &wh.side_effects,
                        ));
                    }
                }
            }
            Err(e) => {
                return DiscoveryOutcome::partial(
                    probe_all(Arc::clone(&self.prober), pending).await,
                    format!("list mutating webhooks: {e}"),
                )
            }
        }

        DiscoveryOutcome::ok(probe_all(Arc::clone(&self.prober), pending).await)
    }
}

/// Resolve a webhook client config to a probe target URL.
///
/// Explicit URLs are probed as given; service references become in-cluster
/// DNS targets (which need the tunnel relay from outside).
#[must_use]
pub fn webhook_target(cc: &WebhookClientConfig) -> Option<String> {
    if let Some(url) = &cc.url {
        return Some(url.clone());
    }
    cc.service.as_ref().map(|svc| {
        let port = svc.port.unwrap_or(443);
        format!("tcp://{}.{}.svc:{port}", svc.name, svc.namespace)
    })
}

fn webhook_finding(
    cfg_name: &str,
    webhook_name: &str,
    cc: &WebhookClientConfig,
    failure_policy: Option<&str>,
    side_effects: &str,
) -> CertFinding {
    let mut f = CertFinding::new(SourceKind::Webhook, format!("{cfg_name}/{webhook_name}"));
    f.target = webhook_target(cc);
    f.notes = format!(
        "failurePolicy={} sideEffects={side_effects}",
        failure_policy.unwrap_or("Fail")
    );
    if f.target.is_none() {
        f.probe_err = "webhook has neither url nor service".to_string();
    }
    f
}
