//! Control-plane endpoint discovery.

use std::sync::Arc;

use async_trait::async_trait;

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, Prober, SourceKind};

/// Probes the Kubernetes API server endpoint itself.
///
/// The cluster URL comes from the active kube config; the prober dials it
/// like any other endpoint, so proxied or tunnelled setups inject a prober
/// that can reach it.
pub struct ApiServerDiscoverer {
    cluster_url: String,
    prober: Arc<dyn Prober>,
}

impl ApiServerDiscoverer {
    /// Construct for the given cluster URL (e.g. `https://10.0.0.1:6443`).
    #[must_use]
    pub fn new(cluster_url: impl Into<String>, prober: Arc<dyn Prober>) -> Self {
        Self {
            cluster_url: cluster_url.into(),
            prober,
        }
    }
}

#[async_trait]
impl Discoverer for ApiServerDiscoverer {
    fn name(&self) -> &str {
        "k8s.apiserver"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        let Some(target) = apiserver_target(&self.cluster_url) else {
            return DiscoveryOutcome::fail(format!(
                "cluster url {} is not probeable",
                self.cluster_url
            ));
        };

        let mut f = CertFinding::new(SourceKind::ApiServer, "kubernetes");
        f.notes = "control plane endpoint".to_string();
        f.target = Some(target.clone());
        let report = self.prober.probe(&target).await;
        report.apply_to(&mut f);

        DiscoveryOutcome::ok(vec![f])
    }
}

/// Normalize a cluster URL into a probe target.
#[must_use]
pub fn apiserver_target(cluster_url: &str) -> Option<String> {
    let url = url::Url::parse(cluster_url).ok()?;
    let host = url.host_str()?;
    let port = url.port().unwrap_or(443);
    Some(format!("tcp://{host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_url_becomes_tcp_target() {
        assert_eq!(
            apiserver_target("https://10.1.2.3:6443").as_deref(),
            Some("tcp://10.1.2.3:6443")
        );
        assert_eq!(
            apiserver_target("https://api.cluster.example.com").as_deref(),
            Some("tcp://api.cluster.example.com:443")
        );
        assert!(apiserver_target("not a url").is_none());
    }
}
