//! Cloud certificate-store discoverers, compiled in via cargo features.
//!
//! Feature gates stand in for the original's build tags: each enabled
//! provider registers itself through [`discoverers`] and the orchestrator
//! stays agnostic.

#[cfg(feature = "cloud-aws")]
pub mod aws;
#[cfg(feature = "cloud-azure")]
pub mod azure;
#[cfg(feature = "cloud-gcp")]
pub mod gcp;

use std::sync::Arc;

use trustwatch_core::Discoverer;

/// Per-provider settings carried in the scan config.
#[derive(Debug, Clone, Default)]
pub struct CloudConfig {
    /// GCP project id (`cloud.gcp.cert`).
    pub gcp_project: Option<String>,
    /// Azure Key Vault base URL (`cloud.azure.keyvault`).
    pub azure_vault_url: Option<String>,
}

/// The compile-time registry of enabled cloud discoverers.
#[must_use]
#[allow(unused_variables, unused_mut, clippy::needless_pass_by_value)]
pub fn discoverers(config: CloudConfig) -> Vec<Arc<dyn Discoverer>> {
    let mut registered: Vec<Arc<dyn Discoverer>> = Vec::new();

    #[cfg(feature = "cloud-aws")]
    registered.push(Arc::new(aws::AcmDiscoverer::new()));

    #[cfg(feature = "cloud-gcp")]
    if let Some(project) = config.gcp_project.clone() {
        registered.push(Arc::new(gcp::GcpCertDiscoverer::new(project)));
    }

    #[cfg(feature = "cloud-azure")]
    if let Some(vault_url) = config.azure_vault_url.clone() {
        registered.push(Arc::new(azure::KeyVaultDiscoverer::new(vault_url)));
    }

    registered
}
