//! Origins of findings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Enumerated origin of a finding: which discoverer (or enricher) saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Validating/mutating admission webhook endpoints.
    #[serde(rename = "k8s.webhook")]
    Webhook,
    /// Aggregated API services.
    #[serde(rename = "k8s.apiservice")]
    ApiService,
    /// The control-plane endpoint itself.
    #[serde(rename = "k8s.apiserver")]
    ApiServer,
    /// `kubernetes.io/tls` secrets (PEM parsed in place, no probe).
    #[serde(rename = "k8s.tlsSecret")]
    TlsSecret,
    /// `Ingress.spec.tls` host/secret pairs.
    #[serde(rename = "k8s.ingressTLS")]
    IngressTls,
    /// Gateway-API listener TLS.
    #[serde(rename = "k8s.gateway")]
    Gateway,
    /// Linkerd identity issuer material.
    #[serde(rename = "mesh.linkerd")]
    Linkerd,
    /// Istio CA / identity issuer material.
    #[serde(rename = "mesh.istio")]
    Istio,
    /// Services annotated for probing.
    #[serde(rename = "annotation")]
    Annotation,
    /// cert-manager Certificate objects.
    #[serde(rename = "certmanager")]
    CertManager,
    /// cert-manager renewal-window observations.
    #[serde(rename = "certmanager.renewal")]
    CertManagerRenewal,
    /// External URLs from config or TrustPolicy targets.
    #[serde(rename = "external")]
    External,
    /// SPIFFE trust-bundle roots.
    #[serde(rename = "spiffe")]
    Spiffe,
    /// AWS Certificate Manager.
    #[serde(rename = "cloud.aws.acm")]
    CloudAwsAcm,
    /// GCP Certificate Manager.
    #[serde(rename = "cloud.gcp.cert")]
    CloudGcpCert,
    /// Azure Key Vault certificates.
    #[serde(rename = "cloud.azure.keyvault")]
    CloudAzureKeyVault,
    /// Certificate Transparency log observations.
    #[serde(rename = "ct")]
    Ct,
    /// Policy evaluator output.
    #[serde(rename = "policy")]
    Policy,
}

impl SourceKind {
    /// Wire/label form of the source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Webhook => "k8s.webhook",
            Self::ApiService => "k8s.apiservice",
            Self::ApiServer => "k8s.apiserver",
            Self::TlsSecret => "k8s.tlsSecret",
            Self::IngressTls => "k8s.ingressTLS",
            Self::Gateway => "k8s.gateway",
            Self::Linkerd => "mesh.linkerd",
            Self::Istio => "mesh.istio",
            Self::Annotation => "annotation",
            Self::CertManager => "certmanager",
            Self::CertManagerRenewal => "certmanager.renewal",
            Self::External => "external",
            Self::Spiffe => "spiffe",
            Self::CloudAwsAcm => "cloud.aws.acm",
            Self::CloudGcpCert => "cloud.gcp.cert",
            Self::CloudAzureKeyVault => "cloud.azure.keyvault",
            Self::Ct => "ct",
            Self::Policy => "policy",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_labels_are_stable() {
        assert_eq!(
            serde_json::to_string(&SourceKind::TlsSecret).unwrap(),
            "\"k8s.tlsSecret\""
        );
        assert_eq!(
            serde_json::from_str::<SourceKind>("\"mesh.linkerd\"").unwrap(),
            SourceKind::Linkerd
        );
        assert_eq!(SourceKind::IngressTls.to_string(), "k8s.ingressTLS");
    }
}
