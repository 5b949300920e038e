//! One observation about one trust surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::severity::Severity;
use super::source::SourceKind;

/// Tag identifying a derived finding. Absence means a direct observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingType {
    /// A policy rule was violated by an observed certificate.
    #[serde(rename = "POLICY_VIOLATION")]
    PolicyViolation,
    /// A cert-manager-renewed certificate is inside its renewal window.
    #[serde(rename = "MANAGED_EXPIRY")]
    ManagedExpiry,
    /// Certificate lifetime is below the minimum for its role.
    #[serde(rename = "EXCESSIVE_ROTATION")]
    ExcessiveRotation,
    /// CT log entry whose serial is unknown to the cluster.
    #[serde(rename = "CT_UNKNOWN_CERT")]
    CtUnknownCert,
    /// CT log entry issued by a CA outside the allowed set.
    #[serde(rename = "CT_ROGUE_ISSUER")]
    CtRogueIssuer,
    /// Surface present now, absent from the baseline.
    #[serde(rename = "DRIFT_ADDED")]
    DriftAdded,
    /// Surface present in the baseline, absent now.
    #[serde(rename = "DRIFT_REMOVED")]
    DriftRemoved,
    /// Same surface, different certificate.
    #[serde(rename = "DRIFT_CHANGED")]
    DriftChanged,
}

impl FindingType {
    /// Wire form of the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PolicyViolation => "POLICY_VIOLATION",
            Self::ManagedExpiry => "MANAGED_EXPIRY",
            Self::ExcessiveRotation => "EXCESSIVE_ROTATION",
            Self::CtUnknownCert => "CT_UNKNOWN_CERT",
            Self::CtRogueIssuer => "CT_ROGUE_ISSUER",
            Self::DriftAdded => "DRIFT_ADDED",
            Self::DriftRemoved => "DRIFT_REMOVED",
            Self::DriftChanged => "DRIFT_CHANGED",
        }
    }
}

/// One observed certificate-bearing entity.
///
/// Created by exactly one discoverer (or a post-pass enricher) during a
/// scan; immutable afterwards except for the single deploy-window severity
/// reclassification pass.
///
/// Invariant: `probe_ok == false` implies every certificate field is
/// zero/empty and `probe_err` is non-empty. `probe_ok == true` implies
/// `not_after` is present for probed/parsed material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertFinding {
    /// Which discoverer/enricher produced this finding.
    pub source: SourceKind,
    /// Namespace of the backing object, when namespace-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Object or endpoint name.
    pub name: String,
    /// URL probed, when a network probe was performed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// SNI presented during the probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sni: Option<String>,
    /// Cluster label, set by federation merging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    /// Leaf certificate expiry. Always present when `probe_ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<DateTime<Utc>>,
    /// Issuer distinguished name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    /// Subject distinguished name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    /// Serial number (hex, lowercase, no separators).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub serial: String,
    /// Subject alternative names of type DNS.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
    /// Issuer DNs walking up the presented chain; `[0]` is the leaf's issuer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issuer_chain: Vec<String>,
    /// Number of certificates presented.
    #[serde(default, skip_serializing_if = "is_zero_usize")]
    pub chain_len: usize,
    /// Subject equals issuer on the leaf.
    #[serde(default, skip_serializing_if = "is_false")]
    pub self_signed: bool,
    /// Leaf carries CA basic constraints.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_ca: bool,
    /// Public key algorithm (RSA, ECDSA, Ed25519, ...).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key_algorithm: String,
    /// Public key size in bits.
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub key_size: u32,
    /// Signature algorithm name (e.g. `SHA256-RSA`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature_algorithm: String,
    /// Certificate validity span in seconds.
    #[serde(
        default,
        rename = "certDuration",
        skip_serializing_if = "is_zero_i64"
    )]
    pub cert_duration_secs: i64,

    /// Negotiated TLS protocol version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_version: String,
    /// Negotiated cipher suite.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cipher_suite: String,
    /// An OCSP staple was presented during the handshake.
    #[serde(default, skip_serializing_if = "is_false")]
    pub ocsp_staple: bool,

    /// Derived severity of the finding.
    pub severity: Severity,
    /// Certificate material was successfully obtained.
    pub probe_ok: bool,
    /// Human-readable probe failure cause; set iff `probe_ok == false`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub probe_err: String,

    /// Tag identifying derived findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finding_type: Option<FindingType>,
    /// Free-form context (webhook failure policy, drift old/new, ...).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    /// Name of the TrustPolicy behind a POLICY_VIOLATION finding.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub policy_name: String,
    /// Chain-walk problems.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain_errors: Vec<String>,
    /// Revocation check issues, `"<TAG>: <detail>"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revocation_issues: Vec<String>,
    /// Connection posture issues (protocol, cipher, key material).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub posture_issues: Vec<String>,

    /// Raw DER chain as presented; never serialized.
    #[serde(skip)]
    pub raw_chain: Vec<Vec<u8>>,
    /// Raw stapled OCSP response; never serialized.
    #[serde(skip)]
    pub raw_staple: Option<Vec<u8>>,
}

impl CertFinding {
    /// An empty finding for the given source and name.
    #[must_use]
    pub fn new(source: SourceKind, name: impl Into<String>) -> Self {
        Self {
            source,
            namespace: None,
            name: name.into(),
            target: None,
            sni: None,
            cluster: None,
            not_after: None,
            issuer: String::new(),
            subject: String::new(),
            serial: String::new(),
            dns_names: Vec::new(),
            issuer_chain: Vec::new(),
            chain_len: 0,
            self_signed: false,
            is_ca: false,
            key_algorithm: String::new(),
            key_size: 0,
            signature_algorithm: String::new(),
            cert_duration_secs: 0,
            tls_version: String::new(),
            cipher_suite: String::new(),
            ocsp_staple: false,
            severity: Severity::Info,
            probe_ok: false,
            probe_err: String::new(),
            finding_type: None,
            notes: String::new(),
            policy_name: String::new(),
            chain_errors: Vec::new(),
            revocation_issues: Vec::new(),
            posture_issues: Vec::new(),
            raw_chain: Vec::new(),
            raw_staple: None,
        }
    }

    /// A finding recording a failed probe. Carries no certificate material.
    #[must_use]
    pub fn probe_failed(
        source: SourceKind,
        name: impl Into<String>,
        target: impl Into<String>,
        err: impl Into<String>,
    ) -> Self {
        let mut f = Self::new(source, name);
        f.target = Some(target.into());
        f.probe_err = err.into();
        f
    }

    /// Stable identity for drift comparison: `(source, namespace, name)`.
    #[must_use]
    pub fn drift_key(&self) -> (SourceKind, String, String) {
        (
            self.source,
            self.namespace.clone().unwrap_or_default(),
            self.name.clone(),
        )
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(b: &bool) -> bool {
    !*b
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_usize(n: &usize) -> bool {
    *n == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_u32(n: &u32) -> bool {
    *n == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_i64(n: &i64) -> bool {
    *n == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_are_omitted() {
        let f = CertFinding::probe_failed(
            SourceKind::Webhook,
            "validate.example.io",
            "tcp://webhook.default.svc:443",
            "dial: connection refused",
        );
        let json = serde_json::to_value(&f).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("notAfter"));
        assert!(!obj.contains_key("issuer"));
        assert!(!obj.contains_key("serial"));
        assert!(!obj.contains_key("rawChain"));
        assert_eq!(obj["probeOk"], serde_json::Value::Bool(false));
        assert_eq!(obj["probeErr"], "dial: connection refused");
        assert_eq!(obj["source"], "k8s.webhook");
    }

    #[test]
    fn finding_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&FindingType::DriftChanged).unwrap(),
            "\"DRIFT_CHANGED\""
        );
        assert_eq!(FindingType::PolicyViolation.as_str(), "POLICY_VIOLATION");
    }

    #[test]
    fn camel_case_field_names() {
        let mut f = CertFinding::new(SourceKind::External, "example.com");
        f.probe_ok = true;
        f.not_after = Some(chrono::Utc::now());
        f.tls_version = "TLS1.3".into();
        f.cert_duration_secs = 7776000;
        f.ocsp_staple = true;
        let json = serde_json::to_value(&f).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("notAfter"));
        assert!(obj.contains_key("tlsVersion"));
        assert!(obj.contains_key("certDuration"));
        assert!(obj.contains_key("ocspStaple"));
    }
}
