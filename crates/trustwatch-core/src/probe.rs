//! Probe capability: TLS dial + certificate extraction for a target URL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::CertFinding;

/// Everything a TLS probe learned about one target.
///
/// On failure only `probe_err` is populated; no partial certificate data
/// is ever returned.
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    /// Handshake succeeded and a peer certificate was extracted.
    pub probe_ok: bool,
    /// Failure cause when `probe_ok == false`.
    pub probe_err: String,

    /// Leaf expiry.
    pub not_after: Option<DateTime<Utc>>,
    /// Leaf validity start.
    pub not_before: Option<DateTime<Utc>>,
    /// Issuer DN of the leaf.
    pub issuer: String,
    /// Subject DN of the leaf.
    pub subject: String,
    /// Leaf serial (hex, lowercase).
    pub serial: String,
    /// DNS subject alternative names.
    pub dns_names: Vec<String>,
    /// Issuer DNs walking up the presented chain.
    pub issuer_chain: Vec<String>,
    /// Number of certificates presented.
    pub chain_len: usize,
    /// Leaf subject equals issuer.
    pub self_signed: bool,
    /// Leaf has CA basic constraints.
    pub is_ca: bool,
    /// Public key algorithm.
    pub key_algorithm: String,
    /// Public key bits.
    pub key_size: u32,
    /// Signature algorithm name.
    pub signature_algorithm: String,
    /// Leaf validity span in seconds.
    pub cert_duration_secs: i64,

    /// Negotiated protocol version.
    pub tls_version: String,
    /// Negotiated cipher suite.
    pub cipher_suite: String,

    /// Chain-walk problems found during extraction.
    pub chain_errors: Vec<String>,
    /// Connection-posture problems (legacy protocol, weak key material).
    pub posture_issues: Vec<String>,
    /// Raw DER chain as presented by the peer.
    pub raw_chain: Vec<Vec<u8>>,
    /// Raw stapled OCSP response, when one was presented.
    pub raw_staple: Option<Vec<u8>>,
}

impl ProbeReport {
    /// A report for a probe that never produced certificate material.
    #[must_use]
    pub fn failed(err: impl Into<String>) -> Self {
        Self {
            probe_err: err.into(),
            ..Self::default()
        }
    }

    /// Copy this report's observations onto a finding.
    pub fn apply_to(&self, f: &mut CertFinding) {
        f.probe_ok = self.probe_ok;
        f.probe_err.clone_from(&self.probe_err);
        if !self.probe_ok {
            return;
        }
        f.not_after = self.not_after;
        f.issuer.clone_from(&self.issuer);
        f.subject.clone_from(&self.subject);
        f.serial.clone_from(&self.serial);
        f.dns_names.clone_from(&self.dns_names);
        f.issuer_chain.clone_from(&self.issuer_chain);
        f.chain_len = self.chain_len;
        f.self_signed = self.self_signed;
        f.is_ca = self.is_ca;
        f.key_algorithm.clone_from(&self.key_algorithm);
        f.key_size = self.key_size;
        f.signature_algorithm.clone_from(&self.signature_algorithm);
        f.cert_duration_secs = self.cert_duration_secs;
        f.tls_version.clone_from(&self.tls_version);
        f.cipher_suite.clone_from(&self.cipher_suite);
        f.ocsp_staple = self.raw_staple.is_some();
        f.chain_errors.clone_from(&self.chain_errors);
        f.posture_issues.clone_from(&self.posture_issues);
        f.raw_chain.clone_from(&self.raw_chain);
        f.raw_staple.clone_from(&self.raw_staple);
    }
}

/// Strategy object for probing targets.
///
/// Discoverers receive a prober at construction; the default implementation
/// dials directly, the tunnel relay substitutes a SOCKS-dialling one.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe a target URL (`tcp://host:port[?sni=name]`,
    /// `https://host[:port]`) and report what was observed.
    async fn probe(&self, target: &str) -> ProbeReport;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;

    #[test]
    fn failed_report_leaves_cert_fields_empty() {
        let report = ProbeReport::failed("dial: no route to host");
        let mut f = CertFinding::new(SourceKind::Annotation, "svc");
        report.apply_to(&mut f);

        assert!(!f.probe_ok);
        assert_eq!(f.probe_err, "dial: no route to host");
        assert!(f.not_after.is_none());
        assert!(f.serial.is_empty());
        assert!(f.raw_chain.is_empty());
    }

    #[test]
    fn successful_report_copies_material() {
        let report = ProbeReport {
            probe_ok: true,
            not_after: Some(Utc::now()),
            issuer: "CN=Test CA".into(),
            subject: "CN=svc.default.svc".into(),
            serial: "1f".into(),
            chain_len: 2,
            tls_version: "TLS1.3".into(),
            raw_staple: Some(vec![0x30]),
            ..ProbeReport::default()
        };
        let mut f = CertFinding::new(SourceKind::Annotation, "svc");
        report.apply_to(&mut f);

        assert!(f.probe_ok);
        assert_eq!(f.issuer, "CN=Test CA");
        assert_eq!(f.chain_len, 2);
        assert!(f.ocsp_staple);
    }
}
