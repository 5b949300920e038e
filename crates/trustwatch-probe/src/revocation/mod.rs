//! Revocation checking: OCSP staples, AIA responders, CRLs.
//!
//! Results are non-fatal quality signals: string issues of the form
//! `"<TAG>: <detail>"` appended to a finding's `revocation_issues`.
//! Tags: `CERT_REVOKED`, `OCSP_UNREACHABLE`, `OCSP_STAPLE_INVALID`,
//! `CRL_STALE`, `REVOCATION_UNKNOWN`.

pub mod cache;
pub mod crl;
pub mod ocsp;

use chrono::{DateTime, Utc};
use tracing::debug;

use trustwatch_core::CertFinding;

pub use cache::TtlCache;
pub use crl::CrlChecker;
pub use ocsp::OcspVerdict;

/// Runs the full revocation pass over findings that carry raw chains.
#[derive(Debug)]
pub struct RevocationChecker {
    client: reqwest::Client,
    crl: CrlChecker,
}

impl Default for RevocationChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl RevocationChecker {
    /// A checker with its own HTTP client and CRL cache.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::new();
        Self {
            crl: CrlChecker::new(client.clone()),
            client,
        }
    }

    /// Check one finding in place, appending any issues found.
    ///
    /// Findings without raw chain material (failed probes, derived
    /// findings) are left untouched.
    pub async fn check_finding(&self, finding: &mut CertFinding, now: DateTime<Utc>) {
        if !finding.probe_ok || finding.raw_chain.is_empty() {
            return;
        }
        let leaf = finding.raw_chain[0].clone();
        let issuer = finding.raw_chain.get(1).cloned();

        // Stapled response wins over an AIA round trip.
        if let Some(staple) = finding.raw_staple.clone() {
            if let Some(issue) = ocsp::check_staple(&staple, now) {
                finding.revocation_issues.push(issue);
            }
        } else if let Some(issuer_der) = issuer {
            for url in ocsp::responder_urls(&leaf) {
                match ocsp::build_request(&leaf, &issuer_der) {
                    Ok(request) => {
                        match ocsp::query_responder(&self.client, &url, request).await {
                            Ok(OcspVerdict::Revoked) => finding.revocation_issues.push(format!(
                                "CERT_REVOKED: OCSP responder {url} reports revoked"
                            )),
                            Ok(OcspVerdict::Unknown) => finding.revocation_issues.push(format!(
                                "REVOCATION_UNKNOWN: OCSP responder {url} does not know the cert"
                            )),
                            Ok(OcspVerdict::Good { .. }) => {
                                debug!(url = %url, name = %finding.name, "ocsp good");
                            }
                            Err(e) => finding
                                .revocation_issues
                                .push(format!("OCSP_UNREACHABLE: {e}")),
                        }
                    }
                    Err(e) => finding
                        .revocation_issues
                        .push(format!("OCSP_UNREACHABLE: request build: {e}")),
                }
            }
        }

        let crl_issues = self.crl.check_leaf(&leaf, &finding.serial, now).await;
        finding.revocation_issues.extend(crl_issues);
    }
}
