//! Connection-posture checks over a probe report.

use trustwatch_core::ProbeReport;

/// RSA below this many bits is flagged.
const MIN_RSA_BITS: u32 = 2048;

/// Posture issues for a successful probe: legacy protocol, weak key
/// material, weak signature. Empty for clean modern endpoints.
#[must_use]
pub fn check(report: &ProbeReport) -> Vec<String> {
    let mut issues = Vec::new();
    if !report.probe_ok {
        return issues;
    }

    if matches!(report.tls_version.as_str(), "TLS1.0" | "TLS1.1") {
        issues.push(format!("LEGACY_TLS: negotiated {}", report.tls_version));
    }
    if report.key_algorithm == "RSA" && report.key_size > 0 && report.key_size < MIN_RSA_BITS {
        issues.push(format!(
            "WEAK_KEY: RSA {} bits below {MIN_RSA_BITS}",
            report.key_size
        ));
    }
    let alg = report.signature_algorithm.to_lowercase();
    if alg.contains("sha1") || alg.contains("md5") {
        issues.push(format!(
            "WEAK_SIGNATURE: {}",
            report.signature_algorithm
        ));
    }
    issues
}
