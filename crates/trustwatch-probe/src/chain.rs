//! Chain-walk analysis over a presented certificate chain.

use chrono::{DateTime, Utc};

use crate::cert::ParsedCert;

/// Walk a parsed chain (leaf first) and report structural problems.
///
/// Leaf expiry is the severity model's concern, not a chain error; only
/// non-leaf expiry is flagged here.
#[must_use]
pub fn analyze(chain: &[ParsedCert], now: DateTime<Utc>) -> Vec<String> {
    let mut errors = Vec::new();
    if chain.is_empty() {
        return errors;
    }

    for (i, pair) in chain.windows(2).enumerate() {
        if pair[0].issuer != pair[1].subject {
            errors.push(format!(
                "chain discontinuity at [{i}]: issuer {:?} != next subject {:?}",
                pair[0].issuer, pair[1].subject
            ));
        }
    }

    for (i, cert) in chain.iter().enumerate().skip(1) {
        if cert.not_after < now {
            errors.push(format!(
                "chain[{i}] expired {}: {}",
                cert.not_after.format("%Y-%m-%d"),
                cert.subject
            ));
        }
        if !cert.is_ca {
            errors.push(format!(
                "chain[{i}] is not a CA certificate: {}",
                cert.subject
            ));
        }
    }

    let leaf = &chain[0];
    if !leaf.is_ca && leaf.dns_names.is_empty() {
        errors.push("leaf has no DNS subject alternative names".to_string());
    }

    errors
}
