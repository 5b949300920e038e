//! Rotation hygiene: certificate lifetimes below the minimum for their role.
//!
//! Leaves rotate as fast as they like. Intermediates and trust anchors that
//! rotate too fast churn every dependent chain with them.

use chrono::Duration;

use trustwatch_core::{CertFinding, FindingType, Severity};

/// Role of a certificate in the trust hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertRole {
    /// Self-signed root or anything tagged a trust anchor.
    TrustAnchor,
    /// CA certificate or an identity issuer.
    Intermediate,
    /// Everything else.
    Leaf,
}

impl CertRole {
    /// Minimum sane lifetime for the role; `None` means unconstrained.
    #[must_use]
    pub fn min_lifetime(self) -> Option<Duration> {
        match self {
            Self::TrustAnchor => Some(Duration::days(365)),
            Self::Intermediate => Some(Duration::days(30)),
            Self::Leaf => None,
        }
    }
}

/// Classify a finding's role from its material and notes.
#[must_use]
pub fn role_of(f: &CertFinding) -> CertRole {
    if f.self_signed || f.notes.contains("trust anchor") {
        CertRole::TrustAnchor
    } else if f.is_ca || f.notes.contains("identity issuer") {
        CertRole::Intermediate
    } else {
        CertRole::Leaf
    }
}

/// Emit EXCESSIVE_ROTATION findings for short-lived anchors/intermediates.
#[must_use]
pub fn check(findings: &[CertFinding]) -> Vec<CertFinding> {
    let mut out = Vec::new();
    for f in findings {
        if !f.probe_ok || f.cert_duration_secs <= 0 || f.finding_type.is_some() {
            continue;
        }
        let role = role_of(f);
        let Some(min) = role.min_lifetime() else {
            continue;
        };
        let lifetime = Duration::seconds(f.cert_duration_secs);
        if lifetime < min {
            let mut r = CertFinding::new(f.source, f.name.clone());
            r.namespace.clone_from(&f.namespace);
            r.probe_ok = true;
            r.not_after = f.not_after;
            r.finding_type = Some(FindingType::ExcessiveRotation);
            r.severity = Severity::Warn;
            r.notes = format!(
                "lifetime {}d below minimum {}d for {}",
                lifetime.num_days(),
                min.num_days(),
                match role {
                    CertRole::TrustAnchor => "trust anchor",
                    CertRole::Intermediate => "intermediate",
                    CertRole::Leaf => "leaf",
                }
            );
            out.push(r);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustwatch_core::SourceKind;

    fn finding(days: i64, self_signed: bool, is_ca: bool, notes: &str) -> CertFinding {
        let mut f = CertFinding::new(SourceKind::TlsSecret, "cert");
        f.probe_ok = true;
        f.cert_duration_secs = days * 86_400;
        f.self_signed = self_signed;
        f.is_ca = is_ca;
        f.notes = notes.to_string();
        f
    }

    #[test]
    fn role_classification() {
        assert_eq!(role_of(&finding(10, true, false, "")), CertRole::TrustAnchor);
        assert_eq!(
            role_of(&finding(10, false, false, "trust anchor")),
            CertRole::TrustAnchor
        );
        assert_eq!(role_of(&finding(10, false, true, "")), CertRole::Intermediate);
        assert_eq!(
            role_of(&finding(10, false, false, "identity issuer")),
            CertRole::Intermediate
        );
        assert_eq!(role_of(&finding(10, false, false, "")), CertRole::Leaf);
    }

    #[test]
    fn short_lived_anchor_is_flagged() {
        let findings = vec![finding(90, true, true, "")];
        let out = check(&findings);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].finding_type, Some(FindingType::ExcessiveRotation));
        assert!(out[0].notes.contains("trust anchor"));
    }

    #[test]
    fn short_lived_leaf_is_fine() {
        // 24h leaves are normal in mesh deployments.
        assert!(check(&[finding(1, false, false, "")]).is_empty());
    }

    #[test]
    fn long_lived_intermediate_is_fine() {
        assert!(check(&[finding(365, false, true, "")]).is_empty());
    }

    #[test]
    fn unknown_duration_is_skipped() {
        let mut f = finding(90, true, false, "");
        f.cert_duration_secs = 0;
        assert!(check(&[f]).is_empty());
    }
}
