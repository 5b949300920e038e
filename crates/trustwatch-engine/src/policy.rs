//! Policy evaluation over findings.

use trustwatch_core::{CertFinding, FindingType, Severity, SourceKind};
use trustwatch_discover::{PolicyRule, RuleType, TrustPolicy};

/// Evaluate every `(policy, rule, finding)` triple; one violation finding
/// per hit.
///
/// Only findings with certificate material (`probe_ok`) are evaluated;
/// failed probes never produce violations.
#[must_use]
pub fn evaluate(policies: &[TrustPolicy], findings: &[CertFinding]) -> Vec<CertFinding> {
    let mut violations = Vec::new();
    for policy in policies {
        for rule in &policy.spec.rules {
            for finding in findings.iter().filter(|f| f.probe_ok) {
                if let Some(reason) = rule_violation(rule, finding) {
                    violations.push(violation_finding(policy, rule, finding, &reason));
                }
            }
        }
    }
    violations
}

/// Why a finding violates a rule, or `None` when it passes.
#[must_use]
pub fn rule_violation(rule: &PolicyRule, f: &CertFinding) -> Option<String> {
    match rule.rule_type {
        RuleType::MinKeySize => {
            let min_bits = rule.min_bits.unwrap_or(2048);
            (f.key_size > 0 && f.key_size < min_bits).then(|| {
                format!("key size {} below minimum {min_bits}", f.key_size)
            })
        }
        RuleType::NoSha1 => {
            let alg = f.signature_algorithm.to_lowercase();
            (alg.contains("sha1") || alg.contains("sha-1"))
                .then(|| format!("signature algorithm {} uses SHA-1", f.signature_algorithm))
        }
        RuleType::RequiredIssuer => {
            let wanted = rule.issuer.as_deref()?;
            (!f.issuer.contains(wanted))
                .then(|| format!("issuer {:?} does not contain {wanted:?}", f.issuer))
        }
        RuleType::NoSelfSigned => f
            .self_signed
            .then(|| "certificate is self-signed".to_string()),
        RuleType::Unknown => None,
    }
}

fn violation_finding(
    policy: &TrustPolicy,
    rule: &PolicyRule,
    offender: &CertFinding,
    reason: &str,
) -> CertFinding {
    let mut v = CertFinding::new(SourceKind::Policy, offender.name.clone());
    v.namespace.clone_from(&offender.namespace);
    v.target.clone_from(&offender.target);
    v.not_after = offender.not_after;
    v.probe_ok = true;
    v.finding_type = Some(FindingType::PolicyViolation);
    v.policy_name.clone_from(&policy.name);
    v.severity = rule.severity.unwrap_or(Severity::Warn);
    v.notes = format!("{}: {reason}", rule.name);
    v
}
