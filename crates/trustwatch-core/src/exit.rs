//! Snapshot -> process exit code mapping.

use chrono::{DateTime, Duration, Utc};

use crate::types::{Severity, Snapshot};

/// Exit code for a degraded scan: discovery errors or failed probes.
pub const EXIT_DEGRADED: i32 = 3;
/// Exit code when a Critical finding clears the threshold.
pub const EXIT_CRITICAL: i32 = 2;
/// Exit code when any finding clears the threshold.
pub const EXIT_THRESHOLD: i32 = 1;
/// All clear.
pub const EXIT_OK: i32 = 0;

/// Map a snapshot to a process exit code under a threshold severity.
///
/// - any discovery error or failed probe -> 3
/// - else any Critical finding at or above the threshold -> 2
/// - else any finding at or above the threshold -> 1
/// - else 0
///
/// Monotone in the threshold: lowering it never lowers the exit code.
#[must_use]
pub fn exit_code(snapshot: &Snapshot, threshold: Severity) -> i32 {
    if !snapshot.errors.is_empty() || snapshot.findings.iter().any(|f| !f.probe_ok) {
        return EXIT_DEGRADED;
    }
    if snapshot
        .findings
        .iter()
        .any(|f| f.severity == Severity::Critical && f.severity >= threshold)
    {
        return EXIT_CRITICAL;
    }
    if snapshot.findings.iter().any(|f| f.severity >= threshold) {
        return EXIT_THRESHOLD;
    }
    EXIT_OK
}

/// Escalate soon-to-expire findings to Critical before exit-code mapping.
///
/// Touches only findings with `probe_ok`, a present `not_after`, and
/// `not_after < now + window`; all others are unchanged. This is the single
/// severity reclassification pass a finding may receive after discovery.
pub fn escalate_deploy_window(snapshot: &mut Snapshot, now: DateTime<Utc>, window: Duration) {
    for f in &mut snapshot.findings {
        if f.probe_ok && f.not_after.is_some_and(|na| na < now + window) {
            f.severity = Severity::Critical;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CertFinding, SourceKind};

    fn snap(sevs: &[Severity]) -> Snapshot {
        let findings = sevs
            .iter()
            .map(|&s| {
                let mut f = CertFinding::new(SourceKind::External, "t");
                f.probe_ok = true;
                f.not_after = Some(Utc::now() + Duration::days(90));
                f.severity = s;
                f
            })
            .collect();
        Snapshot {
            at: Utc::now(),
            findings,
            errors: std::collections::BTreeMap::new(),
        }
    }

    #[test]
    fn gating_scenarios() {
        let s = snap(&[Severity::Warn, Severity::Critical]);
        assert_eq!(exit_code(&s, Severity::Warn), 2);
        assert_eq!(exit_code(&s, Severity::Critical), 2);

        let warn_only = snap(&[Severity::Warn]);
        assert_eq!(exit_code(&warn_only, Severity::Critical), 0);
        assert_eq!(exit_code(&warn_only, Severity::Warn), 1);
        assert_eq!(exit_code(&snap(&[]), Severity::Info), 0);
    }

    #[test]
    fn probe_failure_is_always_degraded() {
        let mut s = snap(&[Severity::Info]);
        s.findings.push(CertFinding::probe_failed(
            SourceKind::Webhook,
            "hook",
            "tcp://hook.default.svc:443",
            "handshake timeout",
        ));
        assert_eq!(exit_code(&s, Severity::Critical), 3);
        assert_eq!(exit_code(&s, Severity::Info), 3);
    }

    #[test]
    fn discovery_error_is_degraded() {
        let mut s = snap(&[]);
        s.errors
            .insert("k8s.webhook".into(), "list webhooks: forbidden".into());
        assert_eq!(exit_code(&s, Severity::Critical), 3);
    }

    #[test]
    fn exit_code_is_monotone_in_threshold() {
        let cases = [
            snap(&[]),
            snap(&[Severity::Info]),
            snap(&[Severity::Warn]),
            snap(&[Severity::Warn, Severity::Critical]),
        ];
        for s in &cases {
            let at_info = exit_code(s, Severity::Info);
            let at_warn = exit_code(s, Severity::Warn);
            let at_crit = exit_code(s, Severity::Critical);
            assert!(at_info >= at_warn);
            assert!(at_warn >= at_crit);
        }
    }

    #[test]
    fn deploy_window_escalates_only_matching_findings() {
        let now = Utc::now();
        let mut s = snap(&[Severity::Info, Severity::Info]);
        s.findings[0].not_after = Some(now + Duration::hours(24));
        s.findings[1].not_after = Some(now + Duration::days(300));
        // A failed probe has no expiry and must stay untouched.
        s.findings.push(CertFinding::probe_failed(
            SourceKind::External,
            "down",
            "tcp://down:443",
            "dial timeout",
        ));

        escalate_deploy_window(&mut s, now, Duration::hours(48));

        assert_eq!(s.findings[0].severity, Severity::Critical);
        assert_eq!(s.findings[1].severity, Severity::Info);
        assert_eq!(s.findings[2].severity, Severity::Info);
    }
}
