//! Drift detection against a baseline snapshot.

use std::collections::HashMap;

use trustwatch_core::{CertFinding, FindingType, Severity, Snapshot, SourceKind};

/// Compare current findings against a prior snapshot.
///
/// Keyed by `(source, namespace, name)`; only direct observations
/// participate (derived findings would re-report themselves forever).
/// `on_renewal` additionally emits DRIFT_CHANGED when only `notAfter`
/// moved, i.e. a renewal that kept serial and issuer.
#[must_use]
pub fn diff(baseline: &Snapshot, current: &[CertFinding], on_renewal: bool) -> Vec<CertFinding> {
    let base: HashMap<_, &CertFinding> = baseline
        .findings
        .iter()
        .filter(|f| f.finding_type.is_none())
        .map(|f| (f.drift_key(), f))
        .collect();
    let now: HashMap<_, &CertFinding> = current
        .iter()
        .filter(|f| f.finding_type.is_none())
        .map(|f| (f.drift_key(), f))
        .collect();

    let mut drifts = Vec::new();

    for (key, old) in &base {
        match now.get(key) {
            None => {
                let mut d = drift_finding(old, FindingType::DriftRemoved);
                d.notes = "present in baseline, missing now".to_string();
                drifts.push(d);
            }
            Some(new) => {
                if old.serial != new.serial || old.issuer != new.issuer {
                    let mut d = drift_finding(new, FindingType::DriftChanged);
                    d.notes = change_note(old, new);
                    drifts.push(d);
                } else if on_renewal && old.not_after != new.not_after {
                    let mut d = drift_finding(new, FindingType::DriftChanged);
                    d.notes = format!(
                        "notAfter changed old={} new={}",
                        fmt_time(old.not_after),
                        fmt_time(new.not_after)
                    );
                    drifts.push(d);
                }
            }
        }
    }

    for (key, new) in &now {
        if !base.contains_key(key) {
            let mut d = drift_finding(new, FindingType::DriftAdded);
            d.notes = "new since baseline".to_string();
            drifts.push(d);
        }
    }

    // Map iteration order is arbitrary; pin the output.
    drifts.sort_by(|a, b| {
        (a.source.as_str(), &a.namespace, &a.name).cmp(&(b.source.as_str(), &b.namespace, &b.name))
    });
    drifts
}

fn drift_finding(reference: &CertFinding, kind: FindingType) -> CertFinding {
    let mut d = CertFinding::new(reference.source, reference.name.clone());
    d.namespace.clone_from(&reference.namespace);
    d.probe_ok = true;
    d.not_after = reference.not_after;
    d.serial.clone_from(&reference.serial);
    d.issuer.clone_from(&reference.issuer);
    d.finding_type = Some(kind);
    d.severity = Severity::Warn;
    d
}

fn change_note(old: &CertFinding, new: &CertFinding) -> String {
    let mut parts = Vec::new();
    if old.serial != new.serial {
        parts.push(format!("serial changed old={} new={}", old.serial, new.serial));
    }
    if old.issuer != new.issuer {
        parts.push(format!("issuer changed old={:?} new={:?}", old.issuer, new.issuer));
    }
    parts.join("; ")
}

fn fmt_time(t: Option<chrono::DateTime<chrono::Utc>>) -> String {
    t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "none".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn observed(name: &str, serial: &str) -> CertFinding {
        let mut f = CertFinding::new(SourceKind::TlsSecret, name);
        f.namespace = Some("prod".to_string());
        f.probe_ok = true;
        f.serial = serial.to_string();
        f.issuer = "CN=Corp CA".to_string();
        f.not_after = Some(Utc::now() + Duration::days(60));
        f
    }

    fn snapshot(findings: Vec<CertFinding>) -> Snapshot {
        Snapshot {
            at: Utc::now(),
            findings,
            errors: std::collections::BTreeMap::new(),
        }
    }

    #[test]
    fn identical_inputs_emit_nothing() {
        let base = snapshot(vec![observed("a", "01"), observed("b", "02")]);
        let current = vec![observed("a", "01"), observed("b", "02")];
        assert!(diff(&base, &current, false).is_empty());
        assert!(diff(&base, &current, true).is_empty());
    }

    #[test]
    fn single_serial_change_emits_exactly_one_drift_changed() {
        let base = snapshot(vec![observed("a", "01"), observed("b", "02")]);
        let current = vec![observed("a", "01"), observed("b", "03")];

        let drifts = diff(&base, &current, false);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].finding_type, Some(FindingType::DriftChanged));
        assert_eq!(drifts[0].name, "b");
        assert!(drifts[0].notes.contains("serial changed"));
        assert_eq!(drifts[0].severity, Severity::Warn);
    }

    #[test]
    fn added_and_removed() {
        let base = snapshot(vec![observed("gone", "01")]);
        let current = vec![observed("fresh", "02")];

        let drifts = diff(&base, &current, false);
        assert_eq!(drifts.len(), 2);
        let removed = drifts
            .iter()
            .find(|d| d.finding_type == Some(FindingType::DriftRemoved))
            .unwrap();
        assert_eq!(removed.name, "gone");
        let added = drifts
            .iter()
            .find(|d| d.finding_type == Some(FindingType::DriftAdded))
            .unwrap();
        assert_eq!(added.name, "fresh");
    }

    #[test]
    fn renewal_only_drift_is_config_gated() {
        let mut renewed = observed("a", "01");
        renewed.not_after = Some(Utc::now() + Duration::days(120));
        let base = snapshot(vec![observed("a", "01")]);

        assert!(diff(&base, &[renewed.clone()], false).is_empty());

        let drifts = diff(&base, &[renewed], true);
        assert_eq!(drifts.len(), 1);
        assert!(drifts[0].notes.contains("notAfter changed"));
    }

    #[test]
    fn derived_findings_do_not_participate() {
        let mut derived = observed("a", "01");
        derived.finding_type = Some(FindingType::PolicyViolation);
        let base = snapshot(vec![]);
        assert!(diff(&base, &[derived], false).is_empty());
    }
}
