//! Scan orchestration: concurrent discovery, severity assignment, and the
//! enrichment pipeline.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use trustwatch_core::{classify, CertFinding, Discoverer, Severity, Snapshot};
use trustwatch_probe::cert::normalize_serial;
use trustwatch_probe::RevocationChecker;
use trustwatch_discover::TrustPolicy;

use crate::ct::CtChecker;
use crate::{drift, policy, rotation};

/// Drift comparison inputs.
#[derive(Debug)]
pub struct DriftOptions {
    /// The prior snapshot to compare against.
    pub baseline: Snapshot,
    /// Emit DRIFT_CHANGED on notAfter-only changes.
    pub on_renewal: bool,
}

/// Optional enrichment passes, applied in a fixed order after discovery:
/// revocation, CT, drift, policy, rotation.
#[derive(Default)]
pub struct Enrichers {
    /// OCSP/CRL checking.
    pub revocation: Option<RevocationChecker>,
    /// CT log classification.
    pub ct: Option<CtChecker>,
    /// Baseline drift comparison.
    pub drift: Option<DriftOptions>,
    /// Policy rule evaluation.
    pub policies: Vec<TrustPolicy>,
    /// Rotation hygiene checks.
    pub rotation: bool,
}

/// Coordinates discovery, probing, and enrichment into a single snapshot.
///
/// Individual discoverers may fail; the orchestrator never does.
pub struct Orchestrator {
    discoverers: Vec<Arc<dyn Discoverer>>,
    warn_before: Duration,
    crit_before: Duration,
    per_discoverer_timeout: Option<StdDuration>,
    enrichers: Enrichers,
}

impl Orchestrator {
    /// An orchestrator with an empty registry and no enrichers.
    #[must_use]
    pub fn new(warn_before: Duration, crit_before: Duration) -> Self {
        Self {
            discoverers: Vec::new(),
            warn_before,
            crit_before,
            per_discoverer_timeout: None,
            enrichers: Enrichers::default(),
        }
    }

    /// Register a discoverer. Merge order equals registration order.
    pub fn register(&mut self, discoverer: Arc<dyn Discoverer>) -> &mut Self {
        self.discoverers.push(discoverer);
        self
    }

    /// Bound each discoverer's runtime; overruns become discoverer errors.
    pub fn with_timeout(&mut self, timeout: StdDuration) -> &mut Self {
        self.per_discoverer_timeout = Some(timeout);
        self
    }

    /// Install the enrichment passes.
    pub fn with_enrichers(&mut self, enrichers: Enrichers) -> &mut Self {
        self.enrichers = enrichers;
        self
    }

    /// Run one full scan.
    pub async fn run(&self) -> Snapshot {
        let at = Utc::now();

        // Fan out one task per discoverer; collect in registration order.
        let handles: Vec<_> = self
            .discoverers
            .iter()
            .map(|d| {
                let d = Arc::clone(d);
                let timeout = self.per_discoverer_timeout;
                tokio::spawn(async move {
                    let name = d.name().to_string();
                    let outcome = match timeout {
                        Some(t) => match tokio::time::timeout(t, d.discover()).await {
                            Ok(outcome) => outcome,
                            Err(_) => trustwatch_core::DiscoveryOutcome::fail(format!(
                                "timed out after {}s",
                                t.as_secs()
                            )),
                        },
                        None => d.discover().await,
                    };
                    (name, outcome)
                })
            })
            .collect();

        let names: Vec<String> = self.discoverers.iter().map(|d| d.name().to_string()).collect();
        let mut findings: Vec<CertFinding> = Vec::new();
        let mut errors: BTreeMap<String, String> = BTreeMap::new();

        for (handle, fallback_name) in handles.into_iter().zip(names) {
            match handle.await {
                Ok((name, outcome)) => {
                    debug!(
                        discoverer = %name,
                        findings = outcome.findings.len(),
                        error = outcome.error.as_deref().unwrap_or(""),
                        "discoverer finished"
                    );
                    if let Some(e) = outcome.error {
                        errors.insert(name, e);
                    }
                    // Best-effort: partial findings survive their error.
                    findings.extend(outcome.findings);
                }
                Err(join_err) => {
                    warn!(discoverer = %fallback_name, error = %join_err, "discoverer task died");
                    errors.insert(fallback_name, format!("task failed: {join_err}"));
                }
            }
        }

        // Severity from the expiry windows; derived findings keep the
        // severity their producer chose.
        for f in &mut findings {
            if f.probe_ok && f.finding_type.is_none() {
                if let Some(na) = f.not_after {
                    f.severity = classify(at, na, self.warn_before, self.crit_before);
                }
            }
        }

        // Enrichment passes, strictly in order.
        if let Some(revocation) = &self.enrichers.revocation {
            for f in &mut findings {
                revocation.check_finding(f, at).await;
            }
        }

        if let Some(ct) = &self.enrichers.ct {
            let known: HashSet<String> = findings
                .iter()
                .filter(|f| !f.serial.is_empty())
                .map(|f| normalize_serial(&f.serial))
                .collect();
            match ct.check(&known).await {
                Ok(ct_findings) => findings.extend(ct_findings),
                Err(e) => {
                    errors.insert("ct".to_string(), e);
                }
            }
        }

        if let Some(options) = &self.enrichers.drift {
            let drifts = drift::diff(&options.baseline, &findings, options.on_renewal);
            findings.extend(drifts);
        }

        let violations = policy::evaluate(&self.enrichers.policies, &findings);
        findings.extend(violations);

        if self.enrichers.rotation {
            let rotations = rotation::check(&findings);
            findings.extend(rotations);
        }

        Snapshot { at, findings, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use trustwatch_core::{DiscoveryOutcome, FindingType, SourceKind};

    struct FakeDiscoverer {
        name: &'static str,
        findings: Vec<CertFinding>,
        error: Option<String>,
        delay: StdDuration,
    }

    impl FakeDiscoverer {
        fn new(name: &'static str, findings: Vec<CertFinding>) -> Self {
            Self {
                name,
                findings,
                error: None,
                delay: StdDuration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Discoverer for FakeDiscoverer {
        fn name(&self) -> &str {
            self.name
        }

        async fn discover(&self) -> DiscoveryOutcome {
            tokio::time::sleep(self.delay).await;
            DiscoveryOutcome {
                findings: self.findings.clone(),
                error: self.error.clone(),
            }
        }
    }

    fn finding(name: &str, hours_left: i64) -> CertFinding {
        let mut f = CertFinding::new(SourceKind::External, name);
        f.probe_ok = true;
        f.not_after = Some(Utc::now() + Duration::hours(hours_left));
        f
    }

    fn windows() -> (Duration, Duration) {
        (Duration::hours(720), Duration::hours(336))
    }

    #[tokio::test]
    async fn merge_preserves_registration_order() {
        let (warn, crit) = windows();
        let mut orch = Orchestrator::new(warn, crit);
        // The slower discoverer registers first and must still merge first.
        let mut slow = FakeDiscoverer::new("slow", vec![finding("s1", 5000), finding("s2", 5000)]);
        slow.delay = StdDuration::from_millis(50);
        orch.register(Arc::new(slow));
        orch.register(Arc::new(FakeDiscoverer::new("fast", vec![finding("f1", 5000)])));

        let snap = orch.run().await;
        let names: Vec<&str> = snap.findings.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["s1", "s2", "f1"]);
        assert!(snap.errors.is_empty());
    }

    #[tokio::test]
    async fn severity_is_assigned_from_the_windows() {
        let (warn, crit) = windows();
        let mut orch = Orchestrator::new(warn, crit);
        orch.register(Arc::new(FakeDiscoverer::new(
            "d",
            vec![
                finding("critical", 100),
                finding("warn", 500),
                finding("info", 2000),
            ],
        )));

        let snap = orch.run().await;
        let sevs: Vec<Severity> = snap.findings.iter().map(|f| f.severity).collect();
        assert_eq!(sevs, vec![Severity::Critical, Severity::Warn, Severity::Info]);
    }

    #[tokio::test]
    async fn derived_findings_keep_their_severity() {
        let (warn, crit) = windows();
        let mut orch = Orchestrator::new(warn, crit);
        // Managed-expiry findings are informational even when expiry is near.
        let mut managed = finding("renewing", 100);
        managed.finding_type = Some(FindingType::ManagedExpiry);
        managed.severity = Severity::Info;
        orch.register(Arc::new(FakeDiscoverer::new("certmanager", vec![managed])));

        let snap = orch.run().await;
        assert_eq!(snap.findings[0].severity, Severity::Info);
    }

    #[tokio::test]
    async fn failed_discoverer_keeps_partial_findings() {
        let (warn, crit) = windows();
        let mut orch = Orchestrator::new(warn, crit);
        let mut partial = FakeDiscoverer::new("flaky", vec![finding("kept", 5000)]);
        partial.error = Some("list page 2: forbidden".to_string());
        orch.register(Arc::new(partial));
        orch.register(Arc::new(FakeDiscoverer::new("ok", vec![finding("also", 5000)])));

        let snap = orch.run().await;
        assert_eq!(snap.findings.len(), 2);
        assert_eq!(
            snap.errors.get("flaky").map(String::as_str),
            Some("list page 2: forbidden")
        );
    }

    #[tokio::test]
    async fn slow_discoverer_times_out_into_an_error() {
        let (warn, crit) = windows();
        let mut orch = Orchestrator::new(warn, crit);
        let mut slow = FakeDiscoverer::new("stuck", vec![finding("never", 5000)]);
        slow.delay = StdDuration::from_secs(5);
        orch.register(Arc::new(slow));
        orch.with_timeout(StdDuration::from_millis(50));

        let snap = orch.run().await;
        assert!(snap.findings.is_empty());
        assert!(snap.errors.get("stuck").unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn policy_enrichment_appends_violations() {
        use trustwatch_discover::{PolicyRule, RuleType, TrustPolicySpec};

        let (warn, crit) = windows();
        let mut orch = Orchestrator::new(warn, crit);
        let mut weak = finding("weak", 5000);
        weak.key_size = 1024;
        weak.key_algorithm = "RSA".to_string();
        orch.register(Arc::new(FakeDiscoverer::new("d", vec![weak])));
        orch.with_enrichers(Enrichers {
            policies: vec![TrustPolicy {
                name: "baseline".to_string(),
                namespace: None,
                spec: TrustPolicySpec {
                    targets: Vec::new(),
                    thresholds: None,
                    rules: vec![PolicyRule {
                        name: "modern-keys".to_string(),
                        rule_type: RuleType::MinKeySize,
                        min_bits: Some(2048),
                        ..PolicyRule::default()
                    }],
                },
            }],
            ..Enrichers::default()
        });

        let snap = orch.run().await;
        assert_eq!(snap.findings.len(), 2);
        assert_eq!(
            snap.findings[1].finding_type,
            Some(FindingType::PolicyViolation)
        );
        // The direct observation comes first: enrichers only append.
        assert!(snap.findings[0].finding_type.is_none());
    }

    #[tokio::test]
    async fn drift_runs_before_policy_and_rotation_last() {
        let (warn, crit) = windows();
        let mut orch = Orchestrator::new(warn, crit);

        // A short-lived self-signed cert that also drifted.
        let mut anchor = finding("anchor", 5000);
        anchor.self_signed = true;
        anchor.serial = "02".to_string();
        anchor.cert_duration_secs = 86_400 * 30;
        orch.register(Arc::new(FakeDiscoverer::new("d", vec![anchor.clone()])));

        let mut old = anchor.clone();
        old.serial = "01".to_string();
        let baseline = Snapshot {
            at: Utc::now(),
            findings: vec![old],
            errors: BTreeMap::new(),
        };

        orch.with_enrichers(Enrichers {
            drift: Some(DriftOptions {
                baseline,
                on_renewal: false,
            }),
            rotation: true,
            ..Enrichers::default()
        });

        let snap = orch.run().await;
        let types: Vec<Option<FindingType>> =
            snap.findings.iter().map(|f| f.finding_type).collect();
        assert_eq!(
            types,
            vec![
                None,
                Some(FindingType::DriftChanged),
                Some(FindingType::ExcessiveRotation),
            ]
        );
    }

    #[tokio::test]
    async fn empty_registry_yields_an_empty_snapshot() {
        let (warn, crit) = windows();
        let orch = Orchestrator::new(warn, crit);
        let snap = orch.run().await;
        assert!(snap.findings.is_empty());
        assert!(snap.errors.is_empty());
    }
}
