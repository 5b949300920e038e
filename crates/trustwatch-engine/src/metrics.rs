//! Prometheus metrics over the most recent snapshot.

use std::sync::Mutex;

use prometheus::{Encoder, Gauge, GaugeVec, IntGaugeVec, Opts, Registry, TextEncoder};

use trustwatch_core::{Severity, Snapshot};

use crate::error::Result;

/// Collects snapshot-derived gauges under the `trustwatch_` prefix.
///
/// Every update resets all vectors before setting fresh values so findings
/// that disappear never leave stale series behind.
pub struct MetricsCollector {
    registry: Registry,
    not_after: GaugeVec,
    expires_in: GaugeVec,
    probe_success: GaugeVec,
    findings_total: IntGaugeVec,
    scan_duration: Gauge,
    discovery_errors: IntGaugeVec,
    update_lock: Mutex<()>,
}

impl MetricsCollector {
    /// Build and register every metric.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let not_after = GaugeVec::new(
            Opts::new(
                "trustwatch_cert_not_after_timestamp",
                "Certificate expiry as a unix timestamp",
            ),
            &["source", "namespace", "name", "severity"],
        )?;
        let expires_in = GaugeVec::new(
            Opts::new(
                "trustwatch_cert_expires_in_seconds",
                "Seconds until certificate expiry",
            ),
            &["source", "namespace", "name", "severity"],
        )?;
        let probe_success = GaugeVec::new(
            Opts::new("trustwatch_probe_success", "1 when the probe succeeded"),
            &["source", "namespace", "name"],
        )?;
        let findings_total = IntGaugeVec::new(
            Opts::new("trustwatch_findings_total", "Findings per severity"),
            &["severity"],
        )?;
        let scan_duration = Gauge::new(
            "trustwatch_scan_duration_seconds",
            "Duration of the most recent scan",
        )?;
        let discovery_errors = IntGaugeVec::new(
            Opts::new(
                "trustwatch_discovery_errors_total",
                "Discoverers that errored in the most recent scan",
            ),
            &["source"],
        )?;

        registry.register(Box::new(not_after.clone()))?;
        registry.register(Box::new(expires_in.clone()))?;
        registry.register(Box::new(probe_success.clone()))?;
        registry.register(Box::new(findings_total.clone()))?;
        registry.register(Box::new(scan_duration.clone()))?;
        registry.register(Box::new(discovery_errors.clone()))?;

        Ok(Self {
            registry,
            not_after,
            expires_in,
            probe_success,
            findings_total,
            scan_duration,
            discovery_errors,
            update_lock: Mutex::new(()),
        })
    }

    /// Replace every series with values from this snapshot.
    #[allow(clippy::cast_precision_loss)]
    pub fn update(&self, snapshot: &Snapshot, scan_duration_secs: f64) {
        let _guard = self.update_lock.lock();

        self.not_after.reset();
        self.expires_in.reset();
        self.probe_success.reset();
        self.findings_total.reset();
        self.discovery_errors.reset();

        for f in &snapshot.findings {
            let namespace = f.namespace.as_deref().unwrap_or("");
            let labels = [f.source.as_str(), namespace, f.name.as_str()];

            self.probe_success
                .with_label_values(&labels)
                .set(if f.probe_ok { 1.0 } else { 0.0 });

            if let Some(na) = f.not_after {
                let sev_labels = [
                    f.source.as_str(),
                    namespace,
                    f.name.as_str(),
                    f.severity.as_str(),
                ];
                self.not_after
                    .with_label_values(&sev_labels)
                    .set(na.timestamp() as f64);
                self.expires_in
                    .with_label_values(&sev_labels)
                    .set((na - snapshot.at).num_seconds() as f64);
            }
        }

        for sev in [Severity::Info, Severity::Warn, Severity::Critical] {
            self.findings_total
                .with_label_values(&[sev.as_str()])
                .set(i64::try_from(snapshot.count_at(sev)).unwrap_or(i64::MAX));
        }
        for source in snapshot.errors.keys() {
            self.discovery_errors.with_label_values(&[source]).set(1);
        }
        self.scan_duration.set(scan_duration_secs);
    }

    /// Render the exposition text.
    #[must_use]
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::collections::BTreeMap;
    use trustwatch_core::{CertFinding, SourceKind};

    fn snapshot() -> Snapshot {
        let mut ok = CertFinding::new(SourceKind::IngressTls, "shop/shop.example.com");
        ok.namespace = Some("prod".to_string());
        ok.probe_ok = true;
        ok.not_after = Some(Utc::now() + Duration::days(60));
        ok.severity = Severity::Warn;

        let failed = CertFinding::probe_failed(
            SourceKind::Webhook,
            "hook",
            "tcp://hook.default.svc:443",
            "dial timeout",
        );

        let mut errors = BTreeMap::new();
        errors.insert("k8s.gateway".to_string(), "forbidden".to_string());
        Snapshot {
            at: Utc::now(),
            findings: vec![ok, failed],
            errors,
        }
    }

    #[test]
    fn exposition_carries_the_prefixed_series() {
        let collector = MetricsCollector::new().unwrap();
        collector.update(&snapshot(), 2.5);

        let text = collector.gather();
        assert!(text.contains("trustwatch_cert_not_after_timestamp"));
        assert!(text.contains("trustwatch_cert_expires_in_seconds"));
        assert!(text.contains("trustwatch_probe_success"));
        assert!(text.contains("trustwatch_findings_total"));
        assert!(text.contains("trustwatch_scan_duration_seconds 2.5"));
        assert!(text.contains("trustwatch_discovery_errors_total"));
        assert!(text.contains("severity=\"warn\""));
    }

    #[test]
    fn update_resets_stale_series() {
        let collector = MetricsCollector::new().unwrap();
        collector.update(&snapshot(), 1.0);
        assert!(collector.gather().contains("shop.example.com"));

        // A later scan without that finding must drop its series.
        let empty = Snapshot {
            at: Utc::now(),
            findings: Vec::new(),
            errors: BTreeMap::new(),
        };
        collector.update(&empty, 1.0);
        let text = collector.gather();
        assert!(!text.contains("shop.example.com"));
        assert!(!text.contains("k8s.gateway"));
    }
}
