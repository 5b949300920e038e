//! Certificate Transparency monitoring via crt.sh.
//!
//! Every non-expired logged certificate for a monitored domain is compared
//! against the serials observed in the cluster and the allowed issuer set.
//! An unknown serial means someone obtained a certificate for your domain
//! outside your pipeline; an unallowed issuer means the wrong CA did.

use std::collections::HashSet;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::debug;

use trustwatch_core::{CertFinding, FindingType, Severity, SourceKind};
use trustwatch_probe::cert::normalize_serial;

/// Budget for one CT log query.
pub const CT_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_BASE_URL: &str = "https://crt.sh";

/// One crt.sh log entry, as served by `output=json`.
#[derive(Debug, Clone, Deserialize)]
pub struct CtEntry {
    /// Certificate serial, hex.
    pub serial_number: String,
    /// Issuer DN.
    pub issuer_name: String,
    /// Matched identities, newline-separated.
    pub name_value: String,
    /// Leaf common name.
    #[serde(default)]
    pub common_name: Option<String>,
    /// Expiry, crt.sh local format.
    #[serde(default)]
    pub not_after: Option<String>,
}

/// Queries the CT log and classifies entries.
#[derive(Debug)]
pub struct CtChecker {
    client: reqwest::Client,
    base_url: String,
    domains: Vec<String>,
    allowed_issuers: Vec<String>,
}

impl CtChecker {
    /// A checker for the given monitored domains.
    #[must_use]
    pub fn new(domains: Vec<String>, allowed_issuers: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            domains,
            allowed_issuers,
        }
    }

    /// Point at a different log frontend (tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Query every monitored domain and classify the entries against the
    /// cluster's known serials.
    pub async fn check(
        &self,
        known_serials: &HashSet<String>,
    ) -> std::result::Result<Vec<CertFinding>, String> {
        let mut findings = Vec::new();
        for domain in &self.domains {
            let entries = self.query_domain(domain).await?;
            debug!(domain = %domain, entries = entries.len(), "ct log entries");
            findings.extend(classify_entries(
                domain,
                &entries,
                known_serials,
                &self.allowed_issuers,
            ));
        }
        Ok(findings)
    }

    async fn query_domain(&self, domain: &str) -> std::result::Result<Vec<CtEntry>, String> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", format!("%.{domain}")),
                ("output", "json".to_string()),
                ("exclude", "expired".to_string()),
            ])
            .timeout(CT_TIMEOUT)
            .send()
            .await
            .map_err(|e| format!("ct query {domain}: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("ct query {domain}: HTTP {}", response.status()));
        }
        response
            .json::<Vec<CtEntry>>()
            .await
            .map_err(|e| format!("ct decode {domain}: {e}"))
    }
}

/// Classify log entries, deduplicated by serial. Both checks can fire for
/// the same entry.
#[must_use]
pub fn classify_entries(
    domain: &str,
    entries: &[CtEntry],
    known_serials: &HashSet<String>,
    allowed_issuers: &[String],
) -> Vec<CertFinding> {
    let mut seen = HashSet::new();
    let mut findings = Vec::new();

    for entry in entries {
        let serial = normalize_serial(&entry.serial_number);
        if !seen.insert(serial.clone()) {
            continue;
        }

        if !known_serials.contains(&serial) {
            let mut f = base_finding(domain, entry, &serial);
            f.finding_type = Some(FindingType::CtUnknownCert);
            f.severity = Severity::Warn;
            f.notes = format!("logged cert serial {serial} not observed in cluster");
            findings.push(f);
        }

        if !allowed_issuers.is_empty() {
            let issuer = entry.issuer_name.to_lowercase();
            let allowed = allowed_issuers
                .iter()
                .any(|a| issuer.contains(&a.to_lowercase()));
            if !allowed {
                let mut f = base_finding(domain, entry, &serial);
                f.finding_type = Some(FindingType::CtRogueIssuer);
                f.severity = Severity::Critical;
                f.notes = format!("issuer {:?} not in allowed set", entry.issuer_name);
                findings.push(f);
            }
        }
    }
    findings
}

fn base_finding(domain: &str, entry: &CtEntry, serial: &str) -> CertFinding {
    let name = entry
        .common_name
        .clone()
        .or_else(|| entry.name_value.lines().next().map(String::from))
        .unwrap_or_else(|| domain.to_string());
    let mut f = CertFinding::new(SourceKind::Ct, name);
    f.probe_ok = true;
    f.serial = serial.to_string();
    f.issuer.clone_from(&entry.issuer_name);
    f.dns_names = entry.name_value.lines().map(String::from).collect();
    f.not_after = entry.not_after.as_deref().and_then(parse_ct_time);
    f
}

/// crt.sh emits `2025-06-01T00:00:00`; RFC3339 also shows up.
fn parse_ct_time(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(t) = s.parse::<chrono::DateTime<chrono::Utc>>() {
        return Some(t);
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|n| n.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(serial: &str, issuer: &str) -> CtEntry {
        CtEntry {
            serial_number: serial.to_string(),
            issuer_name: issuer.to_string(),
            name_value: "www.example.com\nexample.com".to_string(),
            common_name: Some("www.example.com".to_string()),
            not_after: Some("2027-06-01T00:00:00".to_string()),
        }
    }

    #[test]
    fn unknown_serial_and_rogue_issuer_both_fire() {
        let entries = vec![entry("UNKNOWN1", "CN=Evil CA")];
        let findings = classify_entries(
            "example.com",
            &entries,
            &HashSet::new(),
            &["Let's Encrypt".to_string()],
        );

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].finding_type, Some(FindingType::CtUnknownCert));
        assert_eq!(findings[0].severity, Severity::Warn);
        assert_eq!(findings[1].finding_type, Some(FindingType::CtRogueIssuer));
        assert_eq!(findings[1].severity, Severity::Critical);
        assert_eq!(findings[1].name, "www.example.com");
    }

    #[test]
    fn known_serial_with_allowed_issuer_is_quiet() {
        let entries = vec![entry("0A1B", "CN=R3, O=Let's Encrypt, C=US")];
        let known = HashSet::from(["a1b".to_string()]);
        let findings = classify_entries(
            "example.com",
            &entries,
            &known,
            &["Let's Encrypt".to_string()],
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn duplicate_serials_are_deduplicated() {
        let entries = vec![entry("AA", "CN=Evil"), entry("aa", "CN=Evil")];
        let findings = classify_entries("example.com", &entries, &HashSet::new(), &[]);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn empty_allowed_set_disables_the_issuer_check() {
        let entries = vec![entry("BB", "CN=Anything")];
        let findings = classify_entries("example.com", &entries, &HashSet::new(), &[]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].finding_type, Some(FindingType::CtUnknownCert));
    }

    #[tokio::test]
    async fn queries_the_log_frontend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "%.example.com"))
            .and(query_param("output", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![serde_json::json!({
                "serial_number": "0c5f",
                "issuer_name": "CN=Evil CA",
                "name_value": "shadow.example.com",
            })]))
            .mount(&server)
            .await;

        let checker = CtChecker::new(vec!["example.com".to_string()], Vec::new())
            .with_base_url(server.uri());
        let findings = checker.check(&HashSet::new()).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].serial, "c5f");
    }
}
