//! Blast-radius queries over a snapshot's findings.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use trustwatch_core::{CertFinding, Severity};
use trustwatch_probe::cert::normalize_serial;

/// Issuer-chain index over a finding set.
///
/// Maps serials exactly, subjects and issuers by substring, and keeps a
/// parent link from each finding's immediate issuer DN
/// (`issuer_chain[0]`) so an issuer query can descend to the leaves a
/// matching CA signed.
#[derive(Debug)]
pub struct ImpactGraph {
    findings: Vec<CertFinding>,
    children_of: HashMap<String, Vec<usize>>,
}

/// Result of one blast-radius query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactResult {
    /// The pattern that was queried.
    pub matched_pattern: String,
    /// Affected findings.
    pub findings: Vec<CertFinding>,
    /// Distinct namespaces touched.
    pub namespaces: Vec<String>,
    /// Distinct clusters touched.
    pub clusters: Vec<String>,
    /// Finding count per severity label.
    pub by_severity: BTreeMap<String, usize>,
}

impl ImpactGraph {
    /// Index a finding set.
    #[must_use]
    pub fn build(findings: Vec<CertFinding>) -> Self {
        let mut children_of: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, f) in findings.iter().enumerate() {
            if let Some(parent) = f.issuer_chain.first() {
                children_of.entry(parent.clone()).or_default().push(i);
            }
        }
        Self {
            findings,
            children_of,
        }
    }

    /// Findings issued by any CA whose DN contains the pattern, plus the
    /// matching CA certificates themselves.
    #[must_use]
    pub fn query_issuer(&self, pattern: &str) -> ImpactResult {
        let mut hits = BTreeSet::new();
        for (i, f) in self.findings.iter().enumerate() {
            if f.issuer.contains(pattern) || f.subject.contains(pattern) {
                hits.insert(i);
            }
        }
        // One hop down: leaves under any matching issuer DN.
        for (dn, children) in &self.children_of {
            if dn.contains(pattern) {
                hits.extend(children.iter().copied());
            }
        }
        self.collect(pattern, &hits)
    }

    /// The finding with exactly this serial.
    #[must_use]
    pub fn query_serial(&self, serial: &str) -> ImpactResult {
        let wanted = normalize_serial(serial);
        let hits: BTreeSet<usize> = self
            .findings
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.serial.is_empty() && normalize_serial(&f.serial) == wanted)
            .map(|(i, _)| i)
            .collect();
        self.collect(serial, &hits)
    }

    /// Findings whose subject contains the pattern.
    #[must_use]
    pub fn query_subject(&self, pattern: &str) -> ImpactResult {
        let hits: BTreeSet<usize> = self
            .findings
            .iter()
            .enumerate()
            .filter(|(_, f)| f.subject.contains(pattern))
            .map(|(i, _)| i)
            .collect();
        self.collect(pattern, &hits)
    }

    fn collect(&self, pattern: &str, hits: &BTreeSet<usize>) -> ImpactResult {
        let findings: Vec<CertFinding> =
            hits.iter().map(|&i| self.findings[i].clone()).collect();

        let namespaces: BTreeSet<String> = findings
            .iter()
            .filter_map(|f| f.namespace.clone())
            .collect();
        let clusters: BTreeSet<String> =
            findings.iter().filter_map(|f| f.cluster.clone()).collect();

        let mut by_severity = BTreeMap::new();
        for sev in [Severity::Info, Severity::Warn, Severity::Critical] {
            let count = findings.iter().filter(|f| f.severity == sev).count();
            if count > 0 {
                by_severity.insert(sev.as_str().to_string(), count);
            }
        }

        ImpactResult {
            matched_pattern: pattern.to_string(),
            findings,
            namespaces: namespaces.into_iter().collect(),
            clusters: clusters.into_iter().collect(),
            by_severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustwatch_core::SourceKind;

    fn cert(name: &str, subject: &str, issuer: &str, chain0: &str) -> CertFinding {
        let mut f = CertFinding::new(SourceKind::TlsSecret, name);
        f.probe_ok = true;
        f.subject = subject.to_string();
        f.issuer = issuer.to_string();
        f.serial = format!("{:x}", name.len());
        f.issuer_chain = vec![chain0.to_string()];
        f.namespace = Some("prod".to_string());
        f
    }

    fn hierarchy() -> Vec<CertFinding> {
        vec![
            cert("inter", "CN=Intermediate", "CN=Root CA", "CN=Root CA"),
            cert("leaf-a", "CN=a.example.com", "CN=Intermediate", "CN=Intermediate"),
            cert("leaf-b", "CN=b.example.com", "CN=Intermediate", "CN=Intermediate"),
        ]
    }

    #[test]
    fn issuer_query_includes_the_ca_and_its_leaves() {
        let graph = ImpactGraph::build(hierarchy());
        let result = graph.query_issuer("Intermediate");

        assert_eq!(result.findings.len(), 3);
        assert_eq!(result.matched_pattern, "Intermediate");
        assert_eq!(result.namespaces, vec!["prod"]);
        assert_eq!(result.by_severity.get("info"), Some(&3));
    }

    #[test]
    fn serial_query_is_exact_and_normalized() {
        let mut findings = hierarchy();
        findings[1].serial = "00:AB:CD".to_string();
        let graph = ImpactGraph::build(findings);

        let result = graph.query_serial("abcd");
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].name, "leaf-a");

        assert!(graph.query_serial("ffff").findings.is_empty());
    }

    #[test]
    fn subject_query_matches_substrings() {
        let graph = ImpactGraph::build(hierarchy());
        let result = graph.query_subject("example.com");
        assert_eq!(result.findings.len(), 2);
    }
}
