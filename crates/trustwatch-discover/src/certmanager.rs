//! cert-manager Certificate discovery.
//!
//! cert-manager renews its certificates itself; the point of observing them
//! is catching the ones it *cannot* renew (Ready=False) and labelling the
//! ones inside their renewal window as managed noise that `--ignore-managed`
//! can drop.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kube::api::{Api, DynamicObject, ListParams, ResourceExt};
use kube::core::{ApiResource, GroupVersionKind};
use kube::Client;

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, FindingType, Severity, SourceKind};

/// Discovers cert-manager `Certificate` custom resources.
pub struct CertManagerDiscoverer {
    client: Client,
    namespaces: Vec<String>,
    warn_before: Duration,
}

impl CertManagerDiscoverer {
    /// Construct scoped to the accessible namespaces; `warn_before` bounds
    /// the renewal-window observation.
    #[must_use]
    pub fn new(client: Client, namespaces: Vec<String>, warn_before: Duration) -> Self {
        Self {
            client,
            namespaces,
            warn_before,
        }
    }

    fn api_resource() -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk("cert-manager.io", "v1", "Certificate"))
    }
}

#[async_trait]
impl Discoverer for CertManagerDiscoverer {
    fn name(&self) -> &str {
        "certmanager"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        let ar = Self::api_resource();
        let mut findings = Vec::new();
        for ns in &self.namespaces {
            let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), ns, &ar);
            let list = match api.list(&ListParams::default()).await {
                Ok(l) => l,
                Err(kube::Error::Api(ae)) if ae.code == 404 => {
                    // cert-manager not installed.
                    return DiscoveryOutcome::ok(Vec::new());
                }
                Err(e) => {
                    return DiscoveryOutcome::partial(
                        findings,
                        format!("list certificates in {ns}: {e}"),
                    )
                }
            };
            for cert in &list.items {
                findings.extend(certificate_findings(
                    ns,
                    &cert.name_any(),
                    cert,
                    Utc::now(),
                    self.warn_before,
                ));
            }
        }
        DiscoveryOutcome::ok(findings)
    }
}

/// Findings for one Certificate CR: the direct observation plus, for
/// auto-renewed objects inside the warn window, an informational
/// `MANAGED_EXPIRY` companion.
#[must_use]
pub fn certificate_findings(
    namespace: &str,
    name: &str,
    cert: &DynamicObject,
    now: DateTime<Utc>,
    warn_before: Duration,
) -> Vec<CertFinding> {
    let spec = cert.data.get("spec");
    let status = cert.data.get("status");

    let mut f = CertFinding::new(SourceKind::CertManager, name);
    f.namespace = Some(namespace.to_string());

    if let Some(issuer) = spec
        .and_then(|s| s.get("issuerRef"))
        .and_then(|r| r.get("name"))
        .and_then(|n| n.as_str())
    {
        f.issuer = issuer.to_string();
    }
    if let Some(secret) = spec
        .and_then(|s| s.get("secretName"))
        .and_then(|n| n.as_str())
    {
        f.notes = format!("secret={secret}");
    }
    if let Some(dns) = spec
        .and_then(|s| s.get("dnsNames"))
        .and_then(|d| d.as_array())
    {
        f.dns_names = dns
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();
    }

    let not_after = status
        .and_then(|s| s.get("notAfter"))
        .and_then(|v| v.as_str())
        .and_then(parse_time);
    let renewal_time = status
        .and_then(|s| s.get("renewalTime"))
        .and_then(|v| v.as_str())
        .and_then(parse_time);
    let ready = status
        .and_then(|s| s.get("conditions"))
        .and_then(|c| c.as_array())
        .is_some_and(|conds| {
            conds.iter().any(|c| {
                c.get("type").and_then(|t| t.as_str()) == Some("Ready")
                    && c.get("status").and_then(|s| s.as_str()) == Some("True")
            })
        });

    let mut findings = Vec::new();
    match not_after {
        Some(na) => {
            f.probe_ok = true;
            f.not_after = Some(na);
            if !ready {
                f.notes = append_note(&f.notes, "Ready=False");
            }
            findings.push(f.clone());

            // Renewal is cert-manager's job; inside the window we only note it.
            if renewal_time.is_some() && na <= now + warn_before {
                let mut managed =
                    CertFinding::new(SourceKind::CertManagerRenewal, name.to_string());
                managed.namespace = Some(namespace.to_string());
                managed.probe_ok = true;
                managed.not_after = Some(na);
                managed.issuer.clone_from(&f.issuer);
                managed.finding_type = Some(FindingType::ManagedExpiry);
                managed.severity = Severity::Info;
                managed.notes = format!(
                    "auto-renewal scheduled {}",
                    renewal_time.map(|t| t.to_rfc3339()).unwrap_or_default()
                );
                findings.push(managed);
            }
        }
        None => {
            f.probe_err = if ready {
                "certificate has no notAfter in status".to_string()
            } else {
                "certificate not issued (Ready=False)".to_string()
            };
            findings.push(f);
        }
    }
    findings
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>().ok()
}

fn append_note(existing: &str, extra: &str) -> String {
    if existing.is_empty() {
        extra.to_string()
    } else {
        format!("{existing} {extra}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn certificate(status: serde_json::Value) -> DynamicObject {
        let ar = CertManagerDiscoverer::api_resource();
        let mut obj = DynamicObject::new("web-cert", &ar);
        obj.data = json!({
            "spec": {
                "secretName": "web-tls",
                "dnsNames": ["web.example.com"],
                "issuerRef": { "name": "letsencrypt-prod" }
            },
            "status": status
        });
        obj
    }

    #[test]
    fn issued_certificate_is_a_direct_observation() {
        let far = (Utc::now() + Duration::days(60)).to_rfc3339();
        let cert = certificate(json!({
            "notAfter": far,
            "conditions": [{ "type": "Ready", "status": "True" }]
        }));

        let findings =
            certificate_findings("prod", "web-cert", &cert, Utc::now(), Duration::hours(720));
        assert_eq!(findings.len(), 1);
        assert!(findings[0].probe_ok);
        assert_eq!(findings[0].issuer, "letsencrypt-prod");
        assert_eq!(findings[0].dns_names, vec!["web.example.com"]);
    }

    #[test]
    fn renewal_window_adds_managed_expiry() {
        let soon = (Utc::now() + Duration::days(10)).to_rfc3339();
        let renewal = (Utc::now() + Duration::days(3)).to_rfc3339();
        let cert = certificate(json!({
            "notAfter": soon,
            "renewalTime": renewal,
            "conditions": [{ "type": "Ready", "status": "True" }]
        }));

        let findings =
            certificate_findings("prod", "web-cert", &cert, Utc::now(), Duration::hours(720));
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[1].source, SourceKind::CertManagerRenewal);
        assert_eq!(findings[1].finding_type, Some(FindingType::ManagedExpiry));
        assert_eq!(findings[1].severity, Severity::Info);
    }

    #[test]
    fn unissued_certificate_records_the_failure() {
        let cert = certificate(json!({
            "conditions": [{ "type": "Ready", "status": "False" }]
        }));
        let findings =
            certificate_findings("prod", "web-cert", &cert, Utc::now(), Duration::hours(720));
        assert_eq!(findings.len(), 1);
        assert!(!findings[0].probe_ok);
        assert!(findings[0].probe_err.contains("not issued"));
    }
}
