//! GCP Certificate Manager discovery (`cloud-gcp` feature).
//!
//! Talks to the Certificate Manager REST API with a bearer token from
//! `GOOGLE_OAUTH_ACCESS_TOKEN`; there is no settled official Rust SDK for
//! this service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, SourceKind};

const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Lists certificates across all locations of one project.
pub struct GcpCertDiscoverer {
    project: String,
    client: reqwest::Client,
}

impl GcpCertDiscoverer {
    /// Construct for a project id.
    #[must_use]
    pub fn new(project: String) -> Self {
        Self {
            project,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificateList {
    #[serde(default)]
    certificates: Vec<GcpCertificate>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcpCertificate {
    name: String,
    #[serde(default)]
    expire_time: Option<DateTime<Utc>>,
    #[serde(default)]
    san_dnsnames: Vec<String>,
}

#[async_trait]
impl Discoverer for GcpCertDiscoverer {
    fn name(&self) -> &str {
        "cloud.gcp.cert"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        let Ok(token) = std::env::var(TOKEN_ENV) else {
            return DiscoveryOutcome::fail(format!("{TOKEN_ENV} is not set"));
        };

        let mut findings = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = format!(
                "https://certificatemanager.googleapis.com/v1/projects/{}/locations/-/certificates",
                self.project
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("?pageToken={token}"));
            }

            let response = match self.client.get(&url).bearer_auth(&token).send().await {
                Ok(r) => r,
                Err(e) => return DiscoveryOutcome::partial(findings, format!("list: {e}")),
            };
            if !response.status().is_success() {
                return DiscoveryOutcome::partial(
                    findings,
                    format!("list: HTTP {}", response.status()),
                );
            }
            let page: CertificateList = match response.json().await {
                Ok(p) => p,
                Err(e) => return DiscoveryOutcome::partial(findings, format!("decode: {e}")),
            };

            for cert in &page.certificates {
                findings.push(gcp_finding(cert));
            }
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        DiscoveryOutcome::ok(findings)
    }
}

fn gcp_finding(cert: &GcpCertificate) -> CertFinding {
    // Resource names look like projects/p/locations/l/certificates/name.
    let short_name = cert.name.rsplit('/').next().unwrap_or(&cert.name);
    let mut f = CertFinding::new(SourceKind::CloudGcpCert, short_name);
    f.notes = format!("resource={}", cert.name);
    match cert.expire_time {
        Some(expire) => {
            f.probe_ok = true;
            f.not_after = Some(expire);
            f.dns_names.clone_from(&cert.san_dnsnames);
        }
        None => f.probe_err = "certificate has no expireTime".to_string(),
    }
    f
}
