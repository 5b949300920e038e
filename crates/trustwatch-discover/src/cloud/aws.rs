//! AWS Certificate Manager discovery (`cloud-aws` feature).

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use trustwatch_core::{CertFinding, Discoverer, DiscoveryOutcome, SourceKind};

/// Lists ACM certificates with ambient AWS credentials.
pub struct AcmDiscoverer;

impl AcmDiscoverer {
    /// Credentials and region come from the standard AWS environment.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for AcmDiscoverer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Discoverer for AcmDiscoverer {
    fn name(&self) -> &str {
        "cloud.aws.acm"
    }

    async fn discover(&self) -> DiscoveryOutcome {
        let config = aws_config::load_from_env().await;
        let client = aws_sdk_acm::Client::new(&config);

        let mut findings = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = match client
                .list_certificates()
                .set_next_token(next_token.take())
                .send()
                .await
            {
                Ok(p) => p,
                Err(e) => {
                    return DiscoveryOutcome::partial(findings, format!("list certificates: {e}"))
                }
            };

            for summary in page.certificate_summary_list() {
                let Some(arn) = summary.certificate_arn() else {
                    continue;
                };
                match client
                    .describe_certificate()
                    .certificate_arn(arn)
                    .send()
                    .await
                {
                    Ok(detail) => {
                        if let Some(cert) = detail.certificate() {
                            findings.push(acm_finding(arn, cert));
                        }
                    }
                    Err(e) => {
                        return DiscoveryOutcome::partial(
                            findings,
                            format!("describe {arn}: {e}"),
                        )
                    }
                }
            }

            next_token = page.next_token().map(String::from);
            if next_token.is_none() {
                break;
            }
        }
        DiscoveryOutcome::ok(findings)
    }
}

fn acm_finding(arn: &str, cert: &aws_sdk_acm::types::CertificateDetail) -> CertFinding {
    let name = cert.domain_name().unwrap_or(arn);
    let mut f = CertFinding::new(SourceKind::CloudAwsAcm, name);
    f.notes = format!("arn={arn}");
    match cert.not_after() {
        Some(na) => {
            f.probe_ok = true;
            f.not_after = Utc.timestamp_opt(na.secs(), 0).single();
            f.issuer = cert.issuer().unwrap_or_default().to_string();
            f.serial = cert.serial().unwrap_or_default().to_string();
            f.dns_names = cert
                .subject_alternative_names()
                .iter()
                .map(|s| (*s).to_string())
                .collect();
        }
        None => {
            f.probe_err = format!(
                "certificate not issued (status {:?})",
                cert.status().map(aws_sdk_acm::types::CertificateStatus::as_str)
            );
        }
    }
    f
}
