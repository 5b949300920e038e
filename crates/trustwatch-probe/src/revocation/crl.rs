//! CRL distribution-point checks with a TTL cache.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::debug;
use x509_parser::prelude::*;

use crate::cert::{asn1_to_utc, normalize_serial};
use crate::error::{ProbeError, Result};
use crate::revocation::cache::TtlCache;

/// HTTP budget for one CRL fetch.
pub const CRL_TIMEOUT: StdDuration = StdDuration::from_secs(10);
/// Largest CRL body we will parse.
pub const MAX_CRL_BYTES: usize = 10 * 1024 * 1024;
/// Cache TTL when the CRL carries no `nextUpdate`.
const FALLBACK_TTL_HOURS: i64 = 1;

/// A fetched CRL reduced to what checks need. Immutable once cached.
#[derive(Debug)]
pub struct CachedCrl {
    /// Revoked serials, normalized hex.
    pub revoked: HashSet<String>,
    /// CRL freshness horizon.
    pub next_update: Option<DateTime<Utc>>,
}

/// Fetches, parses, and caches CRLs keyed by distribution-point URL.
#[derive(Debug)]
pub struct CrlChecker {
    client: reqwest::Client,
    cache: TtlCache<String, Arc<CachedCrl>>,
}

impl CrlChecker {
    /// A checker sharing the given HTTP client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            cache: TtlCache::new(),
        }
    }

    /// Check a leaf against every CRL distribution point it names.
    ///
    /// Returns `"<TAG>: <detail>"` issues; an empty vector means no
    /// distribution points or a clean pass everywhere.
    pub async fn check_leaf(
        &self,
        leaf_der: &[u8],
        leaf_serial: &str,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let mut issues = Vec::new();
        let wanted = normalize_serial(leaf_serial);

        for url in distribution_points(leaf_der) {
            match self.lookup(&url, now).await {
                Ok(crl) => {
                    if crl.revoked.contains(&wanted) {
                        issues.push(format!("CERT_REVOKED: serial {wanted} listed in CRL {url}"));
                    }
                    if let Some(nu) = crl.next_update {
                        if nu < now {
                            issues.push(format!(
                                "CRL_STALE: {url} nextUpdate {} is in the past",
                                nu.to_rfc3339()
                            ));
                        }
                    }
                }
                Err(e) => issues.push(format!("REVOCATION_UNKNOWN: {e}")),
            }
        }
        issues
    }

    /// Cache hits are served without touching the network.
    async fn lookup(&self, url: &str, now: DateTime<Utc>) -> Result<Arc<CachedCrl>> {
        if let Some(hit) = self.cache.get(&url.to_string(), now) {
            debug!(url = %url, "crl cache hit");
            return Ok(hit);
        }

        let body = self.fetch(url).await?;
        let crl = Arc::new(parse_crl(&body, url)?);
        let expires_at = crl
            .next_update
            .unwrap_or_else(|| now + Duration::hours(FALLBACK_TTL_HOURS));
        self.cache.insert(url.to_string(), Arc::clone(&crl), expires_at);
        Ok(crl)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(CRL_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProbeError::Crl {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(ProbeError::Crl {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        let body = response.bytes().await.map_err(|e| ProbeError::Crl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if body.len() > MAX_CRL_BYTES {
            return Err(ProbeError::Crl {
                url: url.to_string(),
                reason: format!("body exceeds {MAX_CRL_BYTES} bytes"),
            });
        }
        Ok(body.to_vec())
    }
}

/// CRL distribution-point URLs from a leaf certificate.
#[must_use]
pub fn distribution_points(leaf_der: &[u8]) -> Vec<String> {
    let Ok((_, cert)) = parse_x509_certificate(leaf_der) else {
        return Vec::new();
    };
    let mut urls = Vec::new();
    for ext in cert.extensions() {
        if let ParsedExtension::CRLDistributionPoints(points) = ext.parsed_extension() {
            for point in &points.points {
                if let Some(DistributionPointName::FullName(names)) = &point.distribution_point {
                    for name in names {
                        if let GeneralName::URI(uri) = name {
                            urls.push((*uri).to_string());
                        }
                    }
                }
            }
        }
    }
    urls
}

/// Parse a PEM or DER CRL body into the cached form.
pub fn parse_crl(body: &[u8], url: &str) -> Result<CachedCrl> {
    let der: Vec<u8> = if body.starts_with(b"-----BEGIN") {
        ::pem::parse(body)
            .map_err(|e| ProbeError::Crl {
                url: url.to_string(),
                reason: format!("pem: {e}"),
            })?
            .into_contents()
    } else {
        body.to_vec()
    };

    let (_, crl) = parse_x509_crl(&der).map_err(|e| ProbeError::Crl {
        url: url.to_string(),
        reason: format!("parse: {e}"),
    })?;

    let revoked = crl
        .iter_revoked_certificates()
        .map(|rc| normalize_serial(&hex::encode(rc.user_certificate.to_bytes_be())))
        .collect();

    Ok(CachedCrl {
        revoked,
        next_update: crl.tbs_cert_list.next_update.map(asn1_to_utc),
    })
}
