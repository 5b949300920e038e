//! OCSP staple parsing and AIA responder queries.

use chrono::{DateTime, TimeZone, Utc};
use der::{Decode, Encode};
use std::time::Duration;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_ocsp::{
    BasicOcspResponse, CertId, CertStatus, OcspRequest, OcspResponse, OcspResponseStatus,
    Request, TbsRequest, Version,
};
use x509_parser::prelude::*;

use crate::error::{ProbeError, Result};

/// HTTP budget for one AIA responder query.
pub const OCSP_TIMEOUT: Duration = Duration::from_secs(5);

/// SHA-1, the CertID hash every deployed responder accepts.
const OID_SHA1: der::asn1::ObjectIdentifier =
    der::asn1::ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
/// id-ad-ocsp access method.
const OID_AD_OCSP: &str = "1.3.6.1.5.5.7.48.1";

/// Outcome of one OCSP response evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcspVerdict {
    /// Status good; carries the response's freshness horizon.
    Good {
        /// `nextUpdate` of the single response, if present.
        next_update: Option<DateTime<Utc>>,
    },
    /// Responder reports the certificate revoked.
    Revoked,
    /// Responder does not know the certificate.
    Unknown,
}

/// OCSP responder URLs from the leaf's Authority Information Access.
#[must_use]
pub fn responder_urls(leaf_der: &[u8]) -> Vec<String> {
    let Ok((_, cert)) = parse_x509_certificate(leaf_der) else {
        return Vec::new();
    };
    let mut urls = Vec::new();
    for ext in cert.extensions() {
        if let ParsedExtension::AuthorityInfoAccess(aia) = ext.parsed_extension() {
            for desc in &aia.accessdescs {
                if desc.access_method.to_id_string() == OID_AD_OCSP {
                    if let GeneralName::URI(uri) = &desc.access_location {
                        urls.push((*uri).to_string());
                    }
                }
            }
        }
    }
    urls
}

/// Build a DER OCSP request for the leaf against its issuer.
pub fn build_request(leaf_der: &[u8], issuer_der: &[u8]) -> Result<Vec<u8>> {
    let (_, leaf) =
        parse_x509_certificate(leaf_der).map_err(|e| ProbeError::CertParse(e.to_string()))?;
    let (_, issuer) =
        parse_x509_certificate(issuer_der).map_err(|e| ProbeError::CertParse(e.to_string()))?;

    let name_hash = sha1(issuer.subject().as_raw());
    let key_hash = sha1(&issuer.public_key().subject_public_key.data);

    let cert_id = CertId {
        hash_algorithm: AlgorithmIdentifierOwned {
            oid: OID_SHA1,
            parameters: Some(der::Any::from(der::AnyRef::NULL)),
        },
        issuer_name_hash: der::asn1::OctetString::new(name_hash)
            .map_err(|e| ProbeError::Ocsp(e.to_string()))?,
        issuer_key_hash: der::asn1::OctetString::new(key_hash)
            .map_err(|e| ProbeError::Ocsp(e.to_string()))?,
        serial_number: SerialNumber::new(leaf.raw_serial())
            .map_err(|e| ProbeError::Ocsp(e.to_string()))?,
    };

    let request = OcspRequest {
        tbs_request: TbsRequest {
            version: Version::V1,
            requestor_name: None,
            request_list: vec![Request {
                req_cert: cert_id,
                single_request_extensions: None,
            }],
            request_extensions: None,
        },
        optional_signature: None,
    };

    request.to_der().map_err(|e| ProbeError::Ocsp(e.to_string()))
}

/// Parse a DER OCSP response (stapled or fetched) into a verdict.
pub fn parse_response(data: &[u8]) -> Result<OcspVerdict> {
    let response =
        OcspResponse::from_der(data).map_err(|e| ProbeError::Ocsp(format!("malformed: {e}")))?;
    if response.response_status != OcspResponseStatus::Successful {
        return Err(ProbeError::Ocsp(format!(
            "responder status {:?}",
            response.response_status
        )));
    }
    let bytes = response
        .response_bytes
        .ok_or_else(|| ProbeError::Ocsp("successful response without bytes".to_string()))?;
    let basic = BasicOcspResponse::from_der(bytes.response.as_bytes())
        .map_err(|e| ProbeError::Ocsp(format!("basic response: {e}")))?;
    let single = basic
        .tbs_response_data
        .responses
        .first()
        .ok_or_else(|| ProbeError::Ocsp("no single response".to_string()))?;

    Ok(match &single.cert_status {
        CertStatus::Good(_) => OcspVerdict::Good {
            next_update: single
                .next_update
                .as_ref()
                .map(|t| generalized_to_utc(t.as_ref())),
        },
        CertStatus::Revoked(_) => OcspVerdict::Revoked,
        CertStatus::Unknown(_) => OcspVerdict::Unknown,
    })
}

/// Evaluate a stapled response. `None` means the staple is good and fresh.
#[must_use]
pub fn check_staple(staple: &[u8], now: DateTime<Utc>) -> Option<String> {
    match parse_response(staple) {
        Ok(OcspVerdict::Revoked) => {
            Some("CERT_REVOKED: stapled OCSP response reports revoked".to_string())
        }
        Ok(OcspVerdict::Unknown) => {
            Some("REVOCATION_UNKNOWN: stapled OCSP response reports unknown".to_string())
        }
        Ok(OcspVerdict::Good { next_update }) => {
            if next_update.is_some_and(|nu| nu < now) {
                Some("OCSP_STAPLE_INVALID: staple nextUpdate in the past".to_string())
            } else {
                None
            }
        }
        Err(e) => Some(format!("OCSP_STAPLE_INVALID: {e}")),
    }
}

/// POST a DER request to one responder and parse the verdict.
pub async fn query_responder(
    client: &reqwest::Client,
    url: &str,
    request: Vec<u8>,
) -> Result<OcspVerdict> {
    let response = client
        .post(url)
        .header("content-type", "application/ocsp-request")
        .body(request)
        .timeout(OCSP_TIMEOUT)
        .send()
        .await
        .map_err(|e| ProbeError::Ocsp(format!("{url}: {e}")))?;
    if !response.status().is_success() {
        return Err(ProbeError::Ocsp(format!("{url}: HTTP {}", response.status())));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| ProbeError::Ocsp(format!("{url}: {e}")))?;
    parse_response(&body)
}

fn generalized_to_utc(t: &der::asn1::GeneralizedTime) -> DateTime<Utc> {
    #[allow(clippy::cast_possible_wrap)]
    let secs = t.to_date_time().unix_duration().as_secs() as i64;
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

fn sha1(data: &[u8]) -> Vec<u8> {
    ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, data)
        .as_ref()
        .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_staple_is_invalid() {
        let issue = check_staple(&[0xde, 0xad, 0xbe, 0xef], Utc::now());
        assert!(issue.is_some());
        assert!(issue.unwrap().starts_with("OCSP_STAPLE_INVALID"));
    }

    #[test]
    fn request_builds_against_real_certs() {
        let ca_key = rcgen::KeyPair::generate().unwrap();
        let mut ca_params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        let ca = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = rcgen::KeyPair::generate().unwrap();
        let leaf = rcgen::CertificateParams::new(vec!["leaf.example.com".to_string()])
            .unwrap()
            .signed_by(&leaf_key, &ca, &ca_key)
            .unwrap();

        let request = build_request(leaf.der(), ca.der()).unwrap();
        // DER SEQUENCE with content.
        assert_eq!(request[0], 0x30);
        assert!(request.len() > 40);
    }

    #[test]
    fn responder_urls_absent_on_plain_cert() {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["x.example.com".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        assert!(responder_urls(cert.der()).is_empty());
    }
}
