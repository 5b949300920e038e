//! X.509 parsing into finding fields.

use chrono::{DateTime, TimeZone, Utc};
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use trustwatch_core::ProbeReport;

use crate::chain;
use crate::error::{ProbeError, Result};

/// Extracted fields of one certificate.
#[derive(Debug, Clone)]
pub struct ParsedCert {
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Serial, lowercase hex without separators.
    pub serial: String,
    /// Validity start.
    pub not_before: DateTime<Utc>,
    /// Validity end.
    pub not_after: DateTime<Utc>,
    /// DNS subject alternative names.
    pub dns_names: Vec<String>,
    /// CA basic constraints present and set.
    pub is_ca: bool,
    /// Subject equals issuer.
    pub self_signed: bool,
    /// Public key algorithm name.
    pub key_algorithm: String,
    /// Public key bits.
    pub key_size: u32,
    /// Signature algorithm name.
    pub signature_algorithm: String,
}

/// Parse a single DER-encoded certificate.
pub fn parse_der(der: &[u8]) -> Result<ParsedCert> {
    let (_, cert) =
        parse_x509_certificate(der).map_err(|e| ProbeError::CertParse(e.to_string()))?;

    let subject = cert.subject().to_string();
    let issuer = cert.issuer().to_string();

    let dns_names = cert
        .subject_alternative_name()
        .ok()
        .flatten()
        .map(|san| {
            san.value
                .general_names
                .iter()
                .filter_map(|gn| match gn {
                    GeneralName::DNSName(d) => Some((*d).to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let is_ca = cert
        .basic_constraints()
        .ok()
        .flatten()
        .is_some_and(|bc| bc.value.ca);

    let (key_algorithm, key_size) = key_material(cert.public_key());

    Ok(ParsedCert {
        self_signed: subject == issuer,
        serial: hex::encode(cert.raw_serial()),
        not_before: asn1_to_utc(cert.validity().not_before),
        not_after: asn1_to_utc(cert.validity().not_after),
        signature_algorithm: signature_algorithm_name(&cert),
        subject,
        issuer,
        dns_names,
        is_ca,
        key_algorithm,
        key_size,
    })
}

/// Extract all CERTIFICATE blocks from a PEM document as DER.
pub fn pem_to_der_chain(content: &[u8]) -> Result<Vec<Vec<u8>>> {
    let pems = ::pem::parse_many(content).map_err(|e| ProbeError::PemDecode(e.to_string()))?;
    let ders: Vec<Vec<u8>> = pems
        .iter()
        .filter(|p| p.tag() == "CERTIFICATE")
        .map(|p| p.contents().to_vec())
        .collect();
    if ders.is_empty() {
        return Err(ProbeError::PemDecode("no CERTIFICATE block".to_string()));
    }
    Ok(ders)
}

/// Build a successful probe report from a presented DER chain (leaf first).
///
/// The leaf must parse; non-leaf parse failures become chain errors rather
/// than failing the whole report.
pub fn report_from_chain(chain_der: Vec<Vec<u8>>) -> Result<ProbeReport> {
    let leaf_der = chain_der.first().ok_or(ProbeError::NoPeerCert)?;
    let leaf = parse_der(leaf_der)?;

    let mut parsed = vec![leaf.clone()];
    let mut chain_errors = Vec::new();
    for (i, der) in chain_der.iter().enumerate().skip(1) {
        match parse_der(der) {
            Ok(c) => parsed.push(c),
            Err(e) => chain_errors.push(format!("chain[{i}] unparseable: {e}")),
        }
    }
    chain_errors.extend(chain::analyze(&parsed, Utc::now()));

    Ok(ProbeReport {
        probe_ok: true,
        probe_err: String::new(),
        not_after: Some(leaf.not_after),
        not_before: Some(leaf.not_before),
        issuer: leaf.issuer,
        subject: leaf.subject,
        serial: leaf.serial,
        dns_names: leaf.dns_names,
        issuer_chain: parsed.iter().map(|c| c.issuer.clone()).collect(),
        chain_len: chain_der.len(),
        self_signed: leaf.self_signed,
        is_ca: leaf.is_ca,
        key_algorithm: leaf.key_algorithm,
        key_size: leaf.key_size,
        signature_algorithm: leaf.signature_algorithm,
        cert_duration_secs: (leaf.not_after - leaf.not_before).num_seconds(),
        tls_version: String::new(),
        cipher_suite: String::new(),
        chain_errors,
        posture_issues: Vec::new(),
        raw_chain: chain_der,
        raw_staple: None,
    })
}

/// Normalize a serial for comparison: lowercase hex, separators and
/// leading zeros stripped.
#[must_use]
pub fn normalize_serial(serial: &str) -> String {
    let cleaned: String = serial
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let trimmed = cleaned.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Convert an ASN.1 `GeneralizedTime` / `UTCTime` to `DateTime<Utc>`.
pub(crate) fn asn1_to_utc(t: ASN1Time) -> DateTime<Utc> {
    let epoch = t.timestamp();
    Utc.timestamp_opt(epoch, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_ED25519: &str = "1.3.101.112";

fn key_material(spki: &SubjectPublicKeyInfo<'_>) -> (String, u32) {
    match spki.algorithm.algorithm.to_id_string().as_str() {
        OID_RSA_ENCRYPTION => {
            let bits = match spki.parsed() {
                Ok(PublicKey::RSA(rsa)) => rsa_modulus_bits(rsa.modulus),
                _ => 0,
            };
            ("RSA".to_string(), bits)
        }
        OID_EC_PUBLIC_KEY => {
            let curve_oid = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| p.as_oid().ok())
                .map(|o| o.to_id_string())
                .unwrap_or_default();
            ("ECDSA".to_string(), ec_curve_bits(&curve_oid))
        }
        OID_ED25519 => ("Ed25519".to_string(), 256),
        _ => (String::new(), 0),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn rsa_modulus_bits(modulus: &[u8]) -> u32 {
    let significant = modulus.iter().skip_while(|&&b| b == 0).count();
    (significant * 8) as u32
}

fn ec_curve_bits(curve_oid: &str) -> u32 {
    match curve_oid {
        "1.2.840.10045.3.1.7" => 256, // P-256
        "1.3.132.0.34" => 384,        // P-384
        "1.3.132.0.35" => 521,        // P-521
        "1.3.132.0.10" => 256,        // secp256k1
        _ => 0,
    }
}

fn signature_algorithm_name(cert: &X509Certificate<'_>) -> String {
    let oid = cert.signature_algorithm.algorithm.to_id_string();
    match oid.as_str() {
        "1.2.840.113549.1.1.4" => "MD5-RSA".to_string(),
        "1.2.840.113549.1.1.5" => "SHA1-RSA".to_string(),
        "1.2.840.113549.1.1.11" => "SHA256-RSA".to_string(),
        "1.2.840.113549.1.1.12" => "SHA384-RSA".to_string(),
        "1.2.840.113549.1.1.13" => "SHA512-RSA".to_string(),
        "1.2.840.113549.1.1.10" => "RSA-PSS".to_string(),
        "1.2.840.10045.4.1" => "ECDSA-SHA1".to_string(),
        "1.2.840.10045.4.3.2" => "ECDSA-SHA256".to_string(),
        "1.2.840.10045.4.3.3" => "ECDSA-SHA384".to_string(),
        "1.2.840.10045.4.3.4" => "ECDSA-SHA512".to_string(),
        "1.3.101.112" => "Ed25519".to_string(),
        _ => oid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, KeyPair};

    fn self_signed_der(names: &[&str]) -> Vec<u8> {
        let params =
            CertificateParams::new(names.iter().map(|s| (*s).to_string()).collect::<Vec<_>>())
                .expect("params");
        let key = KeyPair::generate().expect("keypair");
        let cert = params.self_signed(&key).expect("self-signed cert");
        cert.der().to_vec()
    }

    #[test]
    fn parses_self_signed_leaf() {
        let der = self_signed_der(&["svc.default.svc.cluster.local"]);
        let parsed = parse_der(&der).unwrap();

        assert!(parsed.self_signed);
        assert!(parsed
            .dns_names
            .contains(&"svc.default.svc.cluster.local".to_string()));
        assert!(!parsed.serial.is_empty());
        assert!(parsed.not_after > parsed.not_before);
        // rcgen defaults to ECDSA P-256.
        assert_eq!(parsed.key_algorithm, "ECDSA");
        assert_eq!(parsed.key_size, 256);
        assert_eq!(parsed.signature_algorithm, "ECDSA-SHA256");
    }

    #[test]
    fn report_from_chain_fills_fields() {
        let der = self_signed_der(&["a.example.com"]);
        let report = report_from_chain(vec![der]).unwrap();

        assert!(report.probe_ok);
        assert!(report.not_after.is_some());
        assert_eq!(report.chain_len, 1);
        assert!(report.self_signed);
        assert!(report.cert_duration_secs > 0);
        assert_eq!(report.issuer_chain.len(), 1);
    }

    #[test]
    fn report_requires_a_leaf() {
        assert!(report_from_chain(Vec::new()).is_err());
        assert!(report_from_chain(vec![vec![0x00, 0x01]]).is_err());
    }

    #[test]
    fn pem_chain_extraction() {
        let der = self_signed_der(&["x.example.com"]);
        let pem_doc = ::pem::encode(&::pem::Pem::new("CERTIFICATE", der.clone()));
        let ders = pem_to_der_chain(pem_doc.as_bytes()).unwrap();
        assert_eq!(ders, vec![der]);

        assert!(pem_to_der_chain(b"not pem at all").is_err());
    }

    #[test]
    fn serial_normalization() {
        assert_eq!(normalize_serial("00:AB:0c"), "ab0c");
        assert_eq!(normalize_serial("0x00ab0c"), "ab0c");
        assert_eq!(normalize_serial("0000"), "0");
        assert_eq!(normalize_serial("1f"), "1f");
    }
}
