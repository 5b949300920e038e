//! TLS handshake with verification disabled.
//!
//! The verifier accepts every chain and records the stapled OCSP response;
//! inspection happens afterwards from the captured material.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, DigitallySignedStruct, ProtocolVersion, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;

use crate::error::{ProbeError, Result};

/// What the handshake itself observed, before any X.509 parsing.
#[derive(Debug)]
pub struct HandshakeCapture {
    /// Peer chain as presented, leaf first.
    pub chain_der: Vec<Vec<u8>>,
    /// Stapled OCSP response bytes, if the server sent one.
    pub staple: Option<Vec<u8>>,
    /// Negotiated protocol version.
    pub tls_version: String,
    /// Negotiated cipher suite.
    pub cipher_suite: String,
}

/// Accepts every certificate; records the OCSP staple on the side.
#[derive(Debug)]
struct CaptureVerifier {
    staple: Mutex<Option<Vec<u8>>>,
    schemes: Vec<SignatureScheme>,
}

impl CaptureVerifier {
    fn new(provider: &CryptoProvider) -> Self {
        Self {
            staple: Mutex::new(None),
            schemes: provider.signature_verification_algorithms.supported_schemes(),
        }
    }

    fn take_staple(&self) -> Option<Vec<u8>> {
        self.staple.lock().ok().and_then(|mut s| s.take())
    }
}

impl ServerCertVerifier for CaptureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        if !ocsp_response.is_empty() {
            if let Ok(mut staple) = self.staple.lock() {
                *staple = Some(ocsp_response.to_vec());
            }
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes.clone()
    }
}

/// Perform a TLS handshake over an established stream and capture the
/// peer's certificate material.
///
/// Works over a direct TCP connection or a SOCKS5-tunnelled one; the
/// caller owns dialing.
pub async fn handshake_capture<S>(
    stream: S,
    sni: &str,
    timeout: Duration,
) -> Result<HandshakeCapture>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = Arc::new(CaptureVerifier::new(&provider));

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ProbeError::Handshake {
            sni: sni.to_string(),
            reason: e.to_string(),
        })?
        .dangerous()
        .with_custom_certificate_verifier(verifier.clone())
        .with_no_client_auth();

    let server_name =
        ServerName::try_from(sni.to_string()).map_err(|e| ProbeError::Handshake {
            sni: sni.to_string(),
            reason: format!("invalid sni: {e}"),
        })?;

    let connector = TlsConnector::from(Arc::new(config));
    let tls = tokio::time::timeout(timeout, connector.connect(server_name, stream))
        .await
        .map_err(|_| ProbeError::Handshake {
            sni: sni.to_string(),
            reason: format!("timeout after {}s", timeout.as_secs()),
        })?
        .map_err(|e| ProbeError::Handshake {
            sni: sni.to_string(),
            reason: e.to_string(),
        })?;

    let (_, conn) = tls.get_ref();
    let chain_der: Vec<Vec<u8>> = conn
        .peer_certificates()
        .map(|certs| certs.iter().map(|c| c.as_ref().to_vec()).collect())
        .unwrap_or_default();
    if chain_der.is_empty() {
        return Err(ProbeError::NoPeerCert);
    }

    Ok(HandshakeCapture {
        chain_der,
        tls_version: conn
            .protocol_version()
            .map(protocol_name)
            .unwrap_or_default(),
        cipher_suite: conn
            .negotiated_cipher_suite()
            .map(|s| format!("{:?}", s.suite()))
            .unwrap_or_default(),
        staple: verifier.take_staple(),
    })
}

fn protocol_name(v: ProtocolVersion) -> String {
    match v {
        ProtocolVersion::TLSv1_3 => "TLS1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLS1.2".to_string(),
        ProtocolVersion::TLSv1_1 => "TLS1.1".to_string(),
        ProtocolVersion::TLSv1_0 => "TLS1.0".to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_names() {
        assert_eq!(protocol_name(ProtocolVersion::TLSv1_3), "TLS1.3");
        assert_eq!(protocol_name(ProtocolVersion::TLSv1_2), "TLS1.2");
    }
}
