//! Error types for probing and certificate parsing.

use thiserror::Error;

/// Result type alias for probe operations.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors that can occur while probing or parsing certificates.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The target URL could not be parsed into host/port/SNI.
    #[error("invalid target {target}: {reason}")]
    Target {
        /// The offending URL.
        target: String,
        /// Why it was rejected.
        reason: String,
    },

    /// TCP connect failed or timed out.
    #[error("dial {addr}: {reason}")]
    Dial {
        /// host:port dialed.
        addr: String,
        /// Failure cause.
        reason: String,
    },

    /// TLS handshake failed or timed out.
    #[error("handshake with {sni}: {reason}")]
    Handshake {
        /// SNI presented.
        sni: String,
        /// Failure cause.
        reason: String,
    },

    /// The peer presented no certificate.
    #[error("peer presented no certificate")]
    NoPeerCert,

    /// X.509 DER parsing failed.
    #[error("certificate parse: {0}")]
    CertParse(String),

    /// PEM decoding failed.
    #[error("pem decode: {0}")]
    PemDecode(String),

    /// OCSP request construction or response parsing failed.
    #[error("ocsp: {0}")]
    Ocsp(String),

    /// CRL fetch or parse failed.
    #[error("crl {url}: {reason}")]
    Crl {
        /// Distribution point URL.
        url: String,
        /// Failure cause.
        reason: String,
    },
}
