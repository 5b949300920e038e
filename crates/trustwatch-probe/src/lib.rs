//! # trustwatch-probe
//!
//! TLS probing and certificate analysis.
//!
//! A probe is a TLS dial that extracts peer certificate material without
//! verifying it -- we are inspecting trust surfaces, not trusting them.
//! The handshake runs with a capture-everything verifier so expired,
//! self-signed, and otherwise broken chains are still observed.
//!
//! ```text
//! parse_target("tcp://svc.ns.svc:443?sni=example")
//!   -> TcpStream::connect (10 s)
//!   -> handshake_capture (10 s, verification disabled, staple captured)
//!   -> report_from_chain: x509 fields, chain walk, key material
//!   -> ProbeReport
//! ```
//!
//! Revocation checks (OCSP staple, AIA OCSP, CRL with a TTL cache) run as
//! an enrichment pass over findings that carry raw chain material.

pub mod cert;
pub mod chain;
pub mod error;
pub mod posture;
pub mod prober;
pub mod revocation;
pub mod target;
pub mod tls;

pub use error::{ProbeError, Result};
pub use prober::TlsProber;
pub use revocation::RevocationChecker;
pub use target::{parse_target, ProbeTarget};
