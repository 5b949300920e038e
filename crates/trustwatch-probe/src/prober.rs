//! Direct-dial TLS prober.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use trustwatch_core::{ProbeReport, Prober};

use crate::cert;
use crate::error::ProbeError;
use crate::target::parse_target;
use crate::tls;

/// TCP connect budget per probe.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);
/// TLS handshake budget per probe.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// The default prober: dials the target directly and handshakes with
/// verification disabled.
#[derive(Debug, Clone)]
pub struct TlsProber {
    dial_timeout: Duration,
    handshake_timeout: Duration,
}

impl Default for TlsProber {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsProber {
    /// A prober with the standard 10 s dial + 10 s handshake budgets.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dial_timeout: DIAL_TIMEOUT,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    /// Override both timeouts (tests and aggressive scans).
    #[must_use]
    pub const fn with_timeouts(dial: Duration, handshake: Duration) -> Self {
        Self {
            dial_timeout: dial,
            handshake_timeout: handshake,
        }
    }
}

#[async_trait]
impl Prober for TlsProber {
    async fn probe(&self, target: &str) -> ProbeReport {
        let parsed = match parse_target(target) {
            Ok(t) => t,
            Err(e) => return ProbeReport::failed(e.to_string()),
        };
        debug!(target = %target, addr = %parsed.addr(), sni = %parsed.sni, "probing");

        let stream = match tokio::time::timeout(
            self.dial_timeout,
            TcpStream::connect((parsed.host.as_str(), parsed.port)),
        )
        .await
        {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => {
                return ProbeReport::failed(
                    ProbeError::Dial {
                        addr: parsed.addr(),
                        reason: e.to_string(),
                    }
                    .to_string(),
                )
            }
            Err(_) => {
                return ProbeReport::failed(
                    ProbeError::Dial {
                        addr: parsed.addr(),
                        reason: format!("timeout after {}s", self.dial_timeout.as_secs()),
                    }
                    .to_string(),
                )
            }
        };

        report_from_stream(stream, &parsed.sni, self.handshake_timeout).await
    }
}

/// Handshake over an established stream and assemble the probe report.
///
/// Shared by the direct prober and the tunnel relay's SOCKS prober.
pub async fn report_from_stream<S>(stream: S, sni: &str, timeout: Duration) -> ProbeReport
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    let capture = match tls::handshake_capture(stream, sni, timeout).await {
        Ok(c) => c,
        Err(e) => return ProbeReport::failed(e.to_string()),
    };

    match cert::report_from_chain(capture.chain_der) {
        Ok(mut report) => {
            report.tls_version = capture.tls_version;
            report.cipher_suite = capture.cipher_suite;
            report.raw_staple = capture.staple;
            report.posture_issues = crate::posture::check(&report);
            report
        }
        Err(e) => ProbeReport::failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_target_fails_cleanly() {
        let prober = TlsProber::new();
        let report = prober.probe("ftp://nope").await;
        assert!(!report.probe_ok);
        assert!(report.probe_err.contains("unsupported scheme"));
        assert!(report.not_after.is_none());
    }

    #[tokio::test]
    async fn unreachable_target_reports_dial_error() {
        // Reserved TEST-NET-1 address; nothing listens there.
        let prober =
            TlsProber::with_timeouts(Duration::from_millis(300), Duration::from_millis(300));
        let report = prober.probe("tcp://192.0.2.1:443").await;
        assert!(!report.probe_ok);
        assert!(report.probe_err.starts_with("dial"));
    }
}
