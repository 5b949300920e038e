//! SOCKS5-dialling prober.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio_socks::tcp::Socks5Stream;
use tracing::debug;

use trustwatch_core::{ProbeReport, Prober};
use trustwatch_probe::prober::{report_from_stream, DIAL_TIMEOUT, HANDSHAKE_TIMEOUT};
use trustwatch_probe::target::parse_target;

/// Probes targets by dialing through the relay's local SOCKS5 port.
///
/// The relay pod resolves the target's DNS name in-cluster, so
/// `svc.ns.svc.cluster.local` targets work from outside.
#[derive(Debug, Clone)]
pub struct SocksProber {
    proxy_addr: SocketAddr,
    dial_timeout: Duration,
    handshake_timeout: Duration,
}

impl SocksProber {
    /// A prober dialing through the given local SOCKS5 endpoint.
    #[must_use]
    pub const fn new(proxy_addr: SocketAddr) -> Self {
        Self {
            proxy_addr,
            dial_timeout: DIAL_TIMEOUT,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }
}

#[async_trait]
impl Prober for SocksProber {
    async fn probe(&self, target: &str) -> ProbeReport {
        let parsed = match parse_target(target) {
            Ok(t) => t,
            Err(e) => return ProbeReport::failed(e.to_string()),
        };
        debug!(target = %target, proxy = %self.proxy_addr, "probing via relay");

        let stream = match tokio::time::timeout(
            self.dial_timeout,
            Socks5Stream::connect(self.proxy_addr, (parsed.host.as_str(), parsed.port)),
        )
        .await
        {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => {
                return ProbeReport::failed(format!(
                    "socks dial {} via {}: {e}",
                    parsed.addr(),
                    self.proxy_addr
                ))
            }
            Err(_) => {
                return ProbeReport::failed(format!(
                    "socks dial {} via {}: timeout after {}s",
                    parsed.addr(),
                    self.proxy_addr,
                    self.dial_timeout.as_secs()
                ))
            }
        };

        report_from_stream(stream, &parsed.sni, self.handshake_timeout).await
    }
}
