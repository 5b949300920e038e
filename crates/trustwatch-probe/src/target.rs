//! Probe target URL parsing.

use url::Url;

use crate::error::{ProbeError, Result};

/// Default TLS port when the target omits one.
const DEFAULT_TLS_PORT: u16 = 443;

/// A parsed probe target: where to dial and what SNI to present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// Host to dial (DNS name or IP).
    pub host: String,
    /// Port to dial.
    pub port: u16,
    /// SNI to present; defaults to the host, overridable via `?sni=`.
    pub sni: String,
}

impl ProbeTarget {
    /// `host:port` form for dialing.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a target URL of scheme `tcp://host:port[?sni=name]` or
/// `https://host[:port]`.
pub fn parse_target(raw: &str) -> Result<ProbeTarget> {
    let url = Url::parse(raw).map_err(|e| ProbeError::Target {
        target: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "tcp" | "https" => {}
        other => {
            return Err(ProbeError::Target {
                target: raw.to_string(),
                reason: format!("unsupported scheme {other}"),
            })
        }
    }

    let host = url
        .host_str()
        .ok_or_else(|| ProbeError::Target {
            target: raw.to_string(),
            reason: "missing host".to_string(),
        })?
        .to_string();
    let port = url.port().unwrap_or(DEFAULT_TLS_PORT);

    let sni = url
        .query_pairs()
        .find(|(k, _)| k == "sni")
        .map_or_else(|| host.clone(), |(_, v)| v.into_owned());

    Ok(ProbeTarget { host, port, sni })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_with_port_and_sni_override() {
        let t = parse_target("tcp://webhook.default.svc:8443?sni=webhook.example.com").unwrap();
        assert_eq!(t.host, "webhook.default.svc");
        assert_eq!(t.port, 8443);
        assert_eq!(t.sni, "webhook.example.com");
        assert_eq!(t.addr(), "webhook.default.svc:8443");
    }

    #[test]
    fn https_defaults_port_and_sni() {
        let t = parse_target("https://example.com").unwrap();
        assert_eq!(t.port, 443);
        assert_eq!(t.sni, "example.com");

        let t = parse_target("https://example.com:8443").unwrap();
        assert_eq!(t.port, 8443);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_target("ftp://example.com").is_err());
        assert!(parse_target("not a url").is_err());
    }
}
