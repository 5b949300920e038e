//! # trustwatch-relay
//!
//! Ephemeral in-cluster SOCKS5 relay.
//!
//! An out-of-cluster scan cannot resolve in-cluster DNS names
//! (`svc.ns.svc.cluster.local`). The relay starts a short-lived SOCKS5 pod,
//! opens a port-forward to it, bridges a local TCP listener onto the
//! forwarded streams, and hands out a [`SocksProber`] that dials every probe
//! target through the tunnel.
//!
//! ```text
//! Idle -> PodCreating -> PodRunning -> PortForwardReady -> Closed
//! ```
//!
//! `close()` is idempotent and must be called explicitly before any
//! process-exit shortcut: the pod has an active deadline, but waiting five
//! minutes for the kubelet to reap it is not cleanup.

pub mod error;
pub mod prober;
pub mod relay;

pub use error::{RelayError, Result};
pub use prober::SocksProber;
pub use relay::{TunnelRelay, DEFAULT_RELAY_IMAGE, RELAY_PORT};
