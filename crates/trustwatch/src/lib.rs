//! Fleet-scale TLS trust-surface observer for Kubernetes platforms.
//!
//! trustwatch enumerates every place a cluster terminates or relies on
//! X.509 trust, probes each endpoint, and produces a ranked snapshot with
//! severity, expiry, revocation, and policy compliance.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trustwatch::{Config, TlsProber};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let client = trustwatch::kube::Client::try_default().await?;
//!     let kube_config = trustwatch::kube::Config::infer().await?;
//!
//!     let orchestrator = trustwatch::scanner::build_orchestrator(
//!         &config,
//!         trustwatch::scanner::ScanDeps {
//!             client,
//!             cluster_url: kube_config.cluster_url.to_string(),
//!             prober: Arc::new(TlsProber::new()),
//!             baseline: None,
//!         },
//!     )
//!     .await;
//!
//!     let snapshot = orchestrator.run().await;
//!     println!("{} findings", snapshot.findings.len());
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cloud-aws` - AWS Certificate Manager discovery
//! - `cloud-gcp` - GCP Certificate Manager discovery
//! - `cloud-azure` - Azure Key Vault discovery
//! - `cloud` - all of the above

// Re-export the model
pub use trustwatch_core::*;

// Re-export probing
pub use trustwatch_probe::{RevocationChecker, TlsProber};

// Re-export the engine surface
pub use trustwatch_engine::scanner;
pub use trustwatch_engine::{Config, Enrichers, Orchestrator, BUILD_INFO};

// Re-export the tunnel relay
pub use trustwatch_relay::{SocksProber, TunnelRelay};

// Sub-crates for callers that need the full surface
pub use trustwatch_discover as discover;
pub use trustwatch_engine as engine;
pub use trustwatch_probe as probe;
pub use trustwatch_relay as relay;

// Re-export the kubernetes client for convenience
pub use kube;

// Re-export runtime for convenience
pub use serde;
pub use serde_json;
pub use tokio;
