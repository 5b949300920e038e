//! # trustwatch-core
//!
//! Canonical data model for the trustwatch TLS trust-surface observer.
//!
//! A scan walks every place the platform terminates or relies on X.509
//! trust -- admission webhooks, aggregated APIs, ingress and gateway TLS,
//! mesh identity issuers, cert-manager objects, external endpoints --
//! probes each one, and collects the observations into a [`Snapshot`].
//!
//! ## Data Flow
//!
//! ```text
//! Discoverers (one per trust-surface kind)
//!   -> Vec<CertFinding> each, merged in registry order
//!   -> severity assignment from (warnBefore, critBefore)
//!   -> enrichment passes (revocation, CT, drift, policy, rotation)
//!   -> Snapshot { at, findings, errors }
//!   -> exit-code mapping / serve-mode publication
//! ```
//!
//! This crate holds only the model and the pure rules over it: severity
//! classification, deploy-window escalation, exit-code mapping, snapshot
//! ordering, and the capability traits ([`Discoverer`], [`Prober`]) that the
//! heavier crates implement.

pub mod discover;
pub mod error;
pub mod exit;
pub mod probe;
pub mod types;

pub use discover::{Discoverer, DiscoveryOutcome};
pub use error::{CoreError, Result};
pub use exit::{escalate_deploy_window, exit_code};
pub use probe::{ProbeReport, Prober};
pub use types::*;
