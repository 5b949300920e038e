//! # trustwatch-discover
//!
//! Trust-surface discoverers.
//!
//! Each discoverer enumerates one kind of certificate-bearing surface and
//! yields findings for it: admission webhooks, aggregated API services, the
//! control plane itself, TLS secrets, ingress and gateway listeners, mesh
//! identity issuers, cert-manager objects, annotated services, external
//! endpoints, SPIFFE trust bundles, and (feature-gated) cloud certificate
//! stores.
//!
//! Discoverers that probe accept an injected [`trustwatch_core::Prober`],
//! so the tunnel relay can substitute its SOCKS-dialling one. Namespace
//! scoped discoverers only list namespaces the caller can access, resolved
//! up front via `SelfSubjectAccessReview` (see [`access`]).

pub mod access;
pub mod annotation;
pub mod apiserver;
pub mod apiservice;
pub mod certmanager;
pub mod cloud;
pub mod error;
pub mod external;
pub mod gateway;
pub mod ingress;
pub mod mesh;
pub mod policy_crd;
pub mod secret;
pub mod spiffe;
pub mod util;
pub mod webhook;

pub use error::{DiscoverError, Result};
pub use policy_crd::{PolicyRule, PolicyTarget, RuleType, TrustPolicy, TrustPolicySpec};
