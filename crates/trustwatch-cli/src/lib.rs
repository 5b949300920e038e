//! # trustwatch-cli
//!
//! Command-line interface for trustwatch.
//!
//! Commands:
//!
//! - **scan**: one-shot scan, ranked table or JSON envelope, exit code
//!   0/1/2/3 under a severity threshold
//! - **serve**: continuous scanning behind `/api/v1/snapshot`, `/metrics`,
//!   and `/healthz`
//! - **impact**: blast-radius queries by issuer, serial, or subject
//! - **install-crd**: idempotent TrustPolicy CRD installation

pub mod cli;
pub mod output;

pub use cli::run;
