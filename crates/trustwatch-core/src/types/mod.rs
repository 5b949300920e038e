//! Finding, severity, and snapshot types.

pub mod finding;
pub mod severity;
pub mod snapshot;
pub mod source;

pub use finding::{CertFinding, FindingType};
pub use severity::{classify, Severity};
pub use snapshot::{sort_findings, ScanEnvelope, Snapshot};
pub use source::SourceKind;
