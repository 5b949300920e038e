//! Point-in-time scan result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::finding::CertFinding;
use super::severity::Severity;
use crate::error::{CoreError, Result};

/// A point-in-time collection of findings plus per-discoverer errors.
///
/// Value-typed: once returned by the orchestrator a snapshot is never
/// mutated. Serve mode replaces the whole snapshot on refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Wall-clock time the scan started.
    pub at: DateTime<Utc>,
    /// Findings in discoverer-insertion order.
    pub findings: Vec<CertFinding>,
    /// Discoverer label -> error message for failed discoverers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

/// Envelope produced by single-shot commands with `-o json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEnvelope {
    /// Process exit code the command will return.
    pub exit_code: i32,
    /// The scan result.
    pub snapshot: Snapshot,
}

impl Snapshot {
    /// Count findings at the given severity.
    #[must_use]
    pub fn count_at(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Parse a saved snapshot document.
    ///
    /// Accepts both a raw snapshot and an envelope containing a
    /// `snapshot` field.
    pub fn from_json_document(data: &[u8]) -> Result<Self> {
        if let Ok(envelope) = serde_json::from_slice::<ScanEnvelope>(data) {
            return Ok(envelope.snapshot);
        }
        serde_json::from_slice::<Self>(data).map_err(|e| {
            CoreError::Baseline(format!("neither snapshot nor envelope: {e}"))
        })
    }

    /// Load a baseline file from disk.
    pub fn load_baseline(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json_document(&data)
    }

    /// Write this snapshot to disk as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

/// Stable consumer sort: Critical -> Warn -> Info, ties broken by earliest
/// `not_after` (findings without expiry last within their band).
///
/// Applied by output layers, never by the orchestrator.
pub fn sort_findings(findings: &mut [CertFinding]) {
    findings.sort_by(|a, b| {
        b.severity.cmp(&a.severity).then_with(|| {
            match (a.not_after, b.not_after) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        })
    });
}
