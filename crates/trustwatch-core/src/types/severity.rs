//! Severity levels and expiry classification.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a finding. Totally ordered: `Info < Warn < Critical`.
///
/// Used for ranking, threshold gating, and exit codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No action needed.
    #[default]
    Info,
    /// Expiry inside the warning window, or a quality concern.
    Warn,
    /// Expired, expiring inside the critical window, or a trust failure.
    Critical,
}

impl Severity {
    /// Wire/label form of the severity.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "critical" | "crit" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Classify a certificate expiry against the warn/critical windows.
///
/// Pure: the same inputs always yield the same severity.
/// `not_after <= now` is always [`Severity::Critical`].
#[must_use]
pub fn classify(
    now: DateTime<Utc>,
    not_after: DateTime<Utc>,
    warn_before: Duration,
    crit_before: Duration,
) -> Severity {
    if not_after <= now + crit_before {
        Severity::Critical
    } else if not_after <= now + warn_before {
        Severity::Warn
    } else {
        Severity::Info
    }
}
