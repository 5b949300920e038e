//! Output rendering: ranked table or JSON envelope.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use trustwatch::{sort_findings, CertFinding, ScanEnvelope, Severity, Snapshot};

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Ranked table
    #[default]
    Table,
    /// JSON envelope `{ exitCode, snapshot }`
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Render a snapshot in the selected format.
pub fn render(format: OutputFormat, snapshot: &Snapshot, exit_code: i32) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let envelope = ScanEnvelope {
                exit_code,
                snapshot: snapshot.clone(),
            };
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        OutputFormat::Table => {
            println!("{}", render_table(snapshot));
            print_summary(snapshot);
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "SEVERITY")]
    severity: String,
    #[tabled(rename = "SOURCE")]
    source: String,
    #[tabled(rename = "NAMESPACE")]
    namespace: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "NOT AFTER")]
    not_after: String,
    #[tabled(rename = "DETAIL")]
    detail: String,
}

/// Ranked findings table: Critical first, then soonest expiry.
#[must_use]
pub fn render_table(snapshot: &Snapshot) -> String {
    let mut findings = snapshot.findings.clone();
    sort_findings(&mut findings);

    let rows: Vec<Row> = findings.iter().map(row_for).collect();
    let mut table = Table::new(rows);
    table.with(Style::blank());
    table.to_string()
}

fn row_for(f: &CertFinding) -> Row {
    let severity = match f.severity {
        Severity::Critical => f.severity.as_str().red().bold().to_string(),
        Severity::Warn => f.severity.as_str().yellow().to_string(),
        Severity::Info => f.severity.as_str().normal().to_string(),
    };
    Row {
        severity,
        source: f.source.to_string(),
        namespace: f.namespace.clone().unwrap_or_default(),
        name: f.name.clone(),
        not_after: f
            .not_after
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        detail: detail_for(f),
    }
}

fn detail_for(f: &CertFinding) -> String {
    if !f.probe_ok {
        return format!("probe failed: {}", f.probe_err);
    }
    let mut parts = Vec::new();
    if let Some(ft) = f.finding_type {
        parts.push(ft.as_str().to_string());
    }
    if !f.notes.is_empty() {
        parts.push(f.notes.clone());
    }
    if !f.revocation_issues.is_empty() {
        parts.push(f.revocation_issues.join("; "));
    }
    if !f.chain_errors.is_empty() {
        parts.push(f.chain_errors.join("; "));
    }
    if !f.posture_issues.is_empty() {
        parts.push(f.posture_issues.join("; "));
    }
    parts.join(" | ")
}

fn print_summary(snapshot: &Snapshot) {
    let critical = snapshot.count_at(Severity::Critical);
    let warn = snapshot.count_at(Severity::Warn);
    let info = snapshot.count_at(Severity::Info);
    println!(
        "\n{} findings: {} critical, {} warn, {} info; {} discovery errors",
        snapshot.findings.len(),
        critical,
        warn,
        info,
        snapshot.errors.len()
    );
    for (source, error) in &snapshot.errors {
        eprintln!("  {}: {}", source.yellow(), error);
    }
}
