//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use trustwatch::Severity;

use crate::output::OutputFormat;

/// Observe every TLS trust surface your cluster depends on.
///
/// trustwatch enumerates webhooks, aggregated APIs, ingress and gateway
/// listeners, TLS secrets, mesh issuers, cert-manager objects, and external
/// endpoints, probes them, and ranks the findings by severity.
#[derive(Parser, Debug)]
#[command(name = "trustwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "trustwatch.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Increase verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one scan and exit with a severity-gated code
    Scan(ScanArgs),

    /// Scan continuously and serve snapshot, metrics, and health endpoints
    Serve,

    /// Blast-radius query over a fresh scan
    Impact(ImpactArgs),

    /// Install (or update) the TrustPolicy CRD
    InstallCrd,

    /// Print version, commit, and build date
    Version,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Severity threshold for exit-code gating
    #[arg(long, default_value = "warn")]
    pub threshold: Severity,

    /// Escalate findings expiring inside this window (hours) to critical
    #[arg(long)]
    pub deploy_window_hours: Option<i64>,

    /// Compare against a saved snapshot and emit drift findings
    #[arg(long)]
    pub baseline: Option<PathBuf>,

    /// Save the snapshot to a file after the scan
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Probe in-cluster DNS targets through an ephemeral SOCKS5 relay pod
    #[arg(long)]
    pub tunnel: bool,

    /// Drop MANAGED_EXPIRY findings from output and gating
    #[arg(long)]
    pub ignore_managed: bool,
}

#[derive(Args, Debug)]
pub struct ImpactArgs {
    /// Issuer DN substring to query
    #[arg(long, group = "query")]
    pub issuer: Option<String>,

    /// Exact serial to query
    #[arg(long, group = "query")]
    pub serial: Option<String>,

    /// Subject DN substring to query
    #[arg(long, group = "query")]
    pub subject: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_threshold_parses() {
        let cli = Cli::try_parse_from(["trustwatch", "scan", "--threshold", "critical"]).unwrap();
        match cli.command {
            Commands::Scan(args) => assert_eq!(args.threshold, Severity::Critical),
            _ => panic!("expected scan"),
        }
    }
}
