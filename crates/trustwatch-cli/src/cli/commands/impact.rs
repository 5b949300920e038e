//! Blast-radius query command.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use trustwatch::engine::impact::ImpactGraph;
use trustwatch::engine::scanner::{build_orchestrator, ScanDeps};
use trustwatch::{Config, TlsProber};

use crate::cli::args::{Cli, ImpactArgs};

/// Scan, index, and answer one blast-radius query.
pub async fn run(cli: &Cli, args: &ImpactArgs) -> Result<i32> {
    let config = Config::load(&cli.config).context("load config")?;
    let client = trustwatch::kube::Client::try_default()
        .await
        .context("build kubernetes client")?;
    let kube_config = trustwatch::kube::Config::infer()
        .await
        .context("infer kube config")?;

    let orchestrator = build_orchestrator(
        &config,
        ScanDeps {
            client,
            cluster_url: kube_config.cluster_url.to_string(),
            prober: Arc::new(TlsProber::new()),
            baseline: None,
        },
    )
    .await;
    let snapshot = orchestrator.run().await;
    let graph = ImpactGraph::build(snapshot.findings);

    let result = if let Some(issuer) = &args.issuer {
        graph.query_issuer(issuer)
    } else if let Some(serial) = &args.serial {
        graph.query_serial(serial)
    } else if let Some(subject) = &args.subject {
        graph.query_subject(subject)
    } else {
        bail!("one of --issuer, --serial, --subject is required");
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if result.findings.is_empty() { 1 } else { 0 })
}
