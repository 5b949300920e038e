//! Continuous-scan serve command.

use std::sync::Arc;

use anyhow::{Context, Result};

use trustwatch::engine::scanner::{build_orchestrator, ScanDeps};
use trustwatch::engine::serve;
use trustwatch::{Config, TlsProber};

use crate::cli::args::Cli;

/// Scan on an interval and serve snapshot, metrics, and health endpoints.
pub async fn run(cli: &Cli) -> Result<i32> {
    let config = Config::load(&cli.config).context("load config")?;
    let client = trustwatch::kube::Client::try_default()
        .await
        .context("build kubernetes client")?;
    let kube_config = trustwatch::kube::Config::infer()
        .await
        .context("infer kube config")?;

    let orchestrator = Arc::new(
        build_orchestrator(
            &config,
            ScanDeps {
                client,
                cluster_url: kube_config.cluster_url.to_string(),
                prober: Arc::new(TlsProber::new()),
                baseline: None,
            },
        )
        .await,
    );

    serve::run(&config.serve, move || {
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.run().await }
    })
    .await
    .context("serve")?;

    Ok(0)
}
