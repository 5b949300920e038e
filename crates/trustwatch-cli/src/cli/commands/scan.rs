//! One-shot scan command.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use trustwatch::engine::scanner::{build_orchestrator, ScanDeps};
use trustwatch::{
    escalate_deploy_window, exit_code, Config, FindingType, Prober, Snapshot, TlsProber,
    TunnelRelay,
};

use crate::cli::args::{Cli, ScanArgs};
use crate::output;

/// Relay pod readiness budget.
const RELAY_START_TIMEOUT: Duration = Duration::from_secs(120);

/// Run one scan and map the snapshot to an exit code.
pub async fn run(cli: &Cli, args: &ScanArgs) -> Result<i32> {
    let config = Config::load(&cli.config).context("load config")?;
    let client = trustwatch::kube::Client::try_default()
        .await
        .context("build kubernetes client")?;
    let kube_config = trustwatch::kube::Config::infer()
        .await
        .context("infer kube config")?;

    let relay = args.tunnel.then(|| {
        TunnelRelay::new(
            client.clone(),
            config.relay.namespace.clone(),
            config.relay.image.clone(),
            None,
            config.relay.pull_secret.clone(),
        )
    });

    // Single exit path: whatever happens, the relay pod is torn down
    // before the computed code leaves this function.
    let result = scan_inner(
        cli,
        args,
        &config,
        client,
        kube_config.cluster_url.to_string(),
        relay.as_ref(),
    )
    .await;
    if let Some(relay) = &relay {
        relay.close().await;
    }
    result
}

async fn scan_inner(
    cli: &Cli,
    args: &ScanArgs,
    config: &Config,
    client: trustwatch::kube::Client,
    cluster_url: String,
    relay: Option<&TunnelRelay>,
) -> Result<i32> {
    let prober: Arc<dyn Prober> = match relay {
        Some(relay) => {
            relay
                .start(RELAY_START_TIMEOUT)
                .await
                .context("start tunnel relay")?;
            info!(
                pod = relay.pod_name().unwrap_or_default(),
                port = relay.local_port().unwrap_or_default(),
                "probing through tunnel relay"
            );
            Arc::new(relay.prober().context("relay prober")?)
        }
        None => Arc::new(TlsProber::new()),
    };

    let baseline = args
        .baseline
        .as_deref()
        .map(Snapshot::load_baseline)
        .transpose()
        .context("load baseline")?;

    let orchestrator = build_orchestrator(
        config,
        ScanDeps {
            client,
            cluster_url,
            prober,
            baseline,
        },
    )
    .await;

    let mut snapshot = orchestrator.run().await;

    if args.ignore_managed || config.ignore_managed {
        snapshot
            .findings
            .retain(|f| f.finding_type != Some(FindingType::ManagedExpiry));
    }
    if let Some(hours) = args.deploy_window_hours {
        escalate_deploy_window(&mut snapshot, Utc::now(), chrono::Duration::hours(hours));
    }

    let code = exit_code(&snapshot, args.threshold);

    if let Some(path) = &args.save {
        snapshot.save(path).context("save snapshot")?;
        info!(path = %path.display(), "snapshot saved");
    }

    output::render(cli.output, &snapshot, code)?;
    Ok(code)
}
