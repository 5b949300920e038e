//! TrustPolicy CRD installation command.

use anyhow::{Context, Result};

use trustwatch::discover::policy_crd;

/// Install or update the TrustPolicy CRD.
pub async fn run() -> Result<i32> {
    let client = trustwatch::kube::Client::try_default()
        .await
        .context("build kubernetes client")?;
    policy_crd::install_crd(&client)
        .await
        .context("install TrustPolicy CRD")?;
    println!("TrustPolicy CRD installed");
    Ok(0)
}
