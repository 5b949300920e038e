//! trustwatch - TLS trust-surface observer for Kubernetes platforms.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match trustwatch_cli::run().await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(3)),
        Err(e) => {
            eprintln!("trustwatch: {e:#}");
            // No snapshot was produced; report a degraded run.
            ExitCode::from(3)
        }
    }
}
