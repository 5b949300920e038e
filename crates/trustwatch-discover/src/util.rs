//! Shared discovery helpers.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};

use trustwatch_core::{CertFinding, Prober};

/// Bounded worker pool for per-discoverer probe fan-out.
pub const PROBE_CONCURRENCY: usize = 16;

/// Probe every finding that carries a target, preserving insertion order.
///
/// Findings without a target pass through untouched (their material was
/// parsed in place).
pub async fn probe_all(prober: Arc<dyn Prober>, pending: Vec<CertFinding>) -> Vec<CertFinding> {
    stream::iter(pending)
        .map(|mut finding| {
            let prober = Arc::clone(&prober);
            async move {
                if let Some(target) = finding.target.clone() {
                    let report = prober.probe(&target).await;
                    report.apply_to(&mut finding);
                }
                finding
            }
        })
        .buffered(PROBE_CONCURRENCY)
        .collect()
        .await
}


#[cfg(test)]
mod tests {
    use super::*;
    use trustwatch_core::SourceKind;

    #[tokio::test]
    async fn probe_all_preserves_order_and_skips_untargeted() {
        let prober: Arc<dyn Prober> = Arc::new(testing::StaticProber);

        let mut with_target = CertFinding::new(SourceKind::External, "a");
        with_target.target = Some("tcp://a.example.com:443".to_string());
        let without_target = CertFinding::new(SourceKind::TlsSecret, "b");
        let mut second_target = CertFinding::new(SourceKind::External, "c");
        second_target.target = Some("tcp://c.example.com:443".to_string());

        let out = probe_all(
            prober,
            vec![with_target, without_target, second_target],
        )
        .await;

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].name, "a");
        assert!(out[0].probe_ok);
        assert_eq!(out[1].name, "b");
        assert!(!out[1].probe_ok);
        assert_eq!(out[2].name, "c");
        assert!(out[2].probe_ok);
    }
}
