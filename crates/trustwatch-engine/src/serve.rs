//! Serve mode: a scan loop behind an HTTP surface.
//!
//! The current snapshot lives in a readers-writer cell and is replaced
//! wholesale after every scan; readers never observe partial state. A scan
//! that panics is logged and the interval continues.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use trustwatch_core::{sort_findings, Severity, Snapshot};

use crate::config::ServeSettings;
use crate::error::{EngineError, Result};
use crate::metrics::MetricsCollector;

/// Drain budget after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Shared serve-mode state.
pub struct ServeState {
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    refreshed_at: RwLock<Option<Instant>>,
    refresh_every: Duration,
    metrics: MetricsCollector,
}

impl ServeState {
    /// Fresh state with an empty snapshot cell.
    pub fn new(refresh_every: Duration) -> Result<Self> {
        Ok(Self {
            snapshot: RwLock::new(None),
            refreshed_at: RwLock::new(None),
            refresh_every,
            metrics: MetricsCollector::new()?,
        })
    }

    /// Whole-snapshot replacement; readers see old or new, never a mix.
    pub fn publish(&self, snapshot: Snapshot, scan_duration_secs: f64) {
        self.metrics.update(&snapshot, scan_duration_secs);
        if let Ok(mut cell) = self.snapshot.write() {
            *cell = Some(Arc::new(snapshot));
        }
        if let Ok(mut at) = self.refreshed_at.write() {
            *at = Some(Instant::now());
        }
    }

    fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().ok().and_then(|s| s.clone())
    }

    fn age(&self) -> Option<Duration> {
        self.refreshed_at
            .read()
            .ok()
            .and_then(|at| at.map(|t| t.elapsed()))
    }
}

/// A snapshot newer than `2 * refresh_every` is healthy.
#[must_use]
pub fn is_healthy(age: Option<Duration>, refresh_every: Duration) -> bool {
    age.is_some_and(|a| a < refresh_every * 2)
}

/// Run the scan loop and HTTP server until interrupted.
pub async fn run<F, Fut>(settings: &ServeSettings, scan: F) -> Result<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Snapshot> + Send + 'static,
{
    let refresh_every = Duration::from_secs(settings.refresh_every_secs);
    let state = Arc::new(ServeState::new(refresh_every)?);

    tokio::spawn(scan_loop(Arc::clone(&state), refresh_every, scan));

    let app = router(Arc::clone(&state));
    let listener = TcpListener::bind(&settings.listen_addr)
        .await
        .map_err(|e| EngineError::Serve(format!("bind {}: {e}", settings.listen_addr)))?;
    info!(addr = %settings.listen_addr, "serve mode listening");

    let shutdown = Arc::new(Notify::new());
    let shutdown_rx = Arc::clone(&shutdown);
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown_rx.notified().await })
            .await
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| EngineError::Serve(format!("signal handler: {e}")))?;
    info!("shutdown requested");
    shutdown.notify_one();

    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(e))) => Err(EngineError::Serve(e.to_string())),
        Ok(Err(e)) => Err(EngineError::Serve(format!("server task: {e}"))),
        Err(_) => {
            warn!("connections still open after {}s, exiting", SHUTDOWN_GRACE.as_secs());
            Ok(())
        }
    }
}

/// The HTTP surface.
pub fn router(state: Arc<ServeState>) -> Router {
    Router::new()
        .route("/api/v1/snapshot", get(snapshot_handler))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/", get(problems_handler))
        .with_state(state)
}

async fn scan_loop<F, Fut>(state: Arc<ServeState>, refresh_every: Duration, scan: F)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Snapshot> + Send + 'static,
{
    let mut interval = tokio::time::interval(refresh_every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let started = Instant::now();
        // Run the scan in its own task so a panic cannot kill the loop.
        match tokio::spawn(scan()).await {
            Ok(snapshot) => {
                let elapsed = started.elapsed().as_secs_f64();
                info!(
                    findings = snapshot.findings.len(),
                    errors = snapshot.errors.len(),
                    seconds = elapsed,
                    "scan complete"
                );
                state.publish(snapshot, elapsed);
            }
            Err(e) if e.is_panic() => error!(error = %e, "scan panicked; continuing"),
            Err(e) => error!(error = %e, "scan task failed; continuing"),
        }
    }
}

async fn snapshot_handler(State(state): State<Arc<ServeState>>) -> Response {
    match state.current() {
        Some(snapshot) => Json(snapshot.as_ref().clone()).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "no snapshot yet").into_response(),
    }
}

async fn metrics_handler(State(state): State<Arc<ServeState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.gather(),
    )
        .into_response()
}

async fn healthz_handler(State(state): State<Arc<ServeState>>) -> Response {
    if is_healthy(state.age(), state.refresh_every) {
        (StatusCode::OK, "ok").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "snapshot stale").into_response()
    }
}

async fn problems_handler(State(state): State<Arc<ServeState>>) -> Response {
    match state.current() {
        Some(snapshot) => Html(problems_html(&snapshot)).into_response(),
        None => Html("<html><body><p>no snapshot yet</p></body></html>".to_string())
            .into_response(),
    }
}

/// Minimal informational problems page: ranked non-Info findings.
#[must_use]
pub fn problems_html(snapshot: &Snapshot) -> String {
    let mut findings = snapshot.findings.clone();
    sort_findings(&mut findings);

    let mut rows = String::new();
    for f in findings.iter().filter(|f| f.severity > Severity::Info || !f.probe_ok) {
        let status = if f.probe_ok {
            f.not_after.map(|t| t.to_rfc3339()).unwrap_or_default()
        } else {
            format!("probe failed: {}", html_escape(&f.probe_err))
        };
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            f.severity,
            f.source,
            html_escape(&f.name),
            status
        ));
    }

    format!(
        "<html><head><title>trustwatch</title></head><body>\
         <h1>trustwatch problems</h1>\
         <p>scanned {} ({} findings, {} errors)</p>\
         <table border=\"1\"><tr><th>severity</th><th>source</th><th>name</th><th>status</th></tr>\n{rows}</table>\
         </body></html>",
        snapshot.at.to_rfc3339(),
        snapshot.findings.len(),
        snapshot.errors.len()
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use trustwatch_core::{CertFinding, SourceKind};

    #[test]
    fn health_window_is_twice_the_refresh() {
        let refresh = Duration::from_secs(300);
        assert!(!is_healthy(None, refresh));
        assert!(is_healthy(Some(Duration::from_secs(10)), refresh));
        assert!(is_healthy(Some(Duration::from_secs(599)), refresh));
        assert!(!is_healthy(Some(Duration::from_secs(600)), refresh));
    }

    #[test]
    fn publish_replaces_the_whole_snapshot() {
        let state = ServeState::new(Duration::from_secs(60)).unwrap();
        assert!(state.current().is_none());
        assert!(state.age().is_none());

        let snapshot = Snapshot {
            at: Utc::now(),
            findings: Vec::new(),
            errors: BTreeMap::new(),
        };
        state.publish(snapshot, 1.0);
        assert!(state.current().is_some());
        assert!(state.age().is_some());
    }

    #[test]
    fn problems_page_lists_failures_and_escapes() {
        let mut warn = CertFinding::new(SourceKind::IngressTls, "shop/<script>");
        warn.probe_ok = true;
        warn.severity = Severity::Warn;
        warn.not_after = Some(Utc::now());

        let mut quiet = CertFinding::new(SourceKind::External, "fine");
        quiet.probe_ok = true;

        let snapshot = Snapshot {
            at: Utc::now(),
            findings: vec![quiet, warn],
            errors: BTreeMap::new(),
        };
        let html = problems_html(&snapshot);
        assert!(html.contains("shop/&lt;script&gt;"));
        assert!(!html.contains("<td>fine</td>"));
    }
}
