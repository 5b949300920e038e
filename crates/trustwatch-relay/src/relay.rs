//! Relay pod lifecycle and port-forward bridging.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, LocalObjectReference, Pod, PodSpec, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, DeleteParams, ObjectMeta, PostParams, ResourceExt};
use kube::Client;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::prober::SocksProber;

/// SOCKS5 port the relay container listens on.
pub const RELAY_PORT: u16 = 1080;

/// Relay image published by the project.
pub const DEFAULT_RELAY_IMAGE: &str = "ghcr.io/trustwatch/trustwatch-relay:v0.4.0";

/// Hard cap on relay pod lifetime; the kubelet reaps leaked pods.
const ACTIVE_DEADLINE_SECS: i64 = 300;

/// Poll interval while waiting for the pod.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Relay lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    PodCreating,
    PodRunning,
    PortForwardReady,
    Closed,
}

#[derive(Debug)]
struct Inner {
    state: State,
    pod_name: Option<String>,
    local_port: Option<u16>,
    listener: Option<JoinHandle<()>>,
}

impl Inner {
    /// First close wins; later calls are no-ops.
    fn begin_close(&mut self) -> Option<(Option<String>, Option<JoinHandle<()>>)> {
        if self.state == State::Closed {
            return None;
        }
        self.state = State::Closed;
        self.local_port = None;
        Some((self.pod_name.take(), self.listener.take()))
    }
}

/// Ephemeral SOCKS5 pod plus the local plumbing to reach it.
pub struct TunnelRelay {
    api: Api<Pod>,
    namespace: String,
    image: String,
    command: Option<Vec<String>>,
    pull_secret: Option<String>,
    inner: Mutex<Inner>,
}

impl TunnelRelay {
    /// Construct a relay targeting the given namespace.
    ///
    /// `image`, `command`, and `pull_secret` default to the project-published
    /// relay when `None`.
    #[must_use]
    pub fn new(
        client: Client,
        namespace: impl Into<String>,
        image: Option<String>,
        command: Option<Vec<String>>,
        pull_secret: Option<String>,
    ) -> Self {
        let namespace = namespace.into();
        Self {
            api: Api::namespaced(client, &namespace),
            namespace,
            image: image.unwrap_or_else(|| DEFAULT_RELAY_IMAGE.to_string()),
            command,
            pull_secret,
            inner: Mutex::new(Inner {
                state: State::Idle,
                pod_name: None,
                local_port: None,
                listener: None,
            }),
        }
    }

    /// Create the pod, wait for readiness, and start the local listener.
    ///
    /// Returns once the local side is accepting connections. Image-pull
    /// failures return immediately with the container's waiting reason;
    /// other transient waits are retried until `deadline`.
    pub async fn start(&self, deadline: Duration) -> Result<()> {
        self.transition(State::Idle, State::PodCreating)?;

        let pod = build_relay_pod(
            &self.image,
            self.command.as_deref(),
            self.pull_secret.as_deref(),
        );
        let created = self
            .api
            .create(&PostParams::default(), &pod)
            .await
            .map_err(|e| RelayError::PodCreate {
                namespace: self.namespace.clone(),
                reason: e.to_string(),
            })?;
        let pod_name = created.name_any();
        info!(pod = %pod_name, namespace = %self.namespace, "relay pod created");
        if let Ok(mut inner) = self.inner.lock() {
            inner.pod_name = Some(pod_name.clone());
        }

        self.wait_ready(&pod_name, deadline).await?;
        self.set_state(State::PodRunning);

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let local_port = listener.local_addr()?.port();
        let task = spawn_bridge(self.api.clone(), pod_name.clone(), listener);

        if let Ok(mut inner) = self.inner.lock() {
            inner.local_port = Some(local_port);
            inner.listener = Some(task);
            inner.state = State::PortForwardReady;
        }
        info!(pod = %pod_name, port = local_port, "relay tunnel ready");
        Ok(())
    }

    /// Local port the tunnel listens on, once ready.
    pub fn local_port(&self) -> Option<u16> {
        self.inner.lock().ok().and_then(|i| i.local_port)
    }

    /// Name of the relay pod, once created.
    pub fn pod_name(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|i| i.pod_name.clone())
    }

    /// A prober that dials every target through the tunnel.
    pub fn prober(&self) -> Result<SocksProber> {
        let port = self.local_port().ok_or(RelayError::NotRunning)?;
        Ok(SocksProber::new(([127, 0, 0, 1], port).into()))
    }

    /// Tear down the tunnel and delete the pod with grace period zero.
    ///
    /// Idempotent; failures to delete are logged, never returned, so exit
    /// paths can always call this.
    pub async fn close(&self) {
        let work = self.inner.lock().ok().and_then(|mut i| i.begin_close());
        let Some((pod_name, listener)) = work else {
            return;
        };
        if let Some(task) = listener {
            task.abort();
        }
        if let Some(name) = pod_name {
            let dp = DeleteParams::default().grace_period(0);
            match self.api.delete(&name, &dp).await {
                Ok(_) => info!(pod = %name, "relay pod deleted"),
                Err(kube::Error::Api(ae)) if ae.code == 404 => {}
                Err(e) => warn!(pod = %name, error = %e, "relay pod delete failed"),
            }
        }
    }

    async fn wait_ready(&self, pod_name: &str, deadline: Duration) -> Result<()> {
        let started = tokio::time::Instant::now();
        let mut last_status = "Pending".to_string();

        loop {
            if started.elapsed() > deadline {
                return Err(RelayError::NotReady {
                    pod: pod_name.to_string(),
                    reason: last_status,
                });
            }

            let pod = self
                .api
                .get(pod_name)
                .await
                .map_err(|e| RelayError::NotReady {
                    pod: pod_name.to_string(),
                    reason: e.to_string(),
                })?;

            if let Some(status) = &pod.status {
                if let Some(waiting) = status
                    .container_statuses
                    .as_ref()
                    .and_then(|cs| cs.first())
                    .and_then(|c| c.state.as_ref())
                    .and_then(|s| s.waiting.as_ref())
                {
                    let reason = waiting.reason.clone().unwrap_or_default();
                    if is_fatal_pull_reason(&reason) {
                        return Err(RelayError::ImagePull {
                            reason,
                            message: waiting.message.clone().unwrap_or_default(),
                        });
                    }
                    if !reason.is_empty() {
                        last_status = reason;
                    }
                }

                let ready = status
                    .conditions
                    .iter()
                    .flatten()
                    .any(|c| c.type_ == "Ready" && c.status == "True");
                if status.phase.as_deref() == Some("Running") && ready {
                    return Ok(());
                }
                if let Some(phase) = &status.phase {
                    last_status.clone_from(phase);
                }
            }

            debug!(pod = %pod_name, status = %last_status, "waiting for relay pod");
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn transition(&self, from: State, to: State) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| RelayError::NotRunning)?;
        if inner.state != from {
            return Err(RelayError::AlreadyStarted);
        }
        inner.state = to;
        Ok(())
    }

    fn set_state(&self, to: State) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.state = to;
        }
    }
}

/// Accept local connections and bridge each one onto a fresh port-forward
/// stream to the relay pod.
fn spawn_bridge(api: Api<Pod>, pod_name: String, listener: TcpListener) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Ok((mut conn, peer)) = listener.accept().await else {
                break;
            };
            debug!(peer = %peer, pod = %pod_name, "bridging connection");
            let api = api.clone();
            let pod = pod_name.clone();
            tokio::spawn(async move {
                match api.portforward(&pod, &[RELAY_PORT]).await {
                    Ok(mut pf) => {
                        let Some(mut upstream) = pf.take_stream(RELAY_PORT) else {
                            warn!(pod = %pod, "port-forward stream unavailable");
                            return;
                        };
                        if let Err(e) =
                            tokio::io::copy_bidirectional(&mut conn, &mut upstream).await
                        {
                            debug!(pod = %pod, error = %e, "bridge closed");
                        }
                    }
                    Err(e) => warn!(pod = %pod, error = %e, "port-forward failed"),
                }
            });
        }
    })
}

/// Waiting reasons that will never resolve by waiting longer.
#[must_use]
pub fn is_fatal_pull_reason(reason: &str) -> bool {
    matches!(
        reason,
        "ErrImagePull" | "ImagePullBackOff" | "InvalidImageName"
    )
}

/// `:latest` (or untagged) images are re-pulled; pinned tags are not.
#[must_use]
pub fn pull_policy(image: &str) -> &'static str {
    let name = image.rsplit('/').next().unwrap_or(image);
    match name.split_once(':') {
        Some((_, tag)) if tag != "latest" => "IfNotPresent",
        _ => "Always",
    }
}

/// The relay pod spec: tightly bounded, labelled, and never restarted.
#[must_use]
pub fn build_relay_pod(
    image: &str,
    command: Option<&[String]>,
    pull_secret: Option<&str>,
) -> Pod {
    let labels = BTreeMap::from([
        (
            "app.kubernetes.io/name".to_string(),
            "trustwatch-relay".to_string(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            "trustwatch".to_string(),
        ),
    ]);

    let requests = BTreeMap::from([
        ("cpu".to_string(), Quantity("10m".to_string())),
        ("memory".to_string(), Quantity("16Mi".to_string())),
    ]);
    let limits = BTreeMap::from([
        ("cpu".to_string(), Quantity("100m".to_string())),
        ("memory".to_string(), Quantity("64Mi".to_string())),
    ]);

    Pod {
        metadata: ObjectMeta {
            generate_name: Some("trustwatch-relay-".to_string()),
            labels: Some(labels),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            active_deadline_seconds: Some(ACTIVE_DEADLINE_SECS),
            restart_policy: Some("Never".to_string()),
            image_pull_secrets: pull_secret.map(|s| {
                vec![LocalObjectReference {
                    name: s.to_string(),
                }]
            }),
            containers: vec![Container {
                name: "socks5".to_string(),
                image: Some(image.to_string()),
                image_pull_policy: Some(pull_policy(image).to_string()),
                command: command.map(<[String]>::to_vec),
                ports: Some(vec![ContainerPort {
                    container_port: i32::from(RELAY_PORT),
                    name: Some("socks5".to_string()),
                    ..ContainerPort::default()
                }]),
                resources: Some(ResourceRequirements {
                    requests: Some(requests),
                    limits: Some(limits),
                    ..ResourceRequirements::default()
                }),
                ..Container::default()
            }],
            ..PodSpec::default()
        }),
        ..Pod::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_policy_follows_tag() {
        assert_eq!(pull_policy("ghcr.io/trustwatch/trustwatch-relay:v0.4.0"), "IfNotPresent");
        assert_eq!(pull_policy("ghcr.io/trustwatch/trustwatch-relay:latest"), "Always");
        assert_eq!(pull_policy("trustwatch-relay"), "Always");
        // Registry ports must not be mistaken for tags.
        assert_eq!(pull_policy("registry:5000/relay"), "Always");
        assert_eq!(pull_policy("registry:5000/relay:v1"), "IfNotPresent");
    }

    #[test]
    fn fatal_pull_reasons() {
        assert!(is_fatal_pull_reason("ErrImagePull"));
        assert!(is_fatal_pull_reason("ImagePullBackOff"));
        assert!(is_fatal_pull_reason("InvalidImageName"));
        assert!(!is_fatal_pull_reason("ContainerCreating"));
        assert!(!is_fatal_pull_reason(""));
    }

    #[test]
    fn pod_spec_is_bounded_and_labelled() {
        let pod = build_relay_pod(DEFAULT_RELAY_IMAGE, None, Some("regcred"));
        let meta = &pod.metadata;
        assert_eq!(
            meta.labels.as_ref().unwrap()["app.kubernetes.io/name"],
            "trustwatch-relay"
        );
        assert_eq!(meta.generate_name.as_deref(), Some("trustwatch-relay-"));

        let spec = pod.spec.as_ref().unwrap();
        assert_eq!(spec.active_deadline_seconds, Some(300));
        assert_eq!(spec.restart_policy.as_deref(), Some("Never"));
        assert_eq!(
            spec.image_pull_secrets.as_ref().unwrap()[0].name,
            "regcred"
        );

        let container = &spec.containers[0];
        assert_eq!(
            container.ports.as_ref().unwrap()[0].container_port,
            i32::from(RELAY_PORT)
        );
        let resources = container.resources.as_ref().unwrap();
        assert_eq!(resources.requests.as_ref().unwrap()["cpu"].0, "10m");
        assert_eq!(resources.limits.as_ref().unwrap()["memory"].0, "64Mi");
    }

    #[test]
    fn begin_close_is_idempotent() {
        let mut inner = Inner {
            state: State::PortForwardReady,
            pod_name: Some("trustwatch-relay-abc12".to_string()),
            local_port: Some(40123),
            listener: None,
        };
        let first = inner.begin_close();
        assert!(first.is_some());
        assert_eq!(first.unwrap().0.as_deref(), Some("trustwatch-relay-abc12"));
        assert_eq!(inner.state, State::Closed);

        // Second close finds nothing to do and no error to raise.
        assert!(inner.begin_close().is_none());
        assert!(inner.begin_close().is_none());
    }
}
