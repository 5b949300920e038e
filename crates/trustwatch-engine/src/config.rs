//! Scan configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};

/// Minimum serve-mode refresh interval.
const MIN_REFRESH_SECS: u64 = 30;

/// Configuration for a trustwatch scan or serve process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Cluster label for federation; defaults to unlabelled single-cluster.
    pub cluster_name: Option<String>,

    /// Explicit namespace allowlist; `None` scans every accessible namespace.
    pub namespaces: Option<Vec<String>>,

    /// Warn when expiry is inside this window (hours).
    pub warn_before_hours: u64,

    /// Critical when expiry is inside this window (hours).
    pub crit_before_hours: u64,

    /// External URLs to probe.
    pub external_targets: Vec<String>,

    /// Certificate Transparency monitoring.
    pub ct: CtSettings,

    /// Service-mesh namespaces.
    pub mesh: MeshSettings,

    /// SPIFFE trust-bundle source.
    pub spiffe: SpiffeSettings,

    /// Tunnel relay settings.
    pub relay: RelaySettings,

    /// Also emit DRIFT_CHANGED when only `notAfter` moved (same serial).
    pub drift_on_renewal: bool,

    /// Drop MANAGED_EXPIRY findings from output.
    pub ignore_managed: bool,

    /// Serve-mode HTTP settings.
    pub serve: ServeSettings,

    /// Remote clusters to federate (fetched by an external client).
    pub remotes: Vec<RemoteCluster>,

    /// Cloud discoverer settings (feature-gated providers).
    pub cloud: CloudSettings,
}

/// Certificate Transparency settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CtSettings {
    /// Domains to query CT logs for.
    pub domains: Vec<String>,
    /// Issuer substrings considered legitimate; empty disables the check.
    pub allowed_issuers: Vec<String>,
}

/// Service-mesh namespace overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeshSettings {
    /// Linkerd control-plane namespace (default `linkerd`).
    pub linkerd_namespace: Option<String>,
    /// Istio control-plane namespace (default `istio-system`).
    pub istio_namespace: Option<String>,
}

/// SPIFFE trust-bundle source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpiffeSettings {
    /// SPIRE namespace (default `spire`).
    pub namespace: Option<String>,
    /// Local bundle file; bypasses the in-cluster lookup.
    pub bundle_path: Option<PathBuf>,
}

/// Tunnel relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Namespace the relay pod is created in.
    pub namespace: String,
    /// Relay image override.
    pub image: Option<String>,
    /// Image pull secret name.
    pub pull_secret: Option<String>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            image: None,
            pull_secret: None,
        }
    }
}

/// Serve-mode HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServeSettings {
    /// Listen address.
    pub listen_addr: String,
    /// Seconds between scans.
    pub refresh_every_secs: u64,
}

impl Default for ServeSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            refresh_every_secs: 300,
        }
    }
}

/// One remote cluster to merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCluster {
    /// Cluster label applied to merged findings.
    pub name: String,
    /// Snapshot endpoint URL.
    pub url: String,
}

/// Cloud provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudSettings {
    /// GCP project id.
    pub gcp_project: Option<String>,
    /// Azure Key Vault URL.
    pub azure_vault_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster_name: None,
            namespaces: None,
            warn_before_hours: 720,
            crit_before_hours: 336,
            external_targets: Vec::new(),
            ct: CtSettings::default(),
            mesh: MeshSettings::default(),
            spiffe: SpiffeSettings::default(),
            relay: RelaySettings::default(),
            drift_on_renewal: false,
            ignore_managed: false,
            serve: ServeSettings::default(),
            remotes: Vec::new(),
            cloud: CloudSettings::default(),
        }
    }
}

impl Config {
    /// Load from a YAML file, falling back to defaults when absent.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Refuse configurations that cannot produce a meaningful scan.
    pub fn validate(&self) -> Result<()> {
        if self.crit_before_hours >= self.warn_before_hours {
            return Err(EngineError::Config(format!(
                "critBeforeHours ({}) must be below warnBeforeHours ({})",
                self.crit_before_hours, self.warn_before_hours
            )));
        }
        if self.serve.refresh_every_secs < MIN_REFRESH_SECS {
            return Err(EngineError::Config(format!(
                "refreshEverySecs ({}) must be at least {MIN_REFRESH_SECS}",
                self.serve.refresh_every_secs
            )));
        }
        if self.serve.listen_addr.is_empty() {
            return Err(EngineError::Config("listenAddr must not be empty".to_string()));
        }
        Ok(())
    }

    /// Warn window as a duration.
    #[must_use]
    pub fn warn_before(&self) -> Duration {
        hours(self.warn_before_hours)
    }

    /// Critical window as a duration.
    #[must_use]
    pub fn crit_before(&self) -> Duration {
        hours(self.crit_before_hours)
    }
}

fn hours(h: u64) -> Duration {
    Duration::hours(i64::try_from(h).unwrap_or(i64::MAX / 3600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.warn_before(), Duration::hours(720));
        assert_eq!(config.crit_before(), Duration::hours(336));
    }

    #[test]
    fn inverted_windows_are_refused() {
        let config = Config {
            warn_before_hours: 100,
            crit_before_hours: 100,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("critBeforeHours"));
    }

    #[test]
    fn tight_refresh_is_refused() {
        let mut config = Config::default();
        config.serve.refresh_every_secs = 10;
        assert!(config.validate().is_err());

        config.serve.refresh_every_secs = 30;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_listen_addr_is_refused() {
        let mut config = Config::default();
        config.serve.listen_addr.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "clusterName: prod-eu\nwarnBeforeHours: 500\ncritBeforeHours: 200\nct:\n  domains: [example.com]\nexternalTargets:\n  - https://vault.example.com"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.cluster_name.as_deref(), Some("prod-eu"));
        assert_eq!(config.warn_before_hours, 500);
        assert_eq!(config.ct.domains, vec!["example.com"]);
        assert_eq!(config.external_targets.len(), 1);
        // Unset fields keep their defaults.
        assert_eq!(config.serve.refresh_every_secs, 300);
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = Config::load(Path::new("/nonexistent/trustwatch.yaml")).unwrap();
        assert_eq!(config.warn_before_hours, 720);
    }
}
