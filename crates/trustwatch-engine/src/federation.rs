//! Federation: merging remote snapshots under cluster labels.
//!
//! Fetching is an external collaborator's job; this pass takes the
//! already-fetched results, labels everything, and folds failures into the
//! snapshot's error map.

use trustwatch_core::Snapshot;

/// Label applied to local findings when no cluster name is configured.
const LOCAL_LABEL: &str = "local";

/// A remote snapshot fetch result, keyed by cluster name.
pub type RemoteResult = (String, std::result::Result<Snapshot, String>);

/// Merge remote snapshots into the local one.
///
/// Cluster labels are applied to local findings only when federation is in
/// play (a remote is configured or a cluster name is set). Remote failures
/// land in `errors`, never abort the merge.
pub fn merge_remote(local: &mut Snapshot, cluster_name: Option<&str>, remotes: Vec<RemoteResult>) {
    let federated = cluster_name.is_some() || !remotes.is_empty();
    if !federated {
        return;
    }

    let local_label = cluster_name.unwrap_or(LOCAL_LABEL);
    for f in &mut local.findings {
        if f.cluster.is_none() {
            f.cluster = Some(local_label.to_string());
        }
    }

    for (name, result) in remotes {
        match result {
            Ok(remote) => {
                for mut f in remote.findings {
                    if f.cluster.is_none() {
                        f.cluster = Some(name.clone());
                    }
                    local.findings.push(f);
                }
                for (label, err) in remote.errors {
                    local.errors.insert(format!("{name}:{label}"), err);
                }
            }
            Err(e) => {
                local.errors.insert(format!("federation.{name}"), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use trustwatch_core::{CertFinding, SourceKind};

    fn snapshot(names: &[&str]) -> Snapshot {
        Snapshot {
            at: Utc::now(),
            findings: names
                .iter()
                .map(|n| {
                    let mut f = CertFinding::new(SourceKind::External, *n);
                    f.probe_ok = true;
                    f
                })
                .collect(),
            errors: BTreeMap::new(),
        }
    }

    #[test]
    fn single_cluster_without_name_stays_unlabelled() {
        let mut local = snapshot(&["a"]);
        merge_remote(&mut local, None, Vec::new());
        assert!(local.findings[0].cluster.is_none());
    }

    #[test]
    fn remotes_get_their_cluster_labels() {
        let mut local = snapshot(&["a"]);
        let remote = snapshot(&["b"]);

        merge_remote(
            &mut local,
            Some("prod-eu"),
            vec![("prod-us".to_string(), Ok(remote))],
        );

        assert_eq!(local.findings.len(), 2);
        assert_eq!(local.findings[0].cluster.as_deref(), Some("prod-eu"));
        assert_eq!(local.findings[1].cluster.as_deref(), Some("prod-us"));
    }

    #[test]
    fn remote_failure_lands_in_errors() {
        let mut local = snapshot(&["a"]);
        merge_remote(
            &mut local,
            None,
            vec![("prod-us".to_string(), Err("fetch: HTTP 503".to_string()))],
        );

        assert_eq!(local.findings.len(), 1);
        // Federation was in play, so local findings got the default label.
        assert_eq!(local.findings[0].cluster.as_deref(), Some("local"));
        assert_eq!(
            local.errors.get("federation.prod-us").map(String::as_str),
            Some("fetch: HTTP 503")
        );
    }

    #[test]
    fn remote_errors_are_namespaced() {
        let mut local = snapshot(&[]);
        let mut remote = snapshot(&[]);
        remote
            .errors
            .insert("k8s.webhook".to_string(), "forbidden".to_string());

        merge_remote(&mut local, None, vec![("edge".to_string(), Ok(remote))]);
        assert!(local.errors.contains_key("edge:k8s.webhook"));
    }
}
