//! Namespace access pre-filter.
//!
//! Multi-tenant clusters routinely deny `list` in most namespaces. Rather
//! than generating a discoverer error per forbidden namespace, the
//! orchestrator resolves the accessible subset once up front and scoped
//! discoverers only list within it.

use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, ListParams, PostParams, ResourceExt};
use kube::Client;
use tracing::{debug, warn};

use crate::error::Result;

/// One `(group, resource)` pair a discoverer needs `list` on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessCheck {
    /// API group; empty for core.
    pub group: &'static str,
    /// Resource plural.
    pub resource: &'static str,
}

/// Resources the namespace-scoped discoverers list.
pub const SCOPED_CHECKS: &[AccessCheck] = &[
    AccessCheck {
        group: "",
        resource: "secrets",
    },
    AccessCheck {
        group: "",
        resource: "services",
    },
    AccessCheck {
        group: "networking.k8s.io",
        resource: "ingresses",
    },
];

/// All namespace names in the cluster.
pub async fn list_namespaces(client: &Client) -> Result<Vec<String>> {
    let api: Api<Namespace> = Api::all(client.clone());
    let list = api.list(&ListParams::default()).await?;
    Ok(list.items.iter().map(ResourceExt::name_any).collect())
}

/// Filter namespaces down to those where every check is allowed.
///
/// Review failures count as inaccessible; access problems surface as a
/// smaller namespace set, not as scan errors.
pub async fn filter_accessible(
    client: &Client,
    namespaces: Vec<String>,
    checks: &[AccessCheck],
) -> Vec<String> {
    let mut accessible = Vec::new();
    for ns in namespaces {
        let mut allowed = true;
        for check in checks {
            match can_list(client, &ns, check).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(namespace = %ns, resource = check.resource, "list denied");
                    allowed = false;
                    break;
                }
                Err(e) => {
                    warn!(namespace = %ns, resource = check.resource, error = %e, "access review failed");
                    allowed = false;
                    break;
                }
            }
        }
        if allowed {
            accessible.push(ns);
        }
    }
    accessible
}

async fn can_list(client: &Client, namespace: &str, check: &AccessCheck) -> Result<bool> {
    let api: Api<SelfSubjectAccessReview> = Api::all(client.clone());
    let review = SelfSubjectAccessReview {
        spec: SelfSubjectAccessReviewSpec {
            resource_attributes: Some(ResourceAttributes {
                namespace: Some(namespace.to_string()),
                verb: Some("list".to_string()),
                group: Some(check.group.to_string()),
                resource: Some(check.resource.to_string()),
                ..ResourceAttributes::default()
            }),
            non_resource_attributes: None,
        },
        ..SelfSubjectAccessReview::default()
    };
    let created = api.create(&PostParams::default(), &review).await?;
    Ok(created.status.is_some_and(|s| s.allowed))
}
