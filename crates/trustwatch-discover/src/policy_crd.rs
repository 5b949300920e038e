//! TrustPolicy custom resource: typed decoding and idempotent CRD install.
//!
//! The CRD is optional: clusters without it simply run without policies.
//! Decoding is deliberately narrow and lenient -- missing fields default,
//! unknown rule types are kept as `Unknown` and skipped by the evaluator.

use kube::api::{Api, DynamicObject, ListParams, PostParams, ResourceExt};
use kube::core::{ApiResource, GroupVersionKind};
use kube::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceDefinitionNames, CustomResourceDefinitionSpec,
    CustomResourceDefinitionVersion, CustomResourceValidation, JSONSchemaProps,
};

use trustwatch_core::Severity;

use crate::error::Result;

/// API group of the TrustPolicy CRD.
pub const POLICY_GROUP: &str = "trustwatch.dev";
/// API version of the TrustPolicy CRD.
pub const POLICY_VERSION: &str = "v1alpha1";
/// Kind of the TrustPolicy CRD.
pub const POLICY_KIND: &str = "TrustPolicy";
/// Plural resource name.
pub const POLICY_PLURAL: &str = "trustpolicies";

/// A loaded TrustPolicy object.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustPolicy {
    /// Object name.
    pub name: String,
    /// Object namespace.
    pub namespace: Option<String>,
    /// Decoded spec.
    pub spec: TrustPolicySpec,
}

/// `spec` of a TrustPolicy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrustPolicySpec {
    /// What the policy applies to.
    pub targets: Vec<PolicyTarget>,
    /// Optional expiry-threshold overrides.
    pub thresholds: Option<PolicyThresholds>,
    /// Rules evaluated against matching findings.
    pub rules: Vec<PolicyRule>,
}

/// One policy target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyTarget {
    /// Target kind; `External` targets contribute probe URLs.
    pub kind: String,
    /// URL for external targets.
    pub url: Option<String>,
    /// Namespace selector for in-cluster targets.
    pub namespace: Option<String>,
    /// Name selector for in-cluster targets.
    pub name: Option<String>,
}

/// Expiry-threshold overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyThresholds {
    /// Warn window in hours.
    pub warn_before_hours: Option<u64>,
    /// Critical window in hours.
    pub crit_before_hours: Option<u64>,
}

/// Closed set of rule types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleType {
    /// Violated when `0 < keySize < minBits`.
    #[serde(rename = "minKeySize")]
    MinKeySize,
    /// Violated when the signature algorithm uses SHA-1.
    #[serde(rename = "noSHA1")]
    NoSha1,
    /// Violated when the issuer does not contain the substring.
    #[serde(rename = "requiredIssuer")]
    RequiredIssuer,
    /// Violated when the leaf is self-signed.
    #[serde(rename = "noSelfSigned")]
    NoSelfSigned,
    /// Anything else; skipped by the evaluator.
    #[serde(other)]
    Unknown,
}

impl Default for RuleType {
    fn default() -> Self {
        Self::Unknown
    }
}

/// One rule inside a policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyRule {
    /// Rule name, used in violation notes.
    pub name: String,
    /// Rule type.
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// Minimum key bits for `minKeySize`.
    pub min_bits: Option<u32>,
    /// Required issuer substring for `requiredIssuer`.
    pub issuer: Option<String>,
    /// Severity of violations; defaults to Warn.
    pub severity: Option<Severity>,
}

fn api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        POLICY_GROUP,
        POLICY_VERSION,
        POLICY_KIND,
    ))
}

/// Decode one dynamic object into a typed policy.
///
/// Returns `None` (with a warning) when the spec does not decode; one bad
/// policy must not take down policy loading.
#[must_use]
pub fn decode_policy(obj: &DynamicObject) -> Option<TrustPolicy> {
    let name = obj.name_any();
    let spec = match obj.data.get("spec") {
        None => TrustPolicySpec::default(),
        Some(value) => match serde_json::from_value::<TrustPolicySpec>(value.clone()) {
            Ok(spec) => spec,
            Err(e) => {
                warn!(policy = %name, error = %e, "skipping undecodable TrustPolicy");
                return None;
            }
        },
    };
    Some(TrustPolicy {
        name,
        namespace: obj.metadata.namespace.clone(),
        spec,
    })
}

/// Load every TrustPolicy in the cluster.
///
/// An absent CRD yields an empty set; the core continues without policies.
pub async fn load_policies(client: &Client) -> Result<Vec<TrustPolicy>> {
    let api: Api<DynamicObject> = Api::all_with(client.clone(), &api_resource());
    let list = match api.list(&ListParams::default()).await {
        Ok(l) => l,
        Err(kube::Error::Api(ae)) if ae.code == 404 => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(list.items.iter().filter_map(decode_policy).collect())
}

/// External probe URLs contributed by policy targets.
#[must_use]
pub fn external_targets(policies: &[TrustPolicy]) -> Vec<String> {
    policies
        .iter()
        .flat_map(|p| &p.spec.targets)
        .filter(|t| t.kind.eq_ignore_ascii_case("external"))
        .filter_map(|t| t.url.clone())
        .collect()
}

/// Install the TrustPolicy CRD, create-or-update, preserving
/// `resourceVersion` on update.
pub async fn install_crd(client: &Client) -> Result<()> {
    let api: Api<CustomResourceDefinition> = Api::all(client.clone());
    let crd = build_crd();
    let crd_name = format!("{POLICY_PLURAL}.{POLICY_GROUP}");

    match api.create(&PostParams::default(), &crd).await {
        Ok(_) => {
            info!(crd = %crd_name, "TrustPolicy CRD installed");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            let existing = api.get(&crd_name).await?;
            let mut updated = crd;
            updated.metadata.resource_version = existing.metadata.resource_version;
            api.replace(&crd_name, &PostParams::default(), &updated)
                .await?;
            info!(crd = %crd_name, "TrustPolicy CRD updated");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn build_crd() -> CustomResourceDefinition {
    CustomResourceDefinition {
        metadata: kube::api::ObjectMeta {
            name: Some(format!("{POLICY_PLURAL}.{POLICY_GROUP}")),
            ..kube::api::ObjectMeta::default()
        },
        spec: CustomResourceDefinitionSpec {
            group: POLICY_GROUP.to_string(),
            scope: "Namespaced".to_string(),
            names: CustomResourceDefinitionNames {
                kind: POLICY_KIND.to_string(),
                plural: POLICY_PLURAL.to_string(),
                singular: Some("trustpolicy".to_string()),
                short_names: Some(vec!["tp".to_string()]),
                ..CustomResourceDefinitionNames::default()
            },
            versions: vec![CustomResourceDefinitionVersion {
                name: POLICY_VERSION.to_string(),
                served: true,
                storage: true,
                schema: Some(CustomResourceValidation {
                    open_api_v3_schema: Some(JSONSchemaProps {
                        type_: Some("object".to_string()),
                        x_kubernetes_preserve_unknown_fields: Some(true),
                        ..JSONSchemaProps::default()
                    }),
                }),
                ..CustomResourceDefinitionVersion::default()
            }],
            ..CustomResourceDefinitionSpec::default()
        },
        status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy_object(spec: serde_json::Value) -> DynamicObject {
        let mut obj = DynamicObject::new("prod-tls", &api_resource());
        obj.metadata.namespace = Some("prod".to_string());
        obj.data = json!({ "spec": spec });
        obj
    }

    #[test]
    fn decodes_the_full_rule_set() {
        let obj = policy_object(json!({
            "targets": [
                { "kind": "External", "url": "https://vault.example.com" }
            ],
            "rules": [
                { "name": "modern-keys", "type": "minKeySize", "minBits": 2048 },
                { "name": "no-sha1", "type": "noSHA1", "severity": "critical" },
                { "name": "corp-ca", "type": "requiredIssuer", "issuer": "Example Corp CA" },
                { "name": "no-self-signed", "type": "noSelfSigned" }
            ]
        }));

        let policy = decode_policy(&obj).unwrap();
        assert_eq!(policy.name, "prod-tls");
        assert_eq!(policy.namespace.as_deref(), Some("prod"));
        assert_eq!(policy.spec.rules.len(), 4);
        assert_eq!(policy.spec.rules[0].rule_type, RuleType::MinKeySize);
        assert_eq!(policy.spec.rules[0].min_bits, Some(2048));
        assert_eq!(policy.spec.rules[1].severity, Some(Severity::Critical));
        assert_eq!(
            policy.spec.rules[2].issuer.as_deref(),
            Some("Example Corp CA")
        );
    }

    #[test]
    fn unknown_rule_types_decode_as_unknown() {
        let obj = policy_object(json!({
            "rules": [{ "name": "future", "type": "quantumSafe" }]
        }));
        let policy = decode_policy(&obj).unwrap();
        assert_eq!(policy.spec.rules[0].rule_type, RuleType::Unknown);
    }

    #[test]
    fn missing_spec_defaults_gracefully() {
        let obj = policy_object(json!({}));
        let policy = decode_policy(&obj).unwrap();
        assert!(policy.spec.rules.is_empty());
        assert!(policy.spec.targets.is_empty());
    }

    #[test]
    fn external_targets_are_collected() {
        let obj = policy_object(json!({
            "targets": [
                { "kind": "External", "url": "https://a.example.com" },
                { "kind": "Secret", "namespace": "prod", "name": "tls" },
                { "kind": "external", "url": "https://b.example.com" }
            ]
        }));
        let policies = vec![decode_policy(&obj).unwrap()];
        assert_eq!(
            external_targets(&policies),
            vec!["https://a.example.com", "https://b.example.com"]
        );
    }

    #[test]
    fn crd_shape() {
        let crd = build_crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("trustpolicies.trustwatch.dev")
        );
        assert_eq!(crd.spec.versions[0].name, "v1alpha1");
        assert!(crd.spec.versions[0].storage);
    }
}
