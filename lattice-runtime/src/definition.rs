//! The declarative resource-graph definition document the builder
//! consumes, plus group/version/kind handling and the resource-id naming
//! policy.

use crate::{error::BuildError, INSTANCE_ID, SCHEMA_VARIABLE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A declarative resource-graph definition: the instance's schema plus a
/// set of parameterized resource templates.
///
/// # Example
///
/// ```
/// use lattice_runtime::ResourceGraphDefinition;
/// use serde_json::json;
///
/// let definition: ResourceGraphDefinition = serde_json::from_value(json!({
///     "schema": {
///         "group": "apps.example.com",
///         "apiVersion": "v1alpha1",
///         "kind": "WebApp",
///         "spec": {"name": "string | required=true"},
///     },
///     "resources": [{
///         "id": "configmap",
///         "template": {
///             "apiVersion": "v1",
///             "kind": "ConfigMap",
///             "metadata": {"name": "${schema.spec.name}"},
///         },
///     }],
/// })).unwrap();
///
/// assert_eq!(definition.resources[0].id, "configmap");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGraphDefinition {
    /// The instance-facing schema: identity, spec DSL, and status body.
    pub schema: InstanceDefinition,
    /// The resource templates, in authoring order.
    #[serde(default)]
    pub resources: Vec<ResourceDefinition>,
}

/// The instance definition: the API identity of the generated kind, the
/// spec in the simple-schema DSL, and a free-form status body whose
/// values are `${…}` expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDefinition {
    /// API group of the generated kind.
    pub group: String,
    /// API version of the generated kind.
    pub api_version: String,
    /// Kind name of the generated kind.
    pub kind: String,
    /// Spec structure in the simple-schema DSL.
    #[serde(default)]
    pub spec: Map<String, Value>,
    /// Status body; leaf values are standalone `${…}` expressions.
    #[serde(default)]
    pub status: Map<String, Value>,
}

impl InstanceDefinition {
    /// The generated kind's [GroupVersionKind].
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind {
            group: self.group.clone(),
            version: self.api_version.clone(),
            kind: self.kind.clone(),
        }
    }
}

/// One resource template with its conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    /// Identifier the template is referred to by in expressions.
    pub id: String,
    /// The user-authored object, stored untouched; string fields may
    /// carry `${…}` expressions.
    pub template: Value,
    /// Readiness conditions; each entry is one standalone expression.
    #[serde(default)]
    pub ready_when: Vec<String>,
    /// Inclusion conditions; each entry is one standalone expression over
    /// the instance spec.
    #[serde(default)]
    pub include_when: Vec<String>,
}

/// A Kubernetes group/version/kind triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    /// API group; empty for the core group.
    pub group: String,
    /// API version.
    pub version: String,
    /// Kind name.
    pub kind: String,
}

impl GroupVersionKind {
    /// Construct from an `apiVersion` string (`group/version` or bare
    /// `version` for the core group) and a kind.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        let (group, version) = match api_version.split_once('/') {
            Some((group, version)) => (group.to_string(), version.to_string()),
            None => (String::new(), api_version.to_string()),
        };
        GroupVersionKind {
            group,
            version,
            kind: kind.to_string(),
        }
    }

    /// Render the `apiVersion` field form.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Whether this is the CustomResourceDefinition kind itself.
    pub fn is_crd(&self) -> bool {
        self.group == "apiextensions.k8s.io" && self.kind == "CustomResourceDefinition"
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}, Kind={}", self.group, self.version, self.kind)
    }
}

/// Validate a resource id against the naming policy: it must be usable as
/// an expression identifier (`[A-Za-z_][A-Za-z0-9_]*`) and must not
/// shadow a reserved name.
pub fn validate_resource_id(id: &str) -> Result<(), BuildError> {
    let mut chars = id.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(BuildError::NamingViolation {
            id: id.to_string(),
            reason: "must match [A-Za-z_][A-Za-z0-9_]*".to_string(),
        });
    }
    if id == SCHEMA_VARIABLE || id == INSTANCE_ID {
        return Err(BuildError::NamingViolation {
            id: id.to_string(),
            reason: "reserved identifier".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_camel_case_surface() {
        let definition: ResourceGraphDefinition = serde_json::from_value(json!({
            "schema": {
                "group": "apps.example.com",
                "apiVersion": "v1alpha1",
                "kind": "WebApp",
                "spec": {"name": "string"},
                "status": {"ready": "${deployment.status.ready}"},
            },
            "resources": [{
                "id": "deployment",
                "template": {"apiVersion": "apps/v1", "kind": "Deployment"},
                "readyWhen": ["${deployment.status.readyReplicas > 0}"],
                "includeWhen": ["${schema.spec.enabled}"],
            }],
        }))
        .unwrap();

        assert_eq!(definition.schema.kind, "WebApp");
        let resource = &definition.resources[0];
        assert_eq!(resource.ready_when.len(), 1);
        assert_eq!(resource.include_when.len(), 1);
    }

    #[test]
    fn ser_de_roundtrip() {
        let definition = ResourceGraphDefinition {
            schema: InstanceDefinition {
                group: "g".to_string(),
                api_version: "v1".to_string(),
                kind: "K".to_string(),
                spec: Map::new(),
                status: Map::new(),
            },
            resources: vec![],
        };
        let ser = serde_json::to_string(&definition).unwrap();
        let de: ResourceGraphDefinition = serde_json::from_str(&ser).unwrap();
        assert_eq!(definition, de);
    }

    #[test]
    fn gvk_api_version_forms() {
        let gvk = GroupVersionKind::from_api_version("apps/v1", "Deployment");
        assert_eq!(gvk.group, "apps");
        assert_eq!(gvk.api_version(), "apps/v1");

        let core = GroupVersionKind::from_api_version("v1", "ConfigMap");
        assert!(core.group.is_empty());
        assert_eq!(core.api_version(), "v1");
    }

    #[test]
    fn crd_detection() {
        let crd = GroupVersionKind::from_api_version(
            "apiextensions.k8s.io/v1",
            "CustomResourceDefinition",
        );
        assert!(crd.is_crd());
        assert!(!GroupVersionKind::from_api_version("apps/v1", "Deployment").is_crd());
    }

    #[test]
    fn naming_policy() {
        for good in ["configmap", "my_secret", "_internal", "v2"] {
            assert!(validate_resource_id(good).is_ok(), "`{good}` should pass");
        }
        for bad in ["", "my-secret", "2fast", "a.b", "with space", "schema", "instance"] {
            assert!(
                matches!(
                    validate_resource_id(bad),
                    Err(BuildError::NamingViolation { .. })
                ),
                "`{bad}` should fail"
            );
        }
    }
}
