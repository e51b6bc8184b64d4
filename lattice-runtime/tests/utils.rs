//! Shared fixtures: a canned schema resolver and a small web-app
//! definition exercising static and dynamic expressions, conditions, and
//! status aggregation.

use anyhow::anyhow;
use lattice_runtime::{builder::ResolvedSchema, GroupVersionKind, ResourceGraphDefinition};
use lattice_schema::Schema;
use serde_json::{json, Value};

/// Resolver knowing a handful of kinds; everything else is an error.
pub(crate) fn test_resolver(
) -> impl Fn(&GroupVersionKind) -> anyhow::Result<ResolvedSchema> {
    |gvk: &GroupVersionKind| {
        let (schema, namespaced) = match gvk.kind.as_str() {
            "ConfigMap" => (
                object_schema(json!({
                    "data": {
                        "type": "object",
                        "additionalProperties": {"allowed": true, "schema": {"type": "string"}},
                    },
                })),
                true,
            ),
            "Secret" => (
                object_schema(json!({
                    "stringData": {
                        "type": "object",
                        "additionalProperties": {"allowed": true, "schema": {"type": "string"}},
                    },
                })),
                true,
            ),
            "Deployment" => (
                object_schema(json!({
                    "spec": {
                        "type": "object",
                        "properties": {
                            "replicas": {"type": "integer"},
                            "template": {
                                "type": "object",
                                "properties": {
                                    "spec": {
                                        "type": "object",
                                        "properties": {
                                            "containers": {
                                                "type": "array",
                                                "items": {
                                                    "type": "object",
                                                    "properties": {
                                                        "name": {"type": "string"},
                                                        "image": {"type": "string"},
                                                        "envFrom": {
                                                            "type": "array",
                                                            "items": {
                                                                "type": "object",
                                                                "properties": {
                                                                    "secretRef": {
                                                                        "type": "object",
                                                                        "properties": {
                                                                            "name": {"type": "string"},
                                                                        },
                                                                    },
                                                                },
                                                            },
                                                        },
                                                    },
                                                },
                                            },
                                        },
                                    },
                                },
                            },
                        },
                    },
                    "status": {
                        "type": "object",
                        "properties": {
                            "readyReplicas": {"type": "integer"},
                            "availableReplicas": {"type": "integer"},
                        },
                    },
                })),
                true,
            ),
            "Service" => (
                object_schema(json!({
                    "spec": {
                        "type": "object",
                        "properties": {
                            "selector": {
                                "type": "object",
                                "additionalProperties": {"allowed": true, "schema": {"type": "string"}},
                            },
                        },
                    },
                    "status": {
                        "type": "object",
                        "properties": {"endpoints": {"type": "integer"}},
                    },
                })),
                true,
            ),
            other => return Err(anyhow!("unknown kind `{other}`")),
        };
        Ok(ResolvedSchema { schema, namespaced })
    }
}

/// A top-level object schema with `apiVersion`/`kind`/`metadata` plus the
/// given extra properties.
pub(crate) fn object_schema(extra_properties: Value) -> Schema {
    let mut properties = json!({
        "apiVersion": {"type": "string"},
        "kind": {"type": "string"},
        "metadata": {
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "generateName": {"type": "string"},
                "namespace": {"type": "string"},
                "labels": {
                    "type": "object",
                    "additionalProperties": {"allowed": true, "schema": {"type": "string"}},
                },
            },
        },
    });
    properties
        .as_object_mut()
        .unwrap()
        .extend(extra_properties.as_object().unwrap().clone());
    serde_json::from_value(json!({"type": "object", "properties": properties})).unwrap()
}

/// Three-resource web-app definition: `deployment` is authored first but
/// depends on `secret`, which depends on `configmap`.
pub(crate) fn webapp_definition() -> ResourceGraphDefinition {
    serde_json::from_value(json!({
        "schema": {
            "group": "apps.example.com",
            "apiVersion": "v1alpha1",
            "kind": "WebApp",
            "spec": {
                "name": "string | required=true",
                "image": "string | default=\"nginx\"",
                "replicas": "integer | default=1",
                "enabled": "boolean | default=true",
            },
            "status": {
                "ready": "${deployment.status.readyReplicas > 0}",
                "dbName": "${configmap.data.DB_NAME}",
            },
        },
        "resources": [
            {
                "id": "deployment",
                "template": {
                    "apiVersion": "apps/v1",
                    "kind": "Deployment",
                    "metadata": {"name": "${schema.spec.name}"},
                    "spec": {
                        "replicas": "${schema.spec.replicas}",
                        "template": {
                            "spec": {
                                "containers": [{
                                    "name": "app",
                                    "image": "${schema.spec.image}",
                                    "envFrom": [{
                                        "secretRef": {"name": "${secret.metadata.name}"},
                                    }],
                                }],
                            },
                        },
                    },
                },
                "readyWhen": ["${deployment.status.readyReplicas > 0}"],
            },
            {
                "id": "configmap",
                "template": {
                    "apiVersion": "v1",
                    "kind": "ConfigMap",
                    "metadata": {"name": "${schema.spec.name}-config"},
                    "data": {"DB_NAME": "db-${schema.spec.name}"},
                },
            },
            {
                "id": "secret",
                "template": {
                    "apiVersion": "v1",
                    "kind": "Secret",
                    "metadata": {"name": "${schema.spec.name}-secret"},
                    "stringData": {
                        "DB_URL": "postgres://${configmap.data.DB_NAME}.cluster.local",
                    },
                },
            },
        ],
    }))
    .unwrap()
}

/// A live instance object for [webapp_definition].
pub(crate) fn webapp_instance(name: &str) -> Value {
    json!({
        "apiVersion": "apps.example.com/v1alpha1",
        "kind": "WebApp",
        "metadata": {"name": name},
        "spec": {
            "name": name,
            "image": "nginx:1.27",
            "replicas": 2,
            "enabled": true,
        },
    })
}
