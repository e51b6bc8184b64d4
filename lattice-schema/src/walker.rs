//! Schema-guided traversal of unstructured resource trees, emitting a
//! [FieldDescriptor] for every expression-bearing field.

use crate::{
    path::{join_field_name, Path},
    schema::{ExpectedTypes, Schema, TYPE_ANY, TYPE_ARRAY, TYPE_BOOLEAN, TYPE_INTEGER, TYPE_NUMBER, TYPE_OBJECT, TYPE_STRING},
    Error,
};
use itertools::Itertools;
use lattice_expression::scanner;
use serde_json::{Map, Value};

/// One expression-bearing location inside a resource template.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Where the field lives.
    pub path: Path,
    /// The embedded expression(s), in source order.
    pub expressions: Vec<String>,
    /// The types the field may legally hold.
    pub expected_types: ExpectedTypes,
    /// The field's schema; only recorded for standalone expressions,
    /// where the substituted value must conform to it.
    pub expected_schema: Option<Schema>,
    /// Whether the whole field is exactly one `${…}` expression. Only
    /// then may the substituted value keep a non-string type.
    pub standalone: bool,
}

/// Walk a resource against its schema, returning descriptors for every
/// field containing one or more expressions.
///
/// # Example
///
/// ```
/// use lattice_schema::{walker, Schema};
/// use serde_json::json;
///
/// let schema: Schema = serde_json::from_value(json!({
///     "type": "object",
///     "properties": {"name": {"type": "string"}},
/// })).unwrap();
///
/// let found = walker::parse_resource(&json!({"name": "${schema.spec.name}"}), &schema).unwrap();
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].expressions, vec!["schema.spec.name"]);
/// assert!(found[0].standalone);
/// ```
pub fn parse_resource(resource: &Value, schema: &Schema) -> Result<Vec<FieldDescriptor>, Error> {
    let mut found = Vec::new();
    walk(resource, schema, "", &mut found)?;
    Ok(found)
}

/// Walk a resource with no schema at all. Every emitted descriptor gets
/// `expected_types = {any}` and nothing is rejected on type grounds.
pub fn parse_schemaless_resource(resource: &Value) -> Result<Vec<FieldDescriptor>, Error> {
    let mut found = Vec::new();
    walk(resource, &Schema::permissive(), "", &mut found)?;
    Ok(found)
}

fn walk(
    value: &Value,
    schema: &Schema,
    path: &str,
    found: &mut Vec<FieldDescriptor>,
) -> Result<(), Error> {
    let expected = schema.expected_types(path)?;

    match value {
        Value::Object(map) => parse_object(map, schema, &expected, path, found),
        Value::Array(items) => parse_array(items, schema, &expected, path, found),
        Value::String(s) => parse_string(s, schema, &expected, path, found),
        Value::Null => Ok(()),
        _ => parse_scalar(value, &expected, path),
    }
}

fn parse_object(
    map: &Map<String, Value>,
    schema: &Schema,
    expected: &ExpectedTypes,
    path: &str,
    found: &mut Vec<FieldDescriptor>,
) -> Result<(), Error> {
    let permissive_extras = schema
        .additional_properties
        .as_ref()
        .is_some_and(|a| a.allowed || a.schema.is_some());
    if !expected.contains(TYPE_OBJECT) && !expected.contains(TYPE_ANY) && !permissive_extras {
        return Err(Error::SchemaMismatch {
            path: path.to_string(),
            reason: format!("found an object, expected {}", humanize(expected)),
        });
    }

    for (name, field_value) in map {
        let field_path = join_field_name(path, name);
        let field_schema = schema
            .property_schema(name)
            .ok_or_else(|| Error::SchemaMismatch {
                path: field_path.clone(),
                reason: format!("unknown field `{name}`"),
            })?;
        walk(field_value, &field_schema, &field_path, found)?;
    }
    Ok(())
}

fn parse_array(
    items: &[Value],
    schema: &Schema,
    expected: &ExpectedTypes,
    path: &str,
    found: &mut Vec<FieldDescriptor>,
) -> Result<(), Error> {
    if !expected.contains(TYPE_ARRAY) && !expected.contains(TYPE_ANY) {
        return Err(Error::SchemaMismatch {
            path: path.to_string(),
            reason: format!("found an array, expected {}", humanize(expected)),
        });
    }

    let item_schema = match &schema.items {
        Some(items) => (**items).clone(),
        None if expected.contains(TYPE_ANY) => Schema::permissive(),
        None => {
            return Err(Error::InvalidSchema {
                path: path.to_string(),
                reason: "array schema has no items".to_string(),
            });
        }
    };

    for (i, item) in items.iter().enumerate() {
        let item_path = format!("{path}[{i}]");
        walk(item, &item_schema, &item_path, found)?;
    }
    Ok(())
}

fn parse_string(
    s: &str,
    schema: &Schema,
    expected: &ExpectedTypes,
    path: &str,
    found: &mut Vec<FieldDescriptor>,
) -> Result<(), Error> {
    let expressions = scanner::extract(s).map_err(|source| Error::Expression {
        path: path.to_string(),
        source,
    })?;

    let standalone =
        matches!(expressions.as_slice(), [single] if s == format!("${{{single}}}"));
    if standalone {
        found.push(FieldDescriptor {
            path: Path::parse(path)?,
            expressions,
            expected_types: expected.clone(),
            expected_schema: Some(schema.clone()),
            standalone: true,
        });
        return Ok(());
    }

    if !expected.contains(TYPE_STRING) && !expected.contains(TYPE_ANY) {
        return Err(Error::SchemaMismatch {
            path: path.to_string(),
            reason: format!("found a string, expected {}", humanize(expected)),
        });
    }

    if !expressions.is_empty() {
        found.push(FieldDescriptor {
            path: Path::parse(path)?,
            expressions,
            expected_types: expected.clone(),
            expected_schema: None,
            standalone: false,
        });
    }
    Ok(())
}

fn parse_scalar(value: &Value, expected: &ExpectedTypes, path: &str) -> Result<(), Error> {
    let ok = match value {
        Value::Bool(_) => expected.contains(TYPE_BOOLEAN) || expected.contains(TYPE_ANY),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                expected.contains(TYPE_INTEGER)
                    || expected.contains(TYPE_NUMBER)
                    || expected.contains(TYPE_ANY)
            } else {
                expected.contains(TYPE_NUMBER) || expected.contains(TYPE_ANY)
            }
        }
        _ => true,
    };
    if !ok {
        return Err(Error::SchemaMismatch {
            path: path.to_string(),
            reason: format!("found {}, expected {}", value_kind(value), humanize(expected)),
        });
    }
    Ok(())
}

fn humanize(expected: &ExpectedTypes) -> String {
    expected.iter().join(" or ")
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "an integer",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn schema(v: Value) -> Schema {
        serde_json::from_value(v).unwrap()
    }

    fn deployment_schema() -> Schema {
        schema(json!({
            "type": "object",
            "properties": {
                "metadata": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "labels": {
                            "type": "object",
                            "additionalProperties": {
                                "allowed": true,
                                "schema": {"type": "string"},
                            },
                        },
                    },
                },
                "spec": {
                    "type": "object",
                    "properties": {
                        "replicas": {"type": "integer"},
                        "paused": {"type": "boolean"},
                        "containers": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "image": {"type": "string"},
                                    "port": {"x-kubernetes-int-or-string": true},
                                },
                            },
                        },
                    },
                },
            },
        }))
    }

    #[test]
    fn finds_standalone_and_interpolated_fields() {
        let resource = json!({
            "metadata": {"name": "app-${schema.spec.name}"},
            "spec": {
                "replicas": "${schema.spec.replicas}",
                "containers": [
                    {"image": "${schema.spec.image}:latest"},
                ],
            },
        });

        let mut found = parse_resource(&resource, &deployment_schema()).unwrap();
        found.sort_by_key(|d| d.path.build());

        assert_eq!(found.len(), 3);

        assert_eq!(found[0].path.build(), "metadata.name");
        assert!(!found[0].standalone);
        assert!(found[0].expected_schema.is_none());

        assert_eq!(found[1].path.build(), "spec.containers[0].image");
        assert_eq!(found[1].expressions, vec!["schema.spec.image"]);

        assert_eq!(found[2].path.build(), "spec.replicas");
        assert!(found[2].standalone);
        assert!(found[2].expected_types.contains("integer"));
        assert_eq!(
            found[2].expected_schema.as_ref().unwrap().types,
            vec!["integer"]
        );
    }

    #[test]
    fn walk_order_is_deterministic() {
        let resource = json!({
            "metadata": {"name": "${a.b}"},
            "spec": {"replicas": "${c.d}"},
        });
        let first = parse_resource(&resource, &deployment_schema()).unwrap();
        let second = parse_resource(&resource, &deployment_schema()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_field_under_strict_object() {
        let resource = json!({"spec": {"unknown_knob": 1}});
        let err = parse_resource(&resource, &deployment_schema()).unwrap_err();
        assert!(
            matches!(err, Error::SchemaMismatch { ref path, .. } if path == "spec.unknown_knob"),
            "{err}"
        );
    }

    #[test]
    fn additional_properties_admit_unknown_names() {
        let resource = json!({
            "metadata": {"labels": {"anything.io/name": "${schema.spec.name}"}},
        });
        let found = parse_resource(&resource, &deployment_schema()).unwrap();
        assert_eq!(found[0].path.build(), "metadata.labels[\"anything.io/name\"]");
    }

    #[test]
    fn scalar_type_checks() {
        let bad = json!({"spec": {"replicas": "three"}});
        // Plain string where an integer is declared: no expressions, so it
        // fails the string requirement.
        assert!(parse_resource(&bad, &deployment_schema()).is_err());

        let bad = json!({"spec": {"paused": 3}});
        let err = parse_resource(&bad, &deployment_schema()).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { ref path, .. } if path == "spec.paused"));

        let ok = json!({"spec": {"replicas": 3, "paused": true}});
        assert!(parse_resource(&ok, &deployment_schema()).unwrap().is_empty());
    }

    #[test]
    fn int_or_string_accepts_both() {
        let ok = json!({"spec": {"containers": [{"port": 8080}, {"port": "http-${x.y}"}]}});
        let found = parse_resource(&ok, &deployment_schema()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path.build(), "spec.containers[1].port");
    }

    #[test]
    fn nested_expression_error_names_the_path() {
        let resource = json!({"metadata": {"name": "${a(${b})}"}});
        let err = parse_resource(&resource, &deployment_schema()).unwrap_err();
        assert!(matches!(err, Error::Expression { ref path, .. } if path == "metadata.name"));
    }

    #[test]
    fn null_values_are_skipped() {
        let resource = json!({"metadata": {"name": null}});
        assert!(parse_resource(&resource, &deployment_schema())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn schemaless_walk_accepts_anything() {
        let resource = json!({
            "free": {"form": [{"deep": "${a.b.c}"}]},
            "count": 12,
            "flag": true,
        });
        let found = parse_schemaless_resource(&resource).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path.build(), "free.form[0].deep");
        assert_eq!(
            found[0].expected_types,
            ExpectedTypes::from([TYPE_ANY.to_string()])
        );
        assert!(found[0].standalone);
    }

    #[test]
    fn preserve_unknown_fields_switches_to_schemaless() {
        let s = schema(json!({
            "type": "object",
            "properties": {
                "config": {"x-kubernetes-preserve-unknown-fields": true},
            },
        }));
        let resource = json!({"config": {"surprise": {"value": "${x.y}"}}});
        let found = parse_resource(&resource, &s).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path.build(), "config.surprise.value");
        assert!(found[0].expected_types.contains(TYPE_ANY));
    }

    #[test]
    fn array_without_items_is_invalid() {
        let s = schema(json!({
            "type": "object",
            "properties": {"xs": {"type": "array"}},
        }));
        let err = parse_resource(&json!({"xs": [1]}), &s).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { ref path, .. } if path == "xs"));
    }

    #[test]
    fn one_of_union_admits_either_shape() {
        let s = schema(json!({
            "type": "object",
            "properties": {
                "value": {"oneOf": [{"type": "string"}, {"type": "integer"}]},
            },
        }));
        assert!(parse_resource(&json!({"value": 3}), &s).is_ok());
        assert!(parse_resource(&json!({"value": "x"}), &s).is_ok());
        assert!(parse_resource(&json!({"value": true}), &s).is_err());
    }
}
