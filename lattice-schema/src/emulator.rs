//! Dummy-object emulation: synthesize a type-valid value for a schema,
//! populated with sentinel values.
//!
//! Emulated objects only exist to dry-run expressions at build time, so
//! fidelity matters only up to the fields expressions actually touch:
//! every declared property is filled, arrays get a single element, and
//! free-form objects stay empty.

use crate::{
    schema::{Schema, TYPE_ARRAY, TYPE_BOOLEAN, TYPE_INTEGER, TYPE_NUMBER, TYPE_OBJECT, TYPE_STRING},
    Error,
};
use serde_json::{json, Map, Number, Value};

/// Sentinel string for emulated string fields.
pub const STRING_SENTINEL: &str = "emulated-value";

/// Produce a type-valid dummy value for `schema`.
///
/// # Example
///
/// ```
/// use lattice_schema::emulator::generate_dummy;
/// use lattice_schema::Schema;
/// use serde_json::json;
///
/// let schema: Schema = serde_json::from_value(json!({
///     "type": "object",
///     "properties": {"replicas": {"type": "integer"}},
/// })).unwrap();
///
/// assert_eq!(generate_dummy(&schema).unwrap(), json!({"replicas": 1}));
/// ```
pub fn generate_dummy(schema: &Schema) -> Result<Value, Error> {
    dummy(schema, "")
}

fn dummy(schema: &Schema, path: &str) -> Result<Value, Error> {
    if let Some(default) = &schema.default {
        return Ok(default.clone());
    }
    if let Some(first) = schema.enum_values.first() {
        return Ok(first.clone());
    }
    if schema.int_or_string {
        return Ok(json!(1));
    }
    if schema.preserve_unknown_fields {
        return Ok(Value::Object(Map::new()));
    }
    if let Some(sub) = schema.one_of.first().or_else(|| schema.any_of.first()) {
        return dummy(sub, path);
    }

    let Some(declared) = schema.types.first().map(String::as_str) else {
        if schema.additional_properties.is_some() {
            return Ok(Value::Object(Map::new()));
        }
        return Err(Error::Emulation {
            path: path.to_string(),
            reason: "schema declares no type".to_string(),
        });
    };

    match declared {
        TYPE_STRING => Ok(Value::String(STRING_SENTINEL.to_string())),
        TYPE_BOOLEAN => Ok(Value::Bool(true)),
        TYPE_INTEGER => {
            let floor = schema.minimum.map(|m| m as i64).unwrap_or(1).max(1);
            Ok(Value::Number(Number::from(floor)))
        }
        TYPE_NUMBER => Ok(json!(schema.minimum.unwrap_or(1.0).max(1.0))),
        TYPE_ARRAY => match &schema.items {
            Some(items) => Ok(Value::Array(vec![dummy(items, &format!("{path}[0]"))?])),
            None => Ok(Value::Array(Vec::new())),
        },
        TYPE_OBJECT => {
            let mut map = Map::with_capacity(schema.properties.len());
            for (name, property) in &schema.properties {
                let child_path = crate::path::join_field_name(path, name);
                map.insert(name.clone(), dummy(property, &child_path)?);
            }
            Ok(Value::Object(map))
        }
        other => Err(Error::Emulation {
            path: path.to_string(),
            reason: format!("unsupported type `{other}`"),
        }),
    }
}
