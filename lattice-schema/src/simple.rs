//! Transformer from the compact, user-authored simple-schema DSL to the
//! full [Schema] model.
//!
//! Each leaf is a string of the form `<type> | marker=value …`; nested
//! maps describe object structure. Types are the atomic `string`,
//! `integer`, `boolean`, and `float`, the collections `[]T` and
//! `map[string]V`, or a name from an optional side table of pre-defined
//! composite types.

use crate::{
    schema::{AdditionalProperties, Schema, ValidationRule, TYPE_ARRAY, TYPE_BOOLEAN, TYPE_INTEGER, TYPE_NUMBER, TYPE_OBJECT, TYPE_STRING},
    Error,
};
use indexmap::IndexMap;
use serde_json::{Map, Value};

mod marker;

use marker::{parse_markers, Marker, MarkerValue};

/// Simple-schema to [Schema] transformer, optionally seeded with
/// pre-defined named types.
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    pre_defined_types: IndexMap<String, Schema>,
}

impl Transformer {
    /// Create a [Transformer] with no pre-defined types.
    pub fn new() -> Self {
        Transformer::default()
    }

    /// Seed the transformer with named composite types referable from
    /// type strings.
    pub fn with_pre_defined_types(mut self, types: IndexMap<String, Schema>) -> Self {
        self.pre_defined_types = types;
        self
    }

    /// Transform a simple-schema object into a full object [Schema].
    ///
    /// # Example
    ///
    /// ```
    /// use lattice_schema::simple::Transformer;
    /// use serde_json::json;
    ///
    /// let spec = json!({
    ///     "name": "string | required=true",
    ///     "replicas": "integer | default=3 minimum=1",
    /// });
    /// let schema = Transformer::new()
    ///     .transform(spec.as_object().unwrap())
    ///     .unwrap();
    ///
    /// assert_eq!(schema.required, vec!["name"]);
    /// assert_eq!(schema.properties["replicas"].default, Some(json!(3)));
    /// ```
    pub fn transform(&self, object: &Map<String, Value>) -> Result<Schema, Error> {
        let mut schema = Schema::of_type(TYPE_OBJECT);

        for (field, value) in object {
            match value {
                Value::String(type_string) => {
                    let (field_schema, required) = self.parse_field(field, type_string)?;
                    if required {
                        schema.required.push(field.clone());
                    }
                    schema.properties.insert(field.clone(), field_schema);
                }
                Value::Object(nested) => {
                    let nested_schema = self.transform(nested)?;
                    schema.properties.insert(field.clone(), nested_schema);
                }
                other => {
                    return Err(Error::InvalidSimpleSchema {
                        field: field.clone(),
                        reason: format!(
                            "expected a type string or nested object, found {other}"
                        ),
                    });
                }
            }
        }

        Ok(schema)
    }

    /// Parse one `<type> | markers` string, returning the field schema and
    /// whether the field is required.
    fn parse_field(&self, field: &str, type_string: &str) -> Result<(Schema, bool), Error> {
        let (type_part, marker_part) = match type_string.split_once('|') {
            Some((t, m)) => (t.trim(), m.trim()),
            None => (type_string.trim(), ""),
        };

        let mut schema = self.parse_type(field, type_part)?;
        let mut required = false;

        let markers = parse_markers(marker_part).map_err(|reason| Error::InvalidMarker {
            field: field.to_string(),
            reason,
        })?;
        for marker in &markers {
            required |= self.apply_marker(field, &mut schema, marker)?;
        }

        Ok((schema, required))
    }

    /// Parse a type token: atomic, `[]T`, `map[string]V`, or a
    /// pre-defined type name.
    fn parse_type(&self, field: &str, type_token: &str) -> Result<Schema, Error> {
        match type_token {
            "string" => return Ok(Schema::of_type(TYPE_STRING)),
            "integer" => return Ok(Schema::of_type(TYPE_INTEGER)),
            "boolean" => return Ok(Schema::of_type(TYPE_BOOLEAN)),
            "float" => return Ok(Schema::of_type(TYPE_NUMBER)),
            _ => {}
        }

        if let Some(item_token) = type_token.strip_prefix("[]") {
            let mut schema = Schema::of_type(TYPE_ARRAY);
            schema.items = Some(Box::new(self.parse_type(field, item_token)?));
            return Ok(schema);
        }

        if let Some(rest) = type_token.strip_prefix("map[") {
            let Some((key_token, value_token)) = rest.split_once(']') else {
                return Err(Error::InvalidSimpleSchema {
                    field: field.to_string(),
                    reason: format!("malformed map type `{type_token}`"),
                });
            };
            if key_token != "string" {
                return Err(Error::InvalidSimpleSchema {
                    field: field.to_string(),
                    reason: format!("map key type must be `string`, found `{key_token}`"),
                });
            }
            let mut schema = Schema::of_type(TYPE_OBJECT);
            schema.additional_properties = Some(Box::new(AdditionalProperties {
                allowed: true,
                schema: Some(self.parse_type(field, value_token)?),
            }));
            return Ok(schema);
        }

        self.pre_defined_types
            .get(type_token)
            .cloned()
            .ok_or_else(|| Error::UnknownType {
                name: type_token.to_string(),
                field: field.to_string(),
            })
    }

    /// Apply one marker to the field schema. Returns whether the marker
    /// made the field required.
    fn apply_marker(
        &self,
        field: &str,
        schema: &mut Schema,
        marker: &Marker,
    ) -> Result<bool, Error> {
        match marker.key.as_str() {
            "required" => {
                let required =
                    marker
                        .value
                        .text()
                        .parse::<bool>()
                        .map_err(|_| Error::InvalidMarker {
                            field: field.to_string(),
                            reason: format!(
                                "required must be `true` or `false`, found `{}`",
                                marker.value.text()
                            ),
                        })?;
                return Ok(required);
            }
            "default" => {
                schema.default = Some(self.parse_default(field, &marker.value)?);
            }
            "description" => {
                schema.description = Some(marker.value.text().to_string());
            }
            "minimum" => {
                schema.minimum = Some(parse_bound(field, "minimum", marker.value.text())?);
            }
            "maximum" => {
                schema.maximum = Some(parse_bound(field, "maximum", marker.value.text())?);
            }
            "validation" => {
                schema.validation_rules.push(ValidationRule {
                    rule: marker.value.text().to_string(),
                    message: "validation failed".to_string(),
                });
            }
            "enum" => {
                schema.enum_values = parse_enum(field, schema, marker.value.text())?;
            }
            unknown => {
                return Err(Error::InvalidMarker {
                    field: field.to_string(),
                    reason: format!("unknown marker `{unknown}`"),
                });
            }
        }
        Ok(false)
    }

    /// Quoted defaults are strings verbatim; everything else must be
    /// valid JSON (scalars, objects, arrays).
    fn parse_default(&self, field: &str, value: &MarkerValue) -> Result<Value, Error> {
        if let Some(quoted) = value.as_quoted() {
            return Ok(Value::String(quoted.clone()));
        }
        serde_json::from_str(value.text()).map_err(|e| Error::InvalidMarker {
            field: field.to_string(),
            reason: format!("default is not valid JSON: {e}"),
        })
    }
}

fn parse_bound(field: &str, key: &str, text: &str) -> Result<f64, Error> {
    text.parse::<f64>().map_err(|_| Error::InvalidMarker {
        field: field.to_string(),
        reason: format!("{key} must be a number, found `{text}`"),
    })
}

/// Split a comma-separated enum list, validating each item against the
/// field's declared type.
fn parse_enum(field: &str, schema: &Schema, text: &str) -> Result<Vec<Value>, Error> {
    let declared = schema.types.first().map(String::as_str);
    let mut values = Vec::new();

    for item in text.split(',') {
        let item = item.trim();
        if item.is_empty() {
            return Err(Error::InvalidMarker {
                field: field.to_string(),
                reason: "enum contains an empty item".to_string(),
            });
        }
        let value = match declared {
            Some(TYPE_STRING) => Value::String(item.to_string()),
            Some(TYPE_INTEGER) => {
                let n = item.parse::<i64>().map_err(|_| Error::InvalidMarker {
                    field: field.to_string(),
                    reason: format!("enum item `{item}` is not an integer"),
                })?;
                Value::Number(n.into())
            }
            other => {
                return Err(Error::InvalidMarker {
                    field: field.to_string(),
                    reason: format!(
                        "enum is not supported for type `{}`",
                        other.unwrap_or("unknown")
                    ),
                });
            }
        };
        values.push(value);
    }

    Ok(values)
}
