//! Recursive schema model in the OpenAPI style, including the Kubernetes
//! extension markers that change how values are walked.

use crate::Error;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type name for strings.
pub const TYPE_STRING: &str = "string";
/// Type name for integers.
pub const TYPE_INTEGER: &str = "integer";
/// Type name for floating-point numbers.
pub const TYPE_NUMBER: &str = "number";
/// Type name for booleans.
pub const TYPE_BOOLEAN: &str = "boolean";
/// Type name for objects.
pub const TYPE_OBJECT: &str = "object";
/// Type name for arrays.
pub const TYPE_ARRAY: &str = "array";
/// Pseudo-type admitting any value.
pub const TYPE_ANY: &str = "any";

/// The set of types a field may legally hold, as computed from its schema.
pub type ExpectedTypes = IndexSet<String>;

/// A recursive OpenAPI-style schema.
///
/// Exactly the subset this engine consumes: declared types, object
/// properties with `required` lists, array items, `oneOf`/`anyOf`
/// unions, permissive `additionalProperties`, scalar constraints, and the
/// `x-kubernetes-int-or-string` / `x-kubernetes-preserve-unknown-fields`
/// extension markers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Schema {
    /// Declared type(s); OpenAPI allows a single name or a list.
    #[serde(
        rename = "type",
        skip_serializing_if = "Vec::is_empty",
        with = "string_or_list"
    )]
    pub types: Vec<String>,
    /// Named properties of an object schema.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    /// Required property names of an object schema.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Item schema of an array schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Additional-properties policy of an object schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<AdditionalProperties>>,
    /// The value must match exactly one subschema.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Schema>,
    /// The value must match at least one subschema.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<Schema>,
    /// The value must not match this subschema. Only its presence matters
    /// to expected-type computation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<Schema>>,
    /// Default value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Inclusive lower bound for numeric values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numeric values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Allowed values.
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    /// Attached validation rules.
    #[serde(
        rename = "x-kubernetes-validations",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub validation_rules: Vec<ValidationRule>,
    /// The value may be either an integer or a string.
    #[serde(
        rename = "x-kubernetes-int-or-string",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub int_or_string: bool,
    /// The value is opaque to the schema: anything goes, recursively.
    #[serde(
        rename = "x-kubernetes-preserve-unknown-fields",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub preserve_unknown_fields: bool,
}

/// Additional-properties policy: free-form permission, optionally with a
/// schema every extra property must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdditionalProperties {
    /// Whether unknown properties are allowed at all.
    pub allowed: bool,
    /// Schema for unknown properties, when constrained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// A named validation rule with its failure message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    /// The rule expression.
    pub rule: String,
    /// Message reported when the rule fails.
    pub message: String,
}

impl Schema {
    /// A schema declaring a single scalar/object/array type.
    pub fn of_type(name: &str) -> Self {
        Schema {
            types: vec![name.to_string()],
            ..Default::default()
        }
    }

    /// A schema that admits anything, recursively.
    pub fn permissive() -> Self {
        Schema {
            preserve_unknown_fields: true,
            ..Default::default()
        }
    }

    /// Whether this subschema imposes structural constraints that imply
    /// object-ness even without a declared type.
    pub fn has_structural_constraints(&self) -> bool {
        !self.required.is_empty() || self.not.is_some()
    }

    /// Compute the set of types a value at `path` may hold under this
    /// schema. Fails when the schema carries none of declared types,
    /// `oneOf`, `anyOf`, `additionalProperties`, or an extension marker.
    pub fn expected_types(&self, path: &str) -> Result<ExpectedTypes, Error> {
        if self.int_or_string {
            return Ok(IndexSet::from([
                TYPE_STRING.to_string(),
                TYPE_INTEGER.to_string(),
            ]));
        }
        if self.preserve_unknown_fields {
            return Ok(IndexSet::from([TYPE_ANY.to_string()]));
        }

        if !self.one_of.is_empty() || !self.any_of.is_empty() {
            let mut types = IndexSet::new();
            for sub in self.one_of.iter().chain(self.any_of.iter()) {
                types.extend(sub.types.iter().cloned());
                if sub.has_structural_constraints() {
                    types.insert(TYPE_OBJECT.to_string());
                }
            }
            if types.is_empty() {
                return Err(Error::InvalidSchema {
                    path: path.to_string(),
                    reason: "oneOf/anyOf subschemas declare no types".to_string(),
                });
            }
            return Ok(types);
        }

        if !self.types.is_empty() {
            return Ok(self.types.iter().cloned().collect());
        }

        if self.additional_properties.is_some() {
            return Ok(IndexSet::from([TYPE_ANY.to_string()]));
        }

        Err(Error::InvalidSchema {
            path: path.to_string(),
            reason: "schema has no type, oneOf, anyOf, or additionalProperties".to_string(),
        })
    }

    /// Resolve the schema for a named property of this object schema:
    /// declared properties first, then the additional-properties schema,
    /// then (if unknowns are allowed at all) a permissive schema.
    pub fn property_schema(&self, name: &str) -> Option<Schema> {
        if let Some(schema) = self.properties.get(name) {
            return Some(schema.clone());
        }
        if let Some(additional) = &self.additional_properties {
            if let Some(schema) = &additional.schema {
                return Some(schema.clone());
            }
            if additional.allowed {
                return Some(Schema::permissive());
            }
        }
        if self.preserve_unknown_fields {
            return Some(Schema::permissive());
        }
        None
    }
}

/// OpenAPI `type` can be a bare string or a list of strings.
mod string_or_list {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub(super) fn serialize<S: Serializer>(
        types: &Vec<String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match types.as_slice() {
            [single] => single.serialize(serializer),
            many => many.serialize(serializer),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<String>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(String),
            Many(Vec<String>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::One(single) => Ok(vec![single]),
            Repr::Many(many) => {
                if many.is_empty() {
                    return Err(de::Error::custom("`type` list must not be empty"));
                }
                Ok(many)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_openapi_shape() {
        let schema: Schema = serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "replicas": {"type": "integer", "minimum": 0},
                "port": {"x-kubernetes-int-or-string": true},
            },
            "required": ["replicas"],
        }))
        .unwrap();

        assert_eq!(schema.types, vec!["object"]);
        assert_eq!(schema.required, vec!["replicas"]);
        assert!(schema.properties["port"].int_or_string);
        assert_eq!(schema.properties["replicas"].minimum, Some(0.0));
    }

    #[test]
    fn type_accepts_string_or_list() {
        let schema: Schema = serde_json::from_value(json!({"type": ["string", "null"]})).unwrap();
        assert_eq!(schema.types, vec!["string", "null"]);

        let round = serde_json::to_value(&Schema::of_type(TYPE_STRING)).unwrap();
        assert_eq!(round, json!({"type": "string"}));
    }

    #[test]
    fn expected_types_follow_markers() {
        let schema = Schema {
            int_or_string: true,
            ..Default::default()
        };
        let types = schema.expected_types("f").unwrap();
        assert!(types.contains(TYPE_STRING) && types.contains(TYPE_INTEGER));

        let types = Schema::permissive().expected_types("f").unwrap();
        assert_eq!(types, ExpectedTypes::from([TYPE_ANY.to_string()]));
    }

    #[test]
    fn expected_types_union_over_one_of() {
        let schema = Schema {
            one_of: vec![
                Schema::of_type(TYPE_STRING),
                Schema {
                    required: vec!["x".to_string()],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let types = schema.expected_types("f").unwrap();
        assert!(types.contains(TYPE_STRING));
        assert!(types.contains(TYPE_OBJECT));
    }

    #[test]
    fn typeless_schema_is_rejected_with_path() {
        let err = Schema::default().expected_types("spec.bad").unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { path, .. } if path == "spec.bad"));
    }

    #[test]
    fn property_resolution_order() {
        let schema = Schema {
            types: vec![TYPE_OBJECT.to_string()],
            properties: IndexMap::from([("known".to_string(), Schema::of_type(TYPE_STRING))]),
            additional_properties: Some(Box::new(AdditionalProperties {
                allowed: true,
                schema: None,
            })),
            ..Default::default()
        };
        assert_eq!(
            schema.property_schema("known").unwrap().types,
            vec![TYPE_STRING]
        );
        assert!(schema.property_schema("extra").unwrap().preserve_unknown_fields);

        let strict = Schema::of_type(TYPE_OBJECT);
        assert!(strict.property_schema("extra").is_none());
    }
}
