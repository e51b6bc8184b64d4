//! Reading and writing unstructured trees through [Path]s.
//!
//! Writes create intermediate containers on demand: a map by default, or
//! an array when the next segment is an index. Writing past the end of an
//! array null-pads the gap so the index lands in place.

use crate::{
    path::{Path, Segment},
    Error,
};
use serde_json::Value;

/// Read the value at `path` within `root`.
///
/// # Example
///
/// ```
/// use lattice_schema::path::{get_value, Path};
/// use serde_json::json;
///
/// let root = json!({"spec": {"ports": [{"port": 8080}]}});
/// let path = Path::parse("spec.ports[0].port").unwrap();
/// assert_eq!(get_value(&root, &path).unwrap(), &json!(8080));
/// ```
pub fn get_value<'a>(root: &'a Value, path: &Path) -> Result<&'a Value, Error> {
    let mut current = root;
    for (depth, segment) in path.segments().iter().enumerate() {
        match segment {
            Segment::Field(name) => {
                let map = current.as_object().ok_or_else(|| Error::TypeMismatch {
                    path: prefix(path, depth),
                    expected: "map".to_string(),
                    found: kind(current).to_string(),
                })?;
                current = map.get(name).ok_or_else(|| Error::NotFound {
                    path: prefix(path, depth + 1),
                })?;
            }
            Segment::Index(index) => {
                let items = current.as_array().ok_or_else(|| Error::TypeMismatch {
                    path: prefix(path, depth),
                    expected: "array".to_string(),
                    found: kind(current).to_string(),
                })?;
                current = items.get(*index).ok_or_else(|| Error::IndexOutOfBounds {
                    path: prefix(path, depth + 1),
                    index: *index,
                    len: items.len(),
                })?;
            }
        }
    }
    Ok(current)
}

/// Write `value` at `path` within `root`, creating intermediate maps and
/// arrays as needed.
///
/// # Example
///
/// ```
/// use lattice_schema::path::{upsert_value, Path};
/// use serde_json::json;
///
/// let mut root = json!({});
/// let path = Path::parse("spec.ports[1].port").unwrap();
/// upsert_value(&mut root, &path, json!(9090)).unwrap();
/// assert_eq!(root, json!({"spec": {"ports": [null, {"port": 9090}]}}));
/// ```
pub fn upsert_value(root: &mut Value, path: &Path, value: Value) -> Result<(), Error> {
    if path.is_empty() {
        *root = value;
        return Ok(());
    }

    let mut current = root;
    let segments = path.segments();

    for (depth, segment) in segments.iter().enumerate() {
        let last = depth + 1 == segments.len();

        match segment {
            Segment::Field(name) => {
                if current.is_null() {
                    *current = Value::Object(serde_json::Map::new());
                }
                let map = current.as_object_mut().ok_or_else(|| Error::TypeMismatch {
                    path: prefix(path, depth),
                    expected: "map".to_string(),
                    found: "non-map value".to_string(),
                })?;
                if last {
                    map.insert(name.clone(), value);
                    return Ok(());
                }
                let slot = map
                    .entry(name.clone())
                    .or_insert_with(|| empty_container(&segments[depth + 1]));
                if slot.is_null() {
                    *slot = empty_container(&segments[depth + 1]);
                }
                current = slot;
            }
            Segment::Index(index) => {
                if current.is_null() {
                    *current = Value::Array(Vec::new());
                }
                let items = current.as_array_mut().ok_or_else(|| Error::TypeMismatch {
                    path: prefix(path, depth),
                    expected: "array".to_string(),
                    found: "non-array value".to_string(),
                })?;
                if items.len() <= *index {
                    items.resize(index + 1, Value::Null);
                }
                let slot = &mut items[*index];
                if last {
                    *slot = value;
                    return Ok(());
                }
                if slot.is_null() {
                    *slot = empty_container(&segments[depth + 1]);
                }
                current = slot;
            }
        }
    }

    unreachable!("loop returns on the last segment")
}

/// The container shape implied by the upcoming segment.
fn empty_container(next: &Segment) -> Value {
    match next {
        Segment::Field(_) => Value::Object(serde_json::Map::new()),
        Segment::Index(_) => Value::Array(Vec::new()),
    }
}

/// Textual form of the first `depth` segments, for error messages.
fn prefix(path: &Path, depth: usize) -> String {
    Path::new(path.segments()[..depth].to_vec()).build()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}
