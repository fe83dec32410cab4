//! Read helpers over expanded JSON-LD documents.
//!
//! Expanded documents wrap most values in arrays and value objects, so a scalar may
//! arrive as `"x"`, `["x"]`, `[{"@value": "x"}]` or `[{"@id": "x"}]`.

use serde_json::Value;

use crate::vocab::{ID, TYPE, VALUE};

/// Absent-equivalent values: `null`, blank strings, blank `@value` objects and
/// arrays holding nothing else.
///
/// Any object without `@value` counts as present, even `{}`. An array of node
/// objects is a present value whose entries are checked on their own.
#[must_use]
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_blank),
        Value::Object(map) => map.get(VALUE).is_some_and(is_blank),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// The declared `@type` set of `document`, in document order.
#[must_use]
pub fn declared_types(document: &Value) -> Vec<&str> {
    match document.get(TYPE) {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// First scalar string carried by `property`, unwrapping arrays, `@value` and `@id`.
#[must_use]
pub fn first_string<'a>(document: &'a Value, property: &str) -> Option<&'a str> {
    document.get(property).and_then(scalar)
}

fn scalar(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items.iter().find_map(scalar),
        Value::Object(map) => map
            .get(VALUE)
            .and_then(scalar)
            .or_else(|| map.get(ID).and_then(Value::as_str)),
        _ => None,
    }
}
