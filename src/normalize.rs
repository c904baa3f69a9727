//! One-time document normalization.
//!
//! Applied to a copy of the raw document before resolution, never to the
//! user's document itself:
//! - `properties`, `$defs` and `definitions` entries without a `title` get
//!   their key as title
//! - `const` becomes a one-element `enum`
//! - an untyped schema with an `enum` gets the types of the enum values

use indexmap::IndexSet;
use serde_json::{Map, Value};

use crate::types::json_type_name;

/// Keywords whose value is a map of name to subschema.
const SCHEMA_RECORDS: &[&str] = &[
    "definitions",
    "$defs",
    "properties",
    "patternProperties",
    "dependentSchemas",
];

/// Keywords whose value is an array of subschemas.
const SCHEMA_ARRAYS: &[&str] = &["allOf", "anyOf", "oneOf", "prefixItems"];

/// Keywords whose value is a single subschema.
const SCHEMA_SINGLES: &[&str] = &[
    "items",
    "contains",
    "additionalProperties",
    "propertyNames",
    "if",
    "then",
    "else",
    "not",
    "unevaluatedItems",
    "unevaluatedProperties",
    "contentSchema",
];

const TITLED_RECORDS: &[&str] = &["properties", "definitions", "$defs"];

/// Return a normalized copy of `document`.
pub fn normalize_document(document: &Value) -> Value {
    let mut copy = document.clone();
    normalize_node(&mut copy);
    copy
}

fn normalize_node(node: &mut Value) {
    let Value::Object(schema) = node else {
        return;
    };

    induce_titles(schema);
    convert_const_to_enum(schema);
    inject_enum_types(schema);

    for keyword in SCHEMA_RECORDS {
        if let Some(Value::Object(record)) = schema.get_mut(*keyword) {
            record.values_mut().for_each(normalize_node);
        }
    }
    for keyword in SCHEMA_ARRAYS {
        if let Some(Value::Array(members)) = schema.get_mut(*keyword) {
            members.iter_mut().for_each(normalize_node);
        }
    }
    for keyword in SCHEMA_SINGLES {
        if let Some(child) = schema.get_mut(*keyword) {
            normalize_node(child);
        }
    }
}

fn induce_titles(schema: &mut Map<String, Value>) {
    for keyword in TITLED_RECORDS {
        let Some(Value::Object(record)) = schema.get_mut(*keyword) else {
            continue;
        };
        for (key, entry) in record.iter_mut() {
            if let Value::Object(entry) = entry {
                entry
                    .entry("title")
                    .or_insert_with(|| Value::String(key.clone()));
            }
        }
    }
}

fn convert_const_to_enum(schema: &mut Map<String, Value>) {
    if let Some(value) = schema.remove("const") {
        schema.insert("enum".into(), Value::Array(vec![value]));
    }
}

fn inject_enum_types(schema: &mut Map<String, Value>) {
    if schema.contains_key("type") {
        return;
    }
    let Some(Value::Array(values)) = schema.get("enum") else {
        return;
    };
    let types: IndexSet<&str> = values.iter().map(json_type_name).collect();
    let inferred = match types.len() {
        0 => return,
        1 => Value::String(types[0].to_string()),
        _ => Value::Array(types.into_iter().map(|t| Value::String(t.into())).collect()),
    };
    schema.insert("type".into(), inferred);
}
