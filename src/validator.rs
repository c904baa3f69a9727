//! Validation of data against subschemas of a root document.
//!
//! A subschema pulled out of a document can still carry `$ref`s into that
//! document. Before compiling, the root is embedded under
//! `$defs/__root` and every local pointer is rebased onto it, so the
//! subschema validates exactly as it would in place.

use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::Validator;
use log::debug;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::context::ResolutionContext;
use crate::error::ValidateError;
use crate::node::{SchemaNode, CONDITIONS};

const EMBEDDED_ROOT: &str = "__root";

/// Keywords whose values are data, copied as-is.
const VALUE_KEYWORDS: &[&str] = &["const", "enum", "default", "examples"];

/// Keywords mapping arbitrary names to schemas.
const NAMED_SCHEMAS: &[&str] = &[
    "properties",
    "patternProperties",
    "dependentSchemas",
    "$defs",
    "definitions",
];

/// Answers whether data satisfies a schema.
pub trait ValidationService: Send + Sync {
    /// # Errors
    ///
    /// Returns `ValidateError::Compile` if the schema cannot be compiled.
    fn validate(&self, schema: &SchemaNode, data: &Value) -> Result<bool, ValidateError>;
}

/// [`ValidationService`] backed by the `jsonschema` crate.
///
/// Compiled validators are memoized by schema text, so repeated `if`
/// evaluations during effective-schema iteration compile once.
pub struct JsonSchemaValidationService {
    root: Arc<Value>,
    compiled: Mutex<HashMap<String, Arc<Validator>>>,
}

impl JsonSchemaValidationService {
    pub fn new(root: Arc<Value>) -> Self {
        Self {
            root,
            compiled: Mutex::new(HashMap::new()),
        }
    }

    pub fn for_context(context: &ResolutionContext) -> Self {
        Self::new(context.root_arc())
    }

    /// Number of compiled validators held.
    pub fn compiled_len(&self) -> usize {
        self.compiled.lock().len()
    }

    fn validator(&self, schema: &Value) -> Result<Arc<Validator>, ValidateError> {
        let document = embed_in_root(schema, &self.root);
        let key = document.to_string();
        if let Some(validator) = self.compiled.lock().get(&key) {
            return Ok(Arc::clone(validator));
        }

        let validator = jsonschema::validator_for(&document).map_err(|e| {
            debug!("failed to compile subschema: {}", e);
            ValidateError::Compile {
                message: e.to_string(),
            }
        })?;
        let validator = Arc::new(validator);
        self.compiled.lock().insert(key, Arc::clone(&validator));
        Ok(validator)
    }
}

impl ValidationService for JsonSchemaValidationService {
    fn validate(&self, schema: &SchemaNode, data: &Value) -> Result<bool, ValidateError> {
        if let Some(b) = schema.as_bool() {
            return Ok(b);
        }
        Ok(self.validator(&schema.to_value())?.is_valid(data))
    }
}

impl std::fmt::Debug for JsonSchemaValidationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaValidationService")
            .field("compiled", &self.compiled_len())
            .finish()
    }
}

/// Validate `data` against a standalone schema document.
///
/// # Errors
///
/// Returns `ValidateError::Compile` if the schema cannot be compiled.
pub fn is_valid(schema: &Value, data: &Value) -> Result<bool, ValidateError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ValidateError::Compile {
        message: e.to_string(),
    })?;
    Ok(validator.is_valid(data))
}

/// Wrap `schema` so its local `$ref`s resolve against a copy of `root`.
fn embed_in_root(schema: &Value, root: &Value) -> Value {
    let mut embedded_root = rebase(root);
    if let Value::Object(map) = &mut embedded_root {
        map.remove("$id");
        map.remove("$schema");
    }

    let mut document = match rebase(schema) {
        Value::Object(map) => map,
        other => return other,
    };
    document.remove("$id");
    if let Some(dialect) = root.get("$schema") {
        document.insert("$schema".into(), dialect.clone());
    }
    let defs = document
        .entry("$defs")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(defs) = defs {
        defs.insert(EMBEDDED_ROOT.into(), embedded_root);
    }
    Value::Object(document)
}

/// Copy `value`, pointing local `$ref`s at the embedded root and turning
/// lifted `conditions` back into plain `allOf` members.
fn rebase(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            let mut lifted: Vec<Value> = Vec::new();
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("$ref", Value::String(reference)) => {
                        out.insert(key.clone(), Value::String(rebase_reference(reference)));
                    }
                    (CONDITIONS, Value::Array(conditions)) => {
                        lifted.extend(conditions.iter().map(rebase));
                    }
                    (keyword, _) if VALUE_KEYWORDS.contains(&keyword) => {
                        out.insert(key.clone(), child.clone());
                    }
                    (keyword, Value::Object(named)) if NAMED_SCHEMAS.contains(&keyword) => {
                        let named = named
                            .iter()
                            .map(|(name, schema)| (name.clone(), rebase(schema)))
                            .collect();
                        out.insert(key.clone(), Value::Object(named));
                    }
                    _ => {
                        out.insert(key.clone(), rebase(child));
                    }
                }
            }
            if !lifted.is_empty() {
                match out.get_mut("allOf") {
                    Some(Value::Array(members)) => members.extend(lifted),
                    _ => {
                        out.insert("allOf".into(), Value::Array(lifted));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(rebase).collect()),
        other => other.clone(),
    }
}

fn rebase_reference(reference: &str) -> String {
    match reference.strip_prefix('#') {
        Some("") => format!("#/$defs/{}", EMBEDDED_ROOT),
        Some(pointer) if pointer.starts_with('/') => {
            format!("#/$defs/{}{}", EMBEDDED_ROOT, pointer)
        }
        _ => reference.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: Value) -> SchemaNode {
        SchemaNode::try_from(value).unwrap()
    }

    fn service(root: Value) -> JsonSchemaValidationService {
        JsonSchemaValidationService::new(Arc::new(root))
    }

    #[test]
    fn boolean_schemas_skip_compilation() {
        let svc = service(json!({}));
        assert!(svc.validate(&SchemaNode::Bool(true), &json!(1)).unwrap());
        assert!(!svc.validate(&SchemaNode::Bool(false), &json!(1)).unwrap());
        assert_eq!(svc.compiled_len(), 0);
    }

    #[test]
    fn subschema_refs_resolve_against_root() {
        let svc = service(json!({
            "$defs": {"positive": {"type": "integer", "minimum": 1}}
        }));
        let schema = node(json!({
            "type": "object",
            "properties": {"n": {"$ref": "#/$defs/positive"}}
        }));
        assert!(svc.validate(&schema, &json!({"n": 3})).unwrap());
        assert!(!svc.validate(&schema, &json!({"n": 0})).unwrap());
    }

    #[test]
    fn refs_inside_root_are_rebased_too() {
        let svc = service(json!({
            "$defs": {
                "wrapper": {"properties": {"inner": {"$ref": "#/$defs/leaf"}}},
                "leaf": {"type": "string"}
            }
        }));
        let schema = node(json!({"$ref": "#/$defs/wrapper"}));
        assert!(svc.validate(&schema, &json!({"inner": "ok"})).unwrap());
        assert!(!svc.validate(&schema, &json!({"inner": 1})).unwrap());
    }

    #[test]
    fn lifted_conditions_are_enforced() {
        let svc = service(json!({}));
        let schema = node(json!({
            "conditions": [
                {"if": {"required": ["a"]}, "then": {"required": ["b"]}}
            ]
        }));
        assert!(svc.validate(&schema, &json!({"a": 1, "b": 2})).unwrap());
        assert!(!svc.validate(&schema, &json!({"a": 1})).unwrap());
    }

    #[test]
    fn value_keywords_keep_reference_lookalikes() {
        let svc = service(json!({"$defs": {"s": {"type": "string"}}}));
        let schema = node(json!({"const": {"$ref": "#/a", "conditions": []}}));
        assert!(svc.validate(&schema, &json!({"$ref": "#/a", "conditions": []})).unwrap());

        let named_like_keywords = node(json!({
            "properties": {"const": {"$ref": "#/$defs/s"}, "enum": {"$ref": "#/$defs/s"}}
        }));
        assert!(svc.validate(&named_like_keywords, &json!({"const": "x", "enum": "y"})).unwrap());
        assert!(!svc.validate(&named_like_keywords, &json!({"const": 5})).unwrap());
    }

    #[test]
    fn validators_are_memoized() {
        let svc = service(json!({}));
        let schema = node(json!({"type": "string"}));
        svc.validate(&schema, &json!("a")).unwrap();
        svc.validate(&schema, &json!("b")).unwrap();
        assert_eq!(svc.compiled_len(), 1);
    }

    #[test]
    fn uncompilable_schema_is_an_error() {
        let svc = service(json!({}));
        let schema = node(json!({"type": 12}));
        assert!(matches!(
            svc.validate(&schema, &json!(null)),
            Err(ValidateError::Compile { .. })
        ));
    }

    #[test]
    fn rebase_reference_forms() {
        assert_eq!(rebase_reference("#"), "#/$defs/__root");
        assert_eq!(rebase_reference("#/$defs/a"), "#/$defs/__root/$defs/a");
        assert_eq!(rebase_reference("other.json#/a"), "other.json#/a");
    }

    #[test]
    fn standalone_is_valid() {
        assert!(is_valid(&json!({"type": "number"}), &json!(1.5)).unwrap());
        assert!(!is_valid(&json!({"type": "number"}), &json!("x")).unwrap());
    }
}
