//! Whole-document diagnostics.
//!
//! Resolution recovers from broken nodes locally, so a document with a
//! dangling `$ref` or an empty union still preprocesses. `diagnose` walks the
//! raw document and reports those problems up front:
//! - `E001` dangling `$ref`
//! - `E002` `$ref` target that is not a schema
//! - `E003` empty `oneOf`/`anyOf`
//! - `W001` `$ref` outside the document (not followed)
//! - `W002` union whose branches all conflict with their siblings

use serde::Serialize;
use serde_json::Value;

use crate::loader::navigate_fragment;
use crate::merge::are_schemas_compatible;
use crate::node::SchemaNode;
use crate::types::json_type_name;

/// Keywords holding data rather than subschemas.
const DATA_KEYWORDS: &[&str] = &["const", "enum", "default", "examples"];

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single problem found in a document.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// JSON Pointer to the offending node (e.g., "/properties/id")
    pub path: String,
    pub message: String,
}

/// Result of diagnosing one document.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnoseResult {
    pub errors: usize,
    pub warnings: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnoseResult {
    /// Returns true if no errors were found. Warnings do not count.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Diagnose a raw schema document.
pub fn diagnose(root: &Value) -> DiagnoseResult {
    let mut diagnostics = Vec::new();
    if !matches!(root, Value::Bool(_) | Value::Object(_)) {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            code: "E002".to_string(),
            path: "/".to_string(),
            message: format!("document is a {}, not a schema", json_type_name(root)),
        });
    } else {
        check_node(root, "", root, &mut diagnostics);
    }

    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    DiagnoseResult {
        errors,
        warnings: diagnostics.len() - errors,
        diagnostics,
    }
}

fn check_node(value: &Value, path: &str, root: &Value, diagnostics: &mut Vec<Diagnostic>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                check_ref(reference, path, root, diagnostics);
            }
            for keyword in ["oneOf", "anyOf"] {
                if let Some(Value::Array(branches)) = map.get(keyword) {
                    check_union(value, keyword, branches, path, diagnostics);
                }
            }

            for (key, child) in map {
                if DATA_KEYWORDS.contains(&key.as_str()) {
                    continue;
                }
                let child_path = format!("{}/{}", path, escape(key));
                check_node(child, &child_path, root, diagnostics);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let child_path = format!("{}/{}", path, i);
                check_node(item, &child_path, root, diagnostics);
            }
        }
        _ => {}
    }
}

fn check_ref(reference: &str, path: &str, root: &Value, diagnostics: &mut Vec<Diagnostic>) {
    if !reference.starts_with('#') {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            code: "W001".to_string(),
            path: display(path),
            message: format!("reference \"{}\" leaves the document and is not followed", reference),
        });
        return;
    }

    match navigate_fragment(root, reference) {
        Ok(Value::Bool(_) | Value::Object(_)) => {}
        Ok(other) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            code: "E002".to_string(),
            path: display(path),
            message: format!(
                "reference \"{}\" points at a {}, not a schema",
                reference,
                json_type_name(other)
            ),
        }),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            code: "E001".to_string(),
            path: display(path),
            message: e.to_string(),
        }),
    }
}

fn check_union(
    node: &Value,
    keyword: &str,
    branches: &[Value],
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if branches.is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            code: "E003".to_string(),
            path: display(path),
            message: format!("{} has zero entries; the node can never be satisfied", keyword),
        });
        return;
    }

    let parent = SchemaNode::lenient(node).without(&[keyword]);
    let all_conflict = branches
        .iter()
        .all(|branch| !are_schemas_compatible(&parent, &SchemaNode::lenient(branch)));
    if all_conflict {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            code: "W002".to_string(),
            path: display(path),
            message: format!("every {} branch conflicts with its sibling keywords", keyword),
        });
    }
}

fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn display(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codes(result: &DiagnoseResult) -> Vec<&str> {
        result.diagnostics.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn clean_document_is_ok() {
        let doc = json!({
            "$defs": {"name": {"type": "string"}},
            "properties": {"first": {"$ref": "#/$defs/name"}},
            "oneOf": [{"required": ["first"]}, {"required": ["last"]}]
        });
        let result = diagnose(&doc);
        assert!(result.is_ok());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn dangling_reference_reported_with_path() {
        let doc = json!({"properties": {"a/b": {"$ref": "#/$defs/missing"}}});
        let result = diagnose(&doc);
        assert_eq!(codes(&result), vec!["E001"]);
        assert_eq!(result.diagnostics[0].path, "/properties/a~1b");
        assert!(!result.is_ok());
    }

    #[test]
    fn reference_to_non_schema() {
        let doc = json!({"$defs": {"n": 3}, "items": {"$ref": "#/$defs/n"}});
        assert_eq!(codes(&diagnose(&doc)), vec!["E002"]);
    }

    #[test]
    fn empty_union_reported() {
        let doc = json!({"properties": {"x": {"anyOf": []}}});
        let result = diagnose(&doc);
        assert_eq!(codes(&result), vec!["E003"]);
        assert_eq!(result.diagnostics[0].path, "/properties/x");
    }

    #[test]
    fn external_reference_is_a_warning() {
        let result = diagnose(&json!({"$ref": "other.json#/a"}));
        assert_eq!(codes(&result), vec!["W001"]);
        assert!(result.is_ok());
        assert_eq!(result.warnings, 1);
    }

    #[test]
    fn unsatisfiable_union_is_a_warning() {
        let result = diagnose(&json!({"type": "string", "oneOf": [{"type": "number"}]}));
        assert_eq!(codes(&result), vec!["W002"]);
    }

    #[test]
    fn data_keywords_are_skipped() {
        let doc = json!({"const": {"$ref": "#/nowhere"}, "default": {"oneOf": []}});
        assert!(diagnose(&doc).diagnostics.is_empty());
    }

    #[test]
    fn non_schema_document() {
        let result = diagnose(&json!([1, 2]));
        assert_eq!(codes(&result), vec!["E002"]);
    }

    #[test]
    fn diagnostics_serialize() {
        let result = diagnose(&json!({"oneOf": []}));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["errors"], 1);
        assert_eq!(value["diagnostics"][0]["severity"], "error");
        assert_eq!(value["diagnostics"][0]["path"], "/");
    }
}
