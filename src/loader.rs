//! Document loading and JSON Pointer lookup.

use std::path::Path;

use serde_json::Value;

use crate::error::ResolveError;

/// Load a JSON document (schema or data) from a file path.
///
/// # Errors
///
/// Returns `ResolveError::FileNotFound` if the file doesn't exist,
/// or `ResolveError::InvalidJson` if the file isn't valid JSON.
pub fn load_schema(path: &Path) -> Result<Value, ResolveError> {
    if !path.exists() {
        return Err(ResolveError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| ResolveError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ResolveError::InvalidJson { source })
}

/// Load a JSON document from a string.
///
/// # Errors
///
/// Returns `ResolveError::InvalidJson` if the string isn't valid JSON.
pub fn load_schema_str(content: &str) -> Result<Value, ResolveError> {
    serde_json::from_str(content).map_err(|source| ResolveError::InvalidJson { source })
}

/// Strip the leading `#` from a `$ref` value, leaving the JSON Pointer.
pub fn pointer_of(reference: &str) -> &str {
    reference.strip_prefix('#').unwrap_or(reference)
}

/// Navigate a JSON Pointer fragment (e.g., "#/$defs/foo" or "/properties/bar").
///
/// Returns the value at the given pointer within `root`.
///
/// # Errors
///
/// Returns `ResolveError::DanglingReference` when nothing lives at the pointer.
pub fn navigate_fragment<'a>(root: &'a Value, fragment: &str) -> Result<&'a Value, ResolveError> {
    let pointer = pointer_of(fragment);
    if pointer.is_empty() {
        return Ok(root);
    }
    if !pointer.starts_with('/') {
        // Plain-name fragments ($anchor) are not supported.
        return Err(ResolveError::DanglingReference {
            reference: fragment.to_string(),
        });
    }
    root.pointer(pointer)
        .ok_or_else(|| ResolveError::DanglingReference {
            reference: fragment.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_schema_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type": "object"}}"#).unwrap();

        let schema = load_schema(file.path()).unwrap();
        assert_eq!(schema["type"], "object");
    }

    #[test]
    fn load_schema_file_not_found() {
        let result = load_schema(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(ResolveError::FileNotFound { .. })));
    }

    #[test]
    fn load_schema_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_schema(file.path());
        assert!(matches!(result, Err(ResolveError::InvalidJson { .. })));
    }

    #[test]
    fn load_schema_str_invalid() {
        let result = load_schema_str("not json");
        assert!(matches!(result, Err(ResolveError::InvalidJson { .. })));
    }

    #[test]
    fn navigate_fragment_with_and_without_hash() {
        let root = json!({"$defs": {"a/b": {"type": "string"}, "list": [1, {"x": 2}]}});
        assert_eq!(
            navigate_fragment(&root, "#/$defs/a~1b").unwrap(),
            &json!({"type": "string"})
        );
        assert_eq!(navigate_fragment(&root, "/$defs/list/1/x").unwrap(), &json!(2));
        assert_eq!(navigate_fragment(&root, "#").unwrap(), &root);
    }

    #[test]
    fn navigate_fragment_dangling() {
        let root = json!({"$defs": {}});
        let result = navigate_fragment(&root, "#/$defs/missing");
        assert!(matches!(
            result,
            Err(ResolveError::DanglingReference { reference }) if reference == "#/$defs/missing"
        ));
        assert!(navigate_fragment(&root, "#anchor").is_err());
    }
}
