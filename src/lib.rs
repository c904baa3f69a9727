//! Effective Schema
//!
//! Lazy resolution of JSON Schema documents and data-dependent effective
//! schema calculation.
//!
//! A raw document is preprocessed once per [`SessionMode`]: `$ref`s become
//! their (cached) targets, `allOf` members are merged, incompatible
//! `oneOf`/`anyOf` branches are pruned, and `if`/`then`/`else` triples found
//! inside `allOf` are lifted into an internal `conditions` list. Nodes are
//! preprocessed on access, so cyclic documents never unfold past what is
//! asked for.
//!
//! The effective schema at a path then resolves everything that depends on
//! the data: conditionals, `dependentRequired`, `dependentSchemas`.
//!
//! # Example
//!
//! ```
//! use effective_schema::{preprocess, EngineOptions, Path, SessionMode};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "$defs": { "name": { "type": "string" } },
//!     "properties": { "first": { "$ref": "#/$defs/name" } },
//!     "if": { "required": ["married"] },
//!     "then": { "properties": { "spouse": { "$ref": "#/$defs/name" } } }
//! });
//!
//! let doc = preprocess(&schema, SessionMode::FileEditor, &EngineOptions::default()).unwrap();
//!
//! // Without data the conditional stays unresolved
//! assert!(doc.schema_at(&Path::root()).property("spouse").is_none());
//!
//! let married = json!({ "married": true });
//! let effective = doc.effective_schema_at(&married, &Path::root());
//! let spouse = doc.property_of(&effective, "spouse").unwrap();
//! assert_eq!(spouse.get("type"), Some(&json!("string")));
//!
//! let at_spouse = doc.effective_schema_at(&married, &Path::parse("/spouse"));
//! assert_eq!(at_spouse.schema, spouse);
//! ```
//!
//! # Merge Rules
//!
//! | Keyword | Conjunction |
//! |---------|-------------|
//! | `type` | intersection |
//! | `required` | union |
//! | `minimum`, `maxLength`, ... | tightest bound |
//! | `properties` | union, colliding entries merged |
//! | anything else that differs | first value kept, rest left in `allOf` |
//!
//! # Failure Policy
//!
//! Errors never abort a document. A dangling `$ref` degrades to `true`, an
//! empty `oneOf`/`anyOf` to `false`, and an `if` the validator cannot compile
//! counts as not satisfied. Use [`diagnose`] to list such problems.

mod context;
mod diagnose;
mod document;
mod effective;
mod error;
mod loader;
mod merge;
mod node;
mod normalize;
mod resolver;
mod types;
mod union;
mod validator;

pub use context::{CacheLookup, ResolutionContext};
pub use diagnose::{diagnose, DiagnoseResult, Diagnostic, Severity};
pub use document::{preprocess, PreprocessedSchema, SchemaSession};
pub use effective::{
    calculate_effective_schema, EffectiveSchema, EffectiveSchemaCalculator, Selections,
};
pub use error::{ResolveError, ValidateError};
pub use loader::{load_schema, load_schema_str, navigate_fragment};
pub use merge::{are_schemas_compatible, merge, merge_all_of, merge_pair};
pub use node::{Condition, SchemaNode, CONDITIONS};
pub use normalize::normalize_document;
pub use resolver::{resolve_and_transform, resolve_ref, Resolver};
pub use types::{
    data_at, json_type_name, EngineOptions, Path, PathSegment, SessionMode,
    DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_ITERATIONS,
};
pub use union::{fold_one_of_into_any_of, prune_incompatible};
pub use validator::{is_valid, JsonSchemaValidationService, ValidationService};
