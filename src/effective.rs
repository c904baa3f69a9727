//! Effective schemas - the schema in force for a concrete data value.
//!
//! A preprocessed node may still hold keywords whose meaning depends on the
//! data (`if`/`then`/`else`, `dependentRequired`, `dependentSchemas` and
//! lifted `conditions`). The calculator rewrites them away in a bounded
//! fixpoint loop, because a selected branch may bring new ones along.

use std::collections::HashMap;

use indexmap::IndexSet;
use log::{debug, warn};
use serde_json::Value;

use crate::node::{Condition, SchemaNode, CONDITIONS};
use crate::resolver::Resolver;
use crate::types::{data_at, Path, DEFAULT_MAX_ITERATIONS};
use crate::validator::ValidationService;

/// The schema that applies to `data` at `path`. Built per query.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSchema {
    pub schema: SchemaNode,
    /// `None` when nothing exists at `path` yet.
    pub data: Option<Value>,
    pub path: Path,
}

/// User-chosen `oneOf` branches, keyed by the data path they apply at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selections(HashMap<Path, usize>);

impl Selections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select branch `index` of the `oneOf` at `path`.
    pub fn select(mut self, path: Path, index: usize) -> Self {
        self.0.insert(path, index);
        self
    }

    pub fn get(&self, path: &Path) -> Option<usize> {
        self.0.get(path).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Path, usize)> for Selections {
    fn from_iter<I: IntoIterator<Item = (Path, usize)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Resolves data-dependent keywords using a [`ValidationService`].
pub struct EffectiveSchemaCalculator<'a> {
    resolver: Resolver<'a>,
    validator: &'a dyn ValidationService,
    max_iterations: usize,
}

impl<'a> EffectiveSchemaCalculator<'a> {
    pub fn new(resolver: Resolver<'a>, validator: &'a dyn ValidationService) -> Self {
        Self {
            resolver,
            validator,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Compute the effective schema of `schema` for `data`.
    ///
    /// Stops silently at the iteration cap, returning the state reached.
    pub fn calculate(&self, schema: &SchemaNode, data: Option<&Value>, path: &Path) -> EffectiveSchema {
        let location = path.to_string();
        let mut current = schema.clone();
        let mut iteration = 0;

        while current.is_data_dependent() && iteration < self.max_iterations {
            if current.has("if") {
                current = self.resolve_if_then_else(&current, data, &location);
            }
            if current.has("dependentRequired") {
                current = resolve_dependent_required(&current, data);
            }
            if current.has("dependentSchemas") {
                current = self.resolve_dependent_schemas(&current, data, &location);
            }
            if current.has(CONDITIONS) {
                current = self.resolve_conditions(&current, data, &location);
            }
            iteration += 1;
        }

        if current.is_data_dependent() {
            warn!(
                "{}: still data dependent after {} iterations, giving up",
                display(&location),
                iteration
            );
        } else if iteration > 0 {
            debug!("{}: effective after {} iteration(s)", display(&location), iteration);
        }

        EffectiveSchema {
            schema: current,
            data: data.cloned(),
            path: path.clone(),
        }
    }

    /// Walk from `root` down to `path`, recomputing the effective schema at
    /// every step against the data found there.
    ///
    /// A child that has a `oneOf` and an entry in `selections` continues with
    /// the selected branch merged into the child.
    pub fn at(
        &self,
        root: &SchemaNode,
        data: &Value,
        path: &Path,
        selections: &Selections,
    ) -> EffectiveSchema {
        let mut current_path = Path::root();
        let root = self.apply_selection(root, &current_path, selections);
        let mut effective = self.calculate(&root, Some(data), &current_path);

        for segment in path.segments() {
            current_path = current_path.child(segment.clone());
            let location = current_path.to_string();
            let child = effective
                .schema
                .sub_schema(segment)
                .unwrap_or(SchemaNode::Bool(false));
            let child = self.resolver.resolve_lenient(&child, &location);
            let child = self.apply_selection(&child, &current_path, selections);
            effective = self.calculate(&child, data_at(&current_path, data), &current_path);
        }
        effective
    }

    fn apply_selection(&self, schema: &SchemaNode, path: &Path, selections: &Selections) -> SchemaNode {
        let Some(index) = selections.get(path) else {
            return schema.clone();
        };
        let branches = schema.one_of();
        match branches.get(index) {
            Some(branch) => {
                let selected = SchemaNode::all_of(vec![schema.without(&["oneOf"]), branch.clone()]);
                self.resolver.resolve_lenient(&selected, &path.to_string())
            }
            None => {
                warn!(
                    "{}: oneOf selection {} is out of range ({} branches)",
                    display(&path.to_string()),
                    index,
                    branches.len()
                );
                schema.clone()
            }
        }
    }

    fn if_satisfied(&self, if_schema: &SchemaNode, data: Option<&Value>, location: &str) -> bool {
        let Some(data) = data else {
            return false;
        };
        match self.validator.validate(if_schema, data) {
            Ok(valid) => valid,
            Err(e) => {
                warn!("{}: treating `if` as not satisfied: {}", display(location), e);
                false
            }
        }
    }

    fn selected_branch(&self, condition: &Condition, data: Option<&Value>, location: &str) -> SchemaNode {
        let branch = if self.if_satisfied(&condition.if_schema, data, location) {
            &condition.then_schema
        } else {
            &condition.else_schema
        };
        branch.clone().unwrap_or_default()
    }

    fn resolve_if_then_else(&self, schema: &SchemaNode, data: Option<&Value>, location: &str) -> SchemaNode {
        let Some(if_schema) = schema.if_schema() else {
            return schema.clone();
        };
        let condition = Condition {
            if_schema,
            then_schema: schema.then_schema(),
            else_schema: schema.else_schema(),
        };
        let branch = self.selected_branch(&condition, data, location);
        let base = schema.without(&["if", "then", "else"]);
        self.rebuild(vec![base, branch], location)
    }

    fn resolve_dependent_schemas(&self, schema: &SchemaNode, data: Option<&Value>, location: &str) -> SchemaNode {
        let mut members = vec![schema.without(&["dependentSchemas"])];
        members.extend(
            schema
                .dependent_schemas()
                .into_iter()
                .filter(|(key, _)| has_key(data, key))
                .map(|(_, dependent)| dependent),
        );
        self.rebuild(members, location)
    }

    fn resolve_conditions(&self, schema: &SchemaNode, data: Option<&Value>, location: &str) -> SchemaNode {
        let mut members = vec![schema.without(&[CONDITIONS])];
        members.extend(
            schema
                .conditions()
                .iter()
                .map(|condition| self.selected_branch(condition, data, location)),
        );
        self.rebuild(members, location)
    }

    fn rebuild(&self, members: Vec<SchemaNode>, location: &str) -> SchemaNode {
        self.resolver
            .resolve_lenient(&SchemaNode::all_of(members), location)
    }
}

/// Compute the effective schema of `schema` for `data` at `path`.
pub fn calculate_effective_schema(
    resolver: Resolver<'_>,
    validator: &dyn ValidationService,
    schema: &SchemaNode,
    data: Option<&Value>,
    path: &Path,
) -> EffectiveSchema {
    EffectiveSchemaCalculator::new(resolver, validator).calculate(schema, data, path)
}

fn resolve_dependent_required(schema: &SchemaNode, data: Option<&Value>) -> SchemaNode {
    let mut required: IndexSet<String> = schema.required().into_iter().collect();
    for (key, names) in schema.dependent_required() {
        if has_key(data, &key) {
            required.extend(names);
        }
    }
    let base = schema.without(&["dependentRequired"]);
    if required.is_empty() {
        return base;
    }
    base.with(
        "required",
        Value::Array(required.into_iter().map(Value::String).collect()),
    )
}

fn has_key(data: Option<&Value>, key: &str) -> bool {
    matches!(data, Some(Value::Object(map)) if map.contains_key(key))
}

fn display(location: &str) -> &str {
    if location.is_empty() {
        "/"
    } else {
        location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResolutionContext;
    use crate::error::ValidateError;
    use crate::types::SessionMode;
    use crate::validator::JsonSchemaValidationService;
    use serde_json::json;
    use std::sync::Arc;

    fn node(value: Value) -> SchemaNode {
        SchemaNode::try_from(value).unwrap()
    }

    fn effective(root: Value, data: Value) -> SchemaNode {
        let ctx = ResolutionContext::new(SessionMode::FileEditor, Arc::new(root.clone()));
        let validator = JsonSchemaValidationService::for_context(&ctx);
        let resolver = Resolver::new(&ctx);
        let schema = resolver.resolve_lenient(&node(root), "");
        calculate_effective_schema(resolver, &validator, &schema, Some(&data), &Path::root()).schema
    }

    struct FailingValidator;

    impl ValidationService for FailingValidator {
        fn validate(&self, _: &SchemaNode, _: &Value) -> Result<bool, ValidateError> {
            Err(ValidateError::Compile {
                message: "broken".into(),
            })
        }
    }

    struct AlwaysValid;

    impl ValidationService for AlwaysValid {
        fn validate(&self, _: &SchemaNode, _: &Value) -> Result<bool, ValidateError> {
            Ok(true)
        }
    }

    #[test]
    fn if_then_selects_then() {
        let schema = json!({"if": {"required": ["flag"]}, "then": {"required": ["extra"]}});
        assert!(effective(schema.clone(), json!({"flag": true})).is_required("extra"));
        assert!(!effective(schema, json!({})).is_required("extra"));
    }

    #[test]
    fn else_branch_and_missing_branch() {
        let schema = json!({
            "type": "object",
            "if": {"required": ["a"]},
            "else": {"required": ["b"]}
        });
        let selected = effective(schema.clone(), json!({}));
        assert!(selected.is_required("b"));
        assert!(!selected.has("if"));

        let selected = effective(schema, json!({"a": 1}));
        assert_eq!(selected, node(json!({"type": "object"})));
    }

    #[test]
    fn dependent_required_adds_names() {
        let schema = json!({"required": ["name"], "dependentRequired": {"city": ["zip"]}});
        let with_city = effective(schema.clone(), json!({"city": "X"}));
        assert_eq!(with_city.required(), vec!["name", "zip"]);
        assert!(!with_city.has("dependentRequired"));

        let without = effective(schema, json!({}));
        assert_eq!(without.required(), vec!["name"]);
    }

    #[test]
    fn dependent_schemas_merge_when_key_present() {
        let schema = json!({
            "properties": {"card": {"type": "string"}},
            "dependentSchemas": {"card": {"required": ["billing"]}}
        });
        assert!(effective(schema.clone(), json!({"card": "1"})).is_required("billing"));
        assert!(!effective(schema, json!({})).is_required("billing"));
    }

    #[test]
    fn lifted_conditions_resolve_independently() {
        let schema = json!({
            "allOf": [
                {"if": {"required": ["a"]}, "then": {"required": ["x"]}},
                {"if": {"required": ["b"]}, "then": {"required": ["y"]}, "else": {"required": ["z"]}}
            ]
        });
        let result = effective(schema, json!({"a": 1}));
        assert!(result.is_required("x"));
        assert!(result.is_required("z"));
        assert!(!result.is_required("y"));
        assert!(!result.is_data_dependent());
    }

    #[test]
    fn nested_conditionals_resolve_in_later_iterations() {
        let schema = json!({
            "if": {"required": ["a"]},
            "then": {
                "if": {"required": ["b"]},
                "then": {"required": ["c"]}
            }
        });
        let result = effective(schema, json!({"a": 1, "b": 2}));
        assert!(result.is_required("c"));
        assert!(!result.is_data_dependent());
    }

    #[test]
    fn validator_failure_selects_else() {
        let ctx = ResolutionContext::new(SessionMode::FileEditor, Arc::new(json!({})));
        let schema = node(json!({"if": true, "then": {"title": "then"}, "else": {"title": "else"}}));
        let result = calculate_effective_schema(
            Resolver::new(&ctx),
            &FailingValidator,
            &schema,
            Some(&json!({})),
            &Path::root(),
        );
        assert_eq!(result.schema.title(), Some("else"));
    }

    #[test]
    fn missing_data_never_satisfies_if() {
        let ctx = ResolutionContext::new(SessionMode::FileEditor, Arc::new(json!({})));
        let schema = node(json!({"if": true, "then": {"title": "then"}}));
        let result = calculate_effective_schema(Resolver::new(&ctx), &AlwaysValid, &schema, None, &Path::root());
        assert_eq!(result.schema, node(json!({})));
        assert_eq!(result.data, None);
    }

    #[test]
    fn iteration_cap_exits_quietly() {
        let ctx = ResolutionContext::new(SessionMode::FileEditor, Arc::new(json!({})));
        // Each selected branch brings back another conditional.
        let mut schema = json!({"title": "leaf"});
        for _ in 0..5 {
            schema = json!({"if": true, "then": schema});
        }
        let calculator = EffectiveSchemaCalculator::new(Resolver::new(&ctx), &AlwaysValid).max_iterations(2);
        let result = calculator.calculate(&node(schema), Some(&json!({})), &Path::root());
        assert!(result.schema.is_data_dependent());
    }

    #[test]
    fn path_walking_follows_selected_branches() {
        let root = json!({
            "properties": {
                "pet": {
                    "type": "object",
                    "oneOf": [
                        {"properties": {"bark": {"type": "boolean"}}},
                        {"properties": {"meow": {"type": "string"}}}
                    ]
                }
            }
        });
        let ctx = ResolutionContext::new(SessionMode::FileEditor, Arc::new(root.clone()));
        let validator = JsonSchemaValidationService::for_context(&ctx);
        let resolver = Resolver::new(&ctx);
        let preprocessed = resolver.resolve_lenient(&node(root), "");
        let calculator = EffectiveSchemaCalculator::new(resolver, &validator);
        let data = json!({"pet": {"meow": "loud"}});

        let selections = Selections::new().select(Path::parse("/pet"), 1);
        let meow = calculator.at(&preprocessed, &data, &Path::parse("/pet/meow"), &selections);
        assert_eq!(meow.schema.get("type"), Some(&json!("string")));
        assert_eq!(meow.data, Some(json!("loud")));
        assert_eq!(meow.path, Path::parse("/pet/meow"));

        let unselected = calculator.at(&preprocessed, &data, &Path::parse("/pet"), &Selections::new());
        assert_eq!(unselected.schema.one_of().len(), 2);
    }

    #[test]
    fn path_walking_sees_parent_conditionals() {
        let root = json!({
            "if": {"properties": {"kind": {"const": "num"}}},
            "then": {"properties": {"value": {"type": "number"}}},
            "else": {"properties": {"value": {"type": "string"}}}
        });
        let ctx = ResolutionContext::new(SessionMode::FileEditor, Arc::new(root.clone()));
        let validator = JsonSchemaValidationService::for_context(&ctx);
        let resolver = Resolver::new(&ctx);
        let preprocessed = resolver.resolve_lenient(&node(root), "");
        let calculator = EffectiveSchemaCalculator::new(resolver, &validator);
        let path = Path::parse("/value");

        let num = calculator.at(&preprocessed, &json!({"kind": "num"}), &path, &Selections::new());
        assert_eq!(num.schema.get("type"), Some(&json!("number")));

        let text = calculator.at(&preprocessed, &json!({"kind": "text"}), &path, &Selections::new());
        assert_eq!(text.schema.get("type"), Some(&json!("string")));
        assert_eq!(text.data, None);
    }
}
