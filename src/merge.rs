//! Structural `allOf` merging and schema compatibility checks.
//!
//! Merging never fails. Keywords with a known conjunction rule are combined
//! into one value; any other keyword that differs between inputs keeps its
//! first value and the remaining values are carried in an unmerged `allOf`,
//! so no constraint is ever dropped.
//!
//! | Keyword | Rule |
//! |---------|------|
//! | `type` | intersection (`integer` ∩ `number` = `integer`) |
//! | `const`, `enum` | intersection, filtered by sibling constraints |
//! | `required` | set union |
//! | `minimum`, `minLength`, ... | largest bound |
//! | `maximum`, `maxLength`, ... | smallest bound |
//! | `properties`, `patternProperties`, `dependentSchemas` | union, colliding keys merged |
//! | `items`, `additionalProperties`, ... | merged recursively |
//! | `dependentRequired` | per-key union |
//! | `allOf`, `conditions` | concatenation |
//! | `if`/`then`/`else` | first triple kept, others moved to `conditions` |
//! | annotations (`title`, `description`, ...) | first value wins |

use indexmap::IndexSet;
use regex::Regex;
use serde_json::{Map, Value};

use crate::node::{SchemaNode, CONDITIONS};
use crate::types::json_type_name;

type Keywords = Map<String, Value>;

const LOWER_BOUNDS: &[&str] = &[
    "minimum",
    "exclusiveMinimum",
    "minLength",
    "minItems",
    "minProperties",
    "minContains",
];

const UPPER_BOUNDS: &[&str] = &[
    "maximum",
    "exclusiveMaximum",
    "maxLength",
    "maxItems",
    "maxProperties",
    "maxContains",
];

const SUBSCHEMA_KEYWORDS: &[&str] = &[
    "items",
    "additionalItems",
    "additionalProperties",
    "propertyNames",
    "unevaluatedItems",
    "unevaluatedProperties",
    "contentSchema",
];

const ANNOTATIONS: &[&str] = &[
    "title",
    "description",
    "$comment",
    "default",
    "examples",
    "deprecated",
    "readOnly",
    "writeOnly",
    "format",
    "$id",
    "$schema",
    "$anchor",
    "contentEncoding",
    "contentMediaType",
];

const CONDITIONAL: &[&str] = &["if", "then", "else"];

enum KeywordMerge {
    Merged(Value),
    Unmerged,
}

/// Merge a list of schemas into one schema equivalent to their conjunction.
pub fn merge(schemas: &[SchemaNode]) -> SchemaNode {
    if schemas.iter().any(SchemaNode::is_always_false) {
        return SchemaNode::Bool(false);
    }
    let objects: Vec<&Keywords> = schemas.iter().filter_map(SchemaNode::as_object).collect();
    if objects.is_empty() {
        return SchemaNode::Bool(true);
    }
    if has_conflict(&objects) {
        return SchemaNode::Bool(false);
    }

    let mut merged = Keywords::new();
    let mut residuals: Vec<Keywords> = vec![Keywords::new(); objects.len()];
    let mut extra_conditions: Vec<Value> = Vec::new();

    merge_conditionals(&objects, &mut merged, &mut extra_conditions);

    for key in ordered_keys(&objects) {
        if CONDITIONAL.contains(&key.as_str()) {
            continue;
        }
        if key == "properties" {
            merged.insert(key, Value::Object(merge_properties(&objects)));
            continue;
        }

        let distinct = distinct_values(&objects, &key);
        if distinct.len() == 1 {
            merged.insert(key, distinct[0].1.clone());
            continue;
        }

        match merge_keyword(&key, &distinct) {
            KeywordMerge::Merged(value) => {
                merged.insert(key, value);
            }
            KeywordMerge::Unmerged => {
                merged.insert(key.clone(), distinct[0].1.clone());
                for (index, value) in &distinct[1..] {
                    residuals[*index].insert(key.clone(), (*value).clone());
                }
            }
        }
    }

    if merged.contains_key("enum") {
        if let Some(candidates) = candidate_values(&objects, intersect_types(&objects).as_deref())
        {
            merged.insert("enum".into(), Value::Array(candidates));
        }
    }

    if !extra_conditions.is_empty() {
        append_array(&mut merged, CONDITIONS, extra_conditions);
    }
    let residuals: Vec<Value> = residuals
        .into_iter()
        .filter(|r| !r.is_empty())
        .map(Value::Object)
        .collect();
    if !residuals.is_empty() {
        append_array(&mut merged, "allOf", residuals);
    }

    SchemaNode::Object(merged)
}

/// Merge two schemas. Shorthand for `merge(&[a, b])`.
pub fn merge_pair(a: &SchemaNode, b: &SchemaNode) -> SchemaNode {
    merge(&[a.clone(), b.clone()])
}

/// Merge a node's own `allOf` members into the node.
pub fn merge_all_of(node: &SchemaNode) -> SchemaNode {
    let members = node.all_of_members();
    if members.is_empty() {
        return node.clone();
    }
    let mut schemas = Vec::with_capacity(members.len() + 1);
    schemas.push(node.without(&["allOf"]));
    schemas.extend(members);
    merge(&schemas)
}

/// Cheap check whether two schemas can be satisfied together.
///
/// Returns `false` only when no instance can satisfy both, and always when
/// [`merge`] would produce `false`. A `true` answer does not guarantee that
/// the conjunction is satisfiable.
pub fn are_schemas_compatible(a: &SchemaNode, b: &SchemaNode) -> bool {
    let (x, y) = match (a, b) {
        (SchemaNode::Bool(false), _) | (_, SchemaNode::Bool(false)) => return false,
        (SchemaNode::Bool(true), _) | (_, SchemaNode::Bool(true)) => return true,
        (SchemaNode::Object(x), SchemaNode::Object(y)) => (x, y),
    };
    let objects = [x, y];
    if has_conflict(&objects) {
        return false;
    }

    // Required properties only bind when the instance must be an object.
    let object_only = matches!(
        intersect_types(&objects).as_deref(),
        Some([only]) if only == "object"
    );
    if object_only {
        let left = SchemaNode::Object(x.clone());
        let right = SchemaNode::Object(y.clone());
        let required: IndexSet<String> = left
            .required()
            .into_iter()
            .chain(right.required())
            .collect();
        for key in &required {
            if let (Some(pa), Some(pb)) = (left.property(key), right.property(key)) {
                if !are_schemas_compatible(&pa, &pb) {
                    return false;
                }
            }
            if matches!(left.property(key), Some(SchemaNode::Bool(false)))
                || matches!(right.property(key), Some(SchemaNode::Bool(false)))
            {
                return false;
            }
        }
    }
    true
}

// --- conflict detection ---

fn has_conflict(objects: &[&Keywords]) -> bool {
    let types = intersect_types(objects);
    if matches!(&types, Some(t) if t.is_empty()) {
        return true;
    }
    matches!(candidate_values(objects, types.as_deref()), Some(c) if c.is_empty())
}

fn declared_types(object: &Keywords) -> Option<Vec<String>> {
    type_list(object.get("type")?)
}

fn type_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(arr) => Some(
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        ),
        _ => None,
    }
}

/// Intersection of all declared types, `None` when no input restricts the type.
fn intersect_types(objects: &[&Keywords]) -> Option<Vec<String>> {
    let mut acc: Option<Vec<String>> = None;
    for object in objects {
        let Some(types) = declared_types(object) else {
            continue;
        };
        acc = Some(match acc {
            None => types,
            Some(prev) => intersect_two(&prev, &types),
        });
    }
    acc
}

fn intersect_two(a: &[String], b: &[String]) -> Vec<String> {
    let has = |list: &[String], name: &str| list.iter().any(|t| t == name);
    let mut out: IndexSet<String> = IndexSet::new();
    for t in a {
        if has(b, t) {
            out.insert(t.clone());
        } else if (t == "integer" && has(b, "number")) || (t == "number" && has(b, "integer")) {
            out.insert("integer".to_string());
        }
    }
    out.into_iter().collect()
}

/// Values allowed by `const`/`enum`, filtered by every sibling constraint.
/// `None` when no input enumerates its values.
fn candidate_values(objects: &[&Keywords], types: Option<&[String]>) -> Option<Vec<Value>> {
    let mut candidates: Option<Vec<Value>> = None;
    for object in objects {
        let mut allowed: Option<Vec<Value>> = None;
        if let Some(value) = object.get("const") {
            allowed = Some(vec![value.clone()]);
        }
        if let Some(Value::Array(values)) = object.get("enum") {
            allowed = Some(match allowed {
                None => values.clone(),
                Some(prev) => prev.into_iter().filter(|v| values.contains(v)).collect(),
            });
        }
        if let Some(allowed) = allowed {
            candidates = Some(match candidates {
                None => allowed,
                Some(prev) => prev.into_iter().filter(|v| allowed.contains(v)).collect(),
            });
        }
    }
    candidates.map(|values| {
        values
            .into_iter()
            .filter(|v| types.map_or(true, |t| t.iter().any(|name| value_has_type(v, name))))
            .filter(|v| objects.iter().all(|o| value_satisfies_local(v, o)))
            .collect()
    })
}

fn value_has_type(value: &Value, name: &str) -> bool {
    match name {
        "integer" => match value {
            Value::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
            }
            _ => false,
        },
        other => json_type_name(value) == other,
    }
}

/// Whether `value` satisfies the non-applicator assertions of one schema.
fn value_satisfies_local(value: &Value, object: &Keywords) -> bool {
    if let Some(types) = declared_types(object) {
        if !types.iter().any(|t| value_has_type(value, t)) {
            return false;
        }
    }
    let num = |key: &str| object.get(key).and_then(Value::as_f64);
    match value {
        Value::String(s) => {
            let len = s.chars().count() as f64;
            if num("minLength").map_or(false, |min| len < min)
                || num("maxLength").map_or(false, |max| len > max)
            {
                return false;
            }
            if let Some(pattern) = object.get("pattern").and_then(Value::as_str) {
                if let Ok(re) = Regex::new(pattern) {
                    if !re.is_match(s) {
                        return false;
                    }
                }
            }
            true
        }
        Value::Number(n) => {
            let Some(x) = n.as_f64() else {
                return true;
            };
            if num("minimum").map_or(false, |min| x < min)
                || num("maximum").map_or(false, |max| x > max)
                || num("exclusiveMinimum").map_or(false, |min| x <= min)
                || num("exclusiveMaximum").map_or(false, |max| x >= max)
            {
                return false;
            }
            match num("multipleOf") {
                Some(m) if m > 0.0 => ((x / m) - (x / m).round()).abs() < 1e-9,
                _ => true,
            }
        }
        Value::Array(items) => {
            let len = items.len() as f64;
            !(num("minItems").map_or(false, |min| len < min)
                || num("maxItems").map_or(false, |max| len > max))
        }
        Value::Object(map) => {
            let len = map.len() as f64;
            if num("minProperties").map_or(false, |min| len < min)
                || num("maxProperties").map_or(false, |max| len > max)
            {
                return false;
            }
            match object.get("required") {
                Some(Value::Array(required)) => required
                    .iter()
                    .filter_map(Value::as_str)
                    .all(|key| map.contains_key(key)),
                _ => true,
            }
        }
        _ => true,
    }
}

// --- keyword merging ---

fn ordered_keys(objects: &[&Keywords]) -> Vec<String> {
    let keys: IndexSet<&String> = objects.iter().flat_map(|o| o.keys()).collect();
    keys.into_iter().cloned().collect()
}

fn distinct_values<'a>(objects: &[&'a Keywords], key: &str) -> Vec<(usize, &'a Value)> {
    let mut distinct: Vec<(usize, &'a Value)> = Vec::new();
    for (index, object) in objects.iter().enumerate() {
        if let Some(value) = object.get(key) {
            if !distinct.iter().any(|(_, v)| *v == value) {
                distinct.push((index, value));
            }
        }
    }
    distinct
}

fn merge_keyword(key: &str, distinct: &[(usize, &Value)]) -> KeywordMerge {
    let values: Vec<&Value> = distinct.iter().map(|(_, v)| *v).collect();
    match key {
        "type" => {
            let lists: Option<Vec<Vec<String>>> = values.iter().map(|v| type_list(v)).collect();
            let Some(lists) = lists else {
                return KeywordMerge::Unmerged;
            };
            let mut acc = lists[0].clone();
            for list in &lists[1..] {
                acc = intersect_two(&acc, list);
            }
            KeywordMerge::Merged(type_value(acc))
        }
        "enum" => {
            let mut acc: Vec<Value> = match values[0] {
                Value::Array(arr) => arr.clone(),
                _ => return KeywordMerge::Unmerged,
            };
            for value in &values[1..] {
                let Value::Array(arr) = value else {
                    return KeywordMerge::Unmerged;
                };
                acc.retain(|v| arr.contains(v));
            }
            KeywordMerge::Merged(Value::Array(acc))
        }
        "required" => {
            let union: IndexSet<String> = values
                .iter()
                .filter_map(|v| v.as_array())
                .flatten()
                .filter_map(|v| v.as_str().map(String::from))
                .collect();
            KeywordMerge::Merged(Value::Array(union.into_iter().map(Value::String).collect()))
        }
        k if LOWER_BOUNDS.contains(&k) => tightest(&values, |a, b| a > b),
        k if UPPER_BOUNDS.contains(&k) => tightest(&values, |a, b| a < b),
        "multipleOf" => merge_multiple_of(&values),
        "uniqueItems" => KeywordMerge::Merged(Value::Bool(
            values.iter().any(|v| v.as_bool().unwrap_or(false)),
        )),
        "patternProperties" | "dependentSchemas" => match merge_schema_records(&values) {
            Some(record) => KeywordMerge::Merged(Value::Object(record)),
            None => KeywordMerge::Unmerged,
        },
        "$defs" | "definitions" => {
            let mut record = Keywords::new();
            for value in &values {
                let Value::Object(map) = value else {
                    return KeywordMerge::Unmerged;
                };
                for (name, def) in map {
                    record.entry(name.clone()).or_insert_with(|| def.clone());
                }
            }
            KeywordMerge::Merged(Value::Object(record))
        }
        k if SUBSCHEMA_KEYWORDS.contains(&k) => {
            if values.iter().any(|v| v.is_array()) {
                return KeywordMerge::Unmerged;
            }
            let nodes: Vec<SchemaNode> = values.iter().map(|v| SchemaNode::lenient(v)).collect();
            KeywordMerge::Merged(merge(&nodes).into_value())
        }
        "dependentRequired" => {
            let mut record: indexmap::IndexMap<String, IndexSet<String>> = Default::default();
            for value in &values {
                let Value::Object(map) = value else {
                    return KeywordMerge::Unmerged;
                };
                for (name, deps) in map {
                    let entry = record.entry(name.clone()).or_default();
                    if let Value::Array(deps) = deps {
                        entry.extend(deps.iter().filter_map(|d| d.as_str().map(String::from)));
                    }
                }
            }
            KeywordMerge::Merged(Value::Object(
                record
                    .into_iter()
                    .map(|(k, deps)| {
                        (k, Value::Array(deps.into_iter().map(Value::String).collect()))
                    })
                    .collect(),
            ))
        }
        "allOf" | CONDITIONS => {
            let mut all = Vec::new();
            for value in &values {
                let Value::Array(arr) = value else {
                    return KeywordMerge::Unmerged;
                };
                all.extend(arr.iter().cloned());
            }
            KeywordMerge::Merged(Value::Array(all))
        }
        k if ANNOTATIONS.contains(&k) => KeywordMerge::Merged(values[0].clone()),
        _ => KeywordMerge::Unmerged,
    }
}

fn type_value(mut types: Vec<String>) -> Value {
    if types.len() == 1 {
        Value::String(types.remove(0))
    } else {
        Value::Array(types.into_iter().map(Value::String).collect())
    }
}

/// Pick the bound for which `better(candidate, current)` holds against all others.
fn tightest(values: &[&Value], better: impl Fn(f64, f64) -> bool) -> KeywordMerge {
    let mut best: Option<(f64, &Value)> = None;
    for value in values {
        let Some(x) = value.as_f64() else {
            // draft-4 boolean exclusive bounds and other oddities
            return KeywordMerge::Unmerged;
        };
        best = match best {
            Some((current, _)) if !better(x, current) => best,
            _ => Some((x, *value)),
        };
    }
    match best {
        Some((_, value)) => KeywordMerge::Merged(value.clone()),
        None => KeywordMerge::Unmerged,
    }
}

fn merge_multiple_of(values: &[&Value]) -> KeywordMerge {
    let numbers: Option<Vec<f64>> = values.iter().map(|v| v.as_f64()).collect();
    let Some(numbers) = numbers else {
        return KeywordMerge::Unmerged;
    };
    let Some((index, largest)) = numbers
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
    else {
        return KeywordMerge::Unmerged;
    };
    let divides_all = numbers
        .iter()
        .all(|&n| n > 0.0 && ((largest / n) - (largest / n).round()).abs() < 1e-9);
    if divides_all {
        KeywordMerge::Merged(values[index].clone())
    } else {
        KeywordMerge::Unmerged
    }
}

fn merge_schema_records(values: &[&Value]) -> Option<Keywords> {
    let mut parts: indexmap::IndexMap<String, Vec<SchemaNode>> = Default::default();
    for value in values {
        let Value::Object(map) = value else {
            return None;
        };
        for (name, schema) in map {
            parts
                .entry(name.clone())
                .or_default()
                .push(SchemaNode::lenient(schema));
        }
    }
    Some(
        parts
            .into_iter()
            .map(|(name, nodes)| (name, merge_or_single(nodes)))
            .collect(),
    )
}

/// Merge `properties`, constraining each property by the `patternProperties`
/// or `additionalProperties` of inputs that do not declare it.
fn merge_properties(objects: &[&Keywords]) -> Keywords {
    let nodes: Vec<SchemaNode> = objects
        .iter()
        .map(|o| SchemaNode::Object((*o).clone()))
        .collect();
    let keys: IndexSet<String> = nodes.iter().flat_map(|n| n.properties().into_keys()).collect();

    let mut result = Keywords::new();
    for key in keys {
        let mut parts = Vec::new();
        for node in &nodes {
            if let Some(prop) = node.property(&key) {
                parts.push(prop);
                continue;
            }
            let matched: Vec<SchemaNode> = node
                .pattern_properties()
                .into_iter()
                .filter(|(pattern, _)| {
                    Regex::new(pattern)
                        .map(|re| re.is_match(&key))
                        .unwrap_or(false)
                })
                .map(|(_, schema)| schema)
                .collect();
            if !matched.is_empty() {
                parts.extend(matched);
            } else if node.has("additionalProperties") {
                parts.push(node.additional_properties());
            }
        }
        result.insert(key, merge_or_single(parts));
    }
    result
}

fn merge_or_single(mut nodes: Vec<SchemaNode>) -> Value {
    if nodes.len() == 1 {
        nodes.remove(0).into_value()
    } else {
        merge(&nodes).into_value()
    }
}

/// Copy the first `if`/`then`/`else` triple; further distinct triples become conditions.
fn merge_conditionals(
    objects: &[&Keywords],
    merged: &mut Keywords,
    extra_conditions: &mut Vec<Value>,
) {
    let mut triples: Vec<Keywords> = Vec::new();
    for object in objects {
        if !object.contains_key("if") {
            continue;
        }
        let triple: Keywords = CONDITIONAL
            .iter()
            .filter_map(|k| object.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect();
        if !triples.contains(&triple) {
            triples.push(triple);
        }
    }
    let mut iter = triples.into_iter();
    if let Some(first) = iter.next() {
        merged.extend(first);
    }
    extra_conditions.extend(iter.map(Value::Object));
}

fn append_array(map: &mut Keywords, key: &str, values: Vec<Value>) {
    match map.get_mut(key) {
        Some(Value::Array(existing)) => existing.extend(values),
        _ => {
            map.insert(key.to_string(), Value::Array(values));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: Value) -> SchemaNode {
        SchemaNode::try_from(value).unwrap()
    }

    fn merged(values: Vec<Value>) -> SchemaNode {
        merge(&values.into_iter().map(node).collect::<Vec<_>>())
    }

    #[test]
    fn false_poisons_and_true_is_neutral() {
        assert_eq!(merged(vec![json!(true), json!(false)]), SchemaNode::Bool(false));
        assert_eq!(merged(vec![json!(true), json!(true)]), SchemaNode::Bool(true));
        assert_eq!(
            merged(vec![json!(true), json!({"type": "string"})]),
            node(json!({"type": "string"}))
        );
    }

    #[test]
    fn bounds_take_tightest() {
        let result = merged(vec![
            json!({"minimum": 5, "maxLength": 10}),
            json!({"minimum": 10, "maxLength": 3}),
        ]);
        assert_eq!(result.get("minimum"), Some(&json!(10)));
        assert_eq!(result.get("maxLength"), Some(&json!(3)));
    }

    #[test]
    fn type_intersection() {
        assert_eq!(
            merged(vec![json!({"type": "string"}), json!({"type": "number"})]),
            SchemaNode::Bool(false)
        );
        let result = merged(vec![
            json!({"type": ["number", "string"]}),
            json!({"type": ["integer", "null"]}),
        ]);
        assert_eq!(result.get("type"), Some(&json!("integer")));

        let result = merged(vec![json!({}), json!({"type": "object"})]);
        assert_eq!(result.get("type"), Some(&json!("object")));
    }

    #[test]
    fn required_is_a_set_union() {
        let result = merged(vec![
            json!({"required": ["a", "b"]}),
            json!({"required": ["b", "c"]}),
        ]);
        assert_eq!(result.required(), vec!["a", "b", "c"]);
    }

    #[test]
    fn const_and_enum() {
        assert_eq!(
            merged(vec![json!({"const": 1}), json!({"const": 2})]),
            SchemaNode::Bool(false)
        );
        let result = merged(vec![
            json!({"enum": [1, 2, "a"]}),
            json!({"type": "integer"}),
        ]);
        assert_eq!(result.get("enum"), Some(&json!([1, 2])));
        assert_eq!(
            merged(vec![json!({"const": "x"}), json!({"pattern": "^y"})]),
            SchemaNode::Bool(false)
        );
    }

    #[test]
    fn colliding_properties_are_merged() {
        let result = merged(vec![
            json!({"properties": {"a": {"minimum": 1}, "b": {"type": "string"}}}),
            json!({"properties": {"a": {"minimum": 4, "type": "integer"}}}),
        ]);
        let a = result.property("a").unwrap();
        assert_eq!(a.get("minimum"), Some(&json!(4)));
        assert_eq!(a.get("type"), Some(&json!("integer")));
        assert!(result.property("b").is_some());
    }

    #[test]
    fn additional_properties_constrain_foreign_properties() {
        let result = merged(vec![
            json!({"properties": {"a": {}}, "additionalProperties": false}),
            json!({"properties": {"b": {"type": "string"}}}),
        ]);
        assert_eq!(result.property("b"), Some(SchemaNode::Bool(false)));
        assert_eq!(result.property("a"), Some(node(json!({}))));
    }

    #[test]
    fn unmergeable_keywords_stay_in_all_of() {
        let result = merged(vec![json!({"pattern": "^a"}), json!({"pattern": "b$"})]);
        assert_eq!(result.get("pattern"), Some(&json!("^a")));
        assert_eq!(result.get("allOf"), Some(&json!([{"pattern": "b$"}])));

        // merging the output again is stable
        assert_eq!(merge_all_of(&result), result);
    }

    #[test]
    fn second_conditional_becomes_condition() {
        let result = merged(vec![
            json!({"if": {"required": ["a"]}, "then": {"required": ["b"]}}),
            json!({"if": {"required": ["c"]}, "else": {"required": ["d"]}}),
        ]);
        assert_eq!(result.get("if"), Some(&json!({"required": ["a"]})));
        assert!(result.get("else").is_none());
        assert_eq!(
            result.get("conditions"),
            Some(&json!([{"if": {"required": ["c"]}, "else": {"required": ["d"]}}]))
        );
    }

    #[test]
    fn annotations_first_wins() {
        let result = merged(vec![json!({"title": "A"}), json!({"title": "B"})]);
        assert_eq!(result.title(), Some("A"));
        assert!(result.get("allOf").is_none());
    }

    #[test]
    fn compatibility() {
        let string = node(json!({"type": "string"}));
        assert!(!are_schemas_compatible(&string, &node(json!({"type": "number"}))));
        assert!(are_schemas_compatible(&string, &node(json!({"minLength": 1}))));
        assert!(!are_schemas_compatible(
            &node(json!({"const": "x"})),
            &node(json!({"pattern": "y"}))
        ));
        assert!(are_schemas_compatible(
            &node(json!({"const": "x"})),
            &node(json!({"minLength": 1}))
        ));
        assert!(!are_schemas_compatible(&SchemaNode::Bool(false), &string));
        assert!(are_schemas_compatible(&SchemaNode::Bool(true), &string));
    }

    #[test]
    fn compatibility_checks_required_properties_of_objects() {
        let a = node(json!({
            "type": "object",
            "required": ["kind"],
            "properties": {"kind": {"const": "a"}}
        }));
        let b = node(json!({"properties": {"kind": {"const": "b"}}}));
        assert!(!are_schemas_compatible(&a, &b));

        // without `type: object`, a non-object instance satisfies both
        let loose = node(json!({"required": ["kind"], "properties": {"kind": {"const": "a"}}}));
        assert!(are_schemas_compatible(&loose, &b));
    }

    #[test]
    fn incompatible_whenever_merge_is_false() {
        let pairs = [
            (json!({"type": "string"}), json!({"type": "boolean"})),
            (json!({"enum": [1, 2]}), json!({"enum": [3]})),
            (json!({"const": 3}), json!({"maximum": 2})),
            (json!({"const": "abc"}), json!({"maxLength": 2})),
        ];
        for (a, b) in pairs {
            let (a, b) = (node(a), node(b));
            assert_eq!(merge_pair(&a, &b), SchemaNode::Bool(false));
            assert!(!are_schemas_compatible(&a, &b));
        }
    }
}
