//! Schema value model.
//!
//! A [`SchemaNode`] is either a boolean schema or an object schema. The typed
//! getters never fail: a missing keyword yields an empty collection, `None`,
//! or the permissive `true` schema, depending on what the keyword means when
//! it is absent.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ResolveError;
use crate::types::{json_type_name, PathSegment};

/// Internal keyword carrying `if`/`then`/`else` triples lifted out of `allOf`.
pub const CONDITIONS: &str = "conditions";

/// A JSON Schema node: `true`, `false`, or a keyword map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaNode {
    Bool(bool),
    Object(Map<String, Value>),
}

impl Default for SchemaNode {
    fn default() -> Self {
        SchemaNode::Bool(true)
    }
}

impl TryFrom<Value> for SchemaNode {
    type Error = ResolveError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(SchemaNode::Bool(b)),
            Value::Object(map) => Ok(SchemaNode::Object(map)),
            other => Err(ResolveError::InvalidSchema {
                message: format!(
                    "expected boolean or object schema, got {}",
                    json_type_name(&other)
                ),
            }),
        }
    }
}

impl From<SchemaNode> for Value {
    fn from(node: SchemaNode) -> Self {
        node.into_value()
    }
}

/// An `if`/`then`/`else` triple. Absent branches are permissive.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub if_schema: SchemaNode,
    pub then_schema: Option<SchemaNode>,
    pub else_schema: Option<SchemaNode>,
}

impl Condition {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("if".into(), self.if_schema.to_value());
        if let Some(then_schema) = &self.then_schema {
            map.insert("then".into(), then_schema.to_value());
        }
        if let Some(else_schema) = &self.else_schema {
            map.insert("else".into(), else_schema.to_value());
        }
        Value::Object(map)
    }
}

impl SchemaNode {
    /// Interpret a JSON value as a schema, treating non-schema values as `true`.
    pub fn lenient(value: &Value) -> Self {
        match value {
            Value::Bool(b) => SchemaNode::Bool(*b),
            Value::Object(map) => SchemaNode::Object(map.clone()),
            _ => SchemaNode::Bool(true),
        }
    }

    /// Build `{"allOf": [...]}` from the given members.
    pub fn all_of(members: Vec<SchemaNode>) -> Self {
        SchemaNode::Object(Map::from_iter([(
            "allOf".to_string(),
            Value::Array(members.into_iter().map(SchemaNode::into_value).collect()),
        )]))
    }

    pub fn to_value(&self) -> Value {
        match self {
            SchemaNode::Bool(b) => Value::Bool(*b),
            SchemaNode::Object(map) => Value::Object(map.clone()),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            SchemaNode::Bool(b) => Value::Bool(b),
            SchemaNode::Object(map) => Value::Object(map),
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, SchemaNode::Bool(_))
    }

    /// The boolean value of a boolean schema; `None` for object schemas.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SchemaNode::Bool(b) => Some(*b),
            SchemaNode::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            SchemaNode::Object(map) => Some(map),
            SchemaNode::Bool(_) => None,
        }
    }

    /// True for `true` and for the empty object schema.
    pub fn is_always_true(&self) -> bool {
        match self {
            SchemaNode::Bool(b) => *b,
            SchemaNode::Object(map) => map.is_empty(),
        }
    }

    /// True only for the literal `false` schema; contradictions are not detected.
    pub fn is_always_false(&self) -> bool {
        matches!(self, SchemaNode::Bool(false))
    }

    pub fn get(&self, keyword: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(keyword))
    }

    pub fn has(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    /// A copy of this node without the given keywords.
    pub fn without(&self, keywords: &[&str]) -> SchemaNode {
        match self {
            SchemaNode::Bool(b) => SchemaNode::Bool(*b),
            SchemaNode::Object(map) => SchemaNode::Object(
                map.iter()
                    .filter(|(k, _)| !keywords.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
        }
    }

    /// A copy of this node with `keyword` set. `true` becomes an object schema;
    /// `false` stays `false`.
    pub fn with(&self, keyword: &str, value: Value) -> SchemaNode {
        match self {
            SchemaNode::Bool(false) => SchemaNode::Bool(false),
            SchemaNode::Bool(true) => {
                SchemaNode::Object(Map::from_iter([(keyword.to_string(), value)]))
            }
            SchemaNode::Object(map) => {
                let mut map = map.clone();
                map.insert(keyword.to_string(), value);
                SchemaNode::Object(map)
            }
        }
    }

    // --- typed keyword accessors ---

    /// Declared type names, or `None` when `type` is absent.
    pub fn type_names(&self) -> Option<Vec<String>> {
        match self.get("type")? {
            Value::String(s) => Some(vec![s.clone()]),
            Value::Array(arr) => Some(
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// True if `type` contains `name`, or if `type` is absent.
    pub fn has_type(&self, name: &str) -> bool {
        match self {
            SchemaNode::Bool(b) => *b,
            SchemaNode::Object(_) => match self.type_names() {
                None => true,
                Some(types) => types.iter().any(|t| t == name),
            },
        }
    }

    pub fn reference(&self) -> Option<&str> {
        self.get("$ref").and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.get("description").and_then(Value::as_str)
    }

    pub fn properties(&self) -> IndexMap<String, SchemaNode> {
        self.schema_record("properties")
    }

    pub fn property(&self, key: &str) -> Option<SchemaNode> {
        self.get("properties")
            .and_then(|props| props.get(key))
            .map(SchemaNode::lenient)
    }

    pub fn pattern_properties(&self) -> IndexMap<String, SchemaNode> {
        self.schema_record("patternProperties")
    }

    pub fn dependent_schemas(&self) -> IndexMap<String, SchemaNode> {
        self.schema_record("dependentSchemas")
    }

    pub fn additional_properties(&self) -> SchemaNode {
        self.get("additionalProperties")
            .map(SchemaNode::lenient)
            .unwrap_or_default()
    }

    /// The schema for array items. The legacy tuple form of `items` is
    /// exposed through [`SchemaNode::prefix_items`] instead.
    pub fn items(&self) -> SchemaNode {
        match self.get("items") {
            Some(Value::Array(_)) => self
                .get("additionalItems")
                .map(SchemaNode::lenient)
                .unwrap_or_default(),
            Some(value) => SchemaNode::lenient(value),
            None => SchemaNode::default(),
        }
    }

    pub fn prefix_items(&self) -> Vec<SchemaNode> {
        match (self.get("prefixItems"), self.get("items")) {
            (Some(Value::Array(arr)), _) | (None, Some(Value::Array(arr))) => {
                arr.iter().map(SchemaNode::lenient).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn property_names(&self) -> Option<SchemaNode> {
        self.get("propertyNames").map(SchemaNode::lenient)
    }

    pub fn contains(&self) -> Option<SchemaNode> {
        self.get("contains").map(SchemaNode::lenient)
    }

    pub fn not(&self) -> Option<SchemaNode> {
        self.get("not").map(SchemaNode::lenient)
    }

    pub fn unevaluated_properties(&self) -> Option<SchemaNode> {
        self.get("unevaluatedProperties").map(SchemaNode::lenient)
    }

    pub fn unevaluated_items(&self) -> Option<SchemaNode> {
        self.get("unevaluatedItems").map(SchemaNode::lenient)
    }

    pub fn all_of_members(&self) -> Vec<SchemaNode> {
        self.schema_array("allOf")
    }

    pub fn one_of(&self) -> Vec<SchemaNode> {
        self.schema_array("oneOf")
    }

    pub fn any_of(&self) -> Vec<SchemaNode> {
        self.schema_array("anyOf")
    }

    pub fn if_schema(&self) -> Option<SchemaNode> {
        self.get("if").map(SchemaNode::lenient)
    }

    pub fn then_schema(&self) -> Option<SchemaNode> {
        self.get("then").map(SchemaNode::lenient)
    }

    pub fn else_schema(&self) -> Option<SchemaNode> {
        self.get("else").map(SchemaNode::lenient)
    }

    pub fn required(&self) -> Vec<String> {
        string_list(self.get("required"))
    }

    pub fn is_required(&self, key: &str) -> bool {
        self.required().iter().any(|r| r == key)
    }

    pub fn dependent_required(&self) -> IndexMap<String, Vec<String>> {
        match self.get("dependentRequired") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), string_list(Some(v))))
                .collect(),
            _ => IndexMap::new(),
        }
    }

    /// Conditions lifted out of `allOf` during preprocessing.
    pub fn conditions(&self) -> Vec<Condition> {
        let Some(Value::Array(arr)) = self.get(CONDITIONS) else {
            return Vec::new();
        };
        arr.iter()
            .filter_map(|c| {
                let if_schema = c.get("if").map(SchemaNode::lenient)?;
                Some(Condition {
                    if_schema,
                    then_schema: c.get("then").map(SchemaNode::lenient),
                    else_schema: c.get("else").map(SchemaNode::lenient),
                })
            })
            .collect()
    }

    /// Whether the node carries keywords that can only be resolved against data.
    pub fn is_data_dependent(&self) -> bool {
        self.has("if")
            || self.has("dependentRequired")
            || self.has("dependentSchemas")
            || !self.conditions().is_empty()
    }

    /// A `const`, a single-value `enum`, or a schema whose only type is `null`.
    pub fn is_constant(&self) -> bool {
        if self.has("const") {
            return true;
        }
        if let Some(Value::Array(values)) = self.get("enum") {
            if values.len() == 1 {
                return true;
            }
        }
        matches!(self.type_names(), Some(types) if types.len() == 1 && types[0] == "null")
    }

    /// An empty value of the schema's type. This is not the `default`.
    pub fn initial_value(&self) -> Value {
        if self.has_type("object") {
            json!({})
        } else if self.has_type("array") {
            json!([])
        } else if self.has_type("string") {
            json!("")
        } else if self.has_type("number") || self.has_type("integer") {
            json!(0)
        } else if self.has_type("boolean") {
            json!(false)
        } else {
            Value::Null
        }
    }

    /// The structural child schema for one path segment.
    ///
    /// Keys are looked up in `properties`, then `patternProperties`, then
    /// `unevaluatedProperties`, then `additionalProperties`. Indices are looked
    /// up in `prefixItems`, then `unevaluatedItems`, then `items`. An index
    /// names an object key instead when a property matches its decimal form
    /// or the node cannot be an array.
    pub fn sub_schema(&self, segment: &PathSegment) -> Option<SchemaNode> {
        if self.is_always_false() {
            return None;
        }
        match segment {
            PathSegment::Key(key) => Some(self.sub_property(key)),
            PathSegment::Index(index) => {
                let key = index.to_string();
                match self.declared_property(&key) {
                    Some(prop) => Some(prop),
                    None if !self.has_type("array") => Some(self.sub_property(&key)),
                    None => Some(self.sub_item(*index)),
                }
            }
        }
    }

    fn declared_property(&self, key: &str) -> Option<SchemaNode> {
        if let Some(prop) = self.property(key) {
            return Some(prop);
        }
        self.pattern_properties()
            .into_iter()
            .find(|(pattern, _)| Regex::new(pattern).map(|re| re.is_match(key)).unwrap_or(false))
            .map(|(_, schema)| schema)
    }

    fn sub_property(&self, key: &str) -> SchemaNode {
        if let Some(prop) = self.declared_property(key) {
            return prop;
        }
        if let Some(unevaluated) = self.unevaluated_properties() {
            return unevaluated;
        }
        self.additional_properties()
    }

    fn sub_item(&self, index: usize) -> SchemaNode {
        let prefix = self.prefix_items();
        if let Some(item) = prefix.into_iter().nth(index) {
            return item;
        }
        if let Some(unevaluated) = self.unevaluated_items() {
            return unevaluated;
        }
        self.items()
    }

    fn schema_record(&self, keyword: &str) -> IndexMap<String, SchemaNode> {
        match self.get(keyword) {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), SchemaNode::lenient(v)))
                .collect(),
            _ => IndexMap::new(),
        }
    }

    fn schema_array(&self, keyword: &str) -> Vec<SchemaNode> {
        match self.get(keyword) {
            Some(Value::Array(arr)) => arr.iter().map(SchemaNode::lenient).collect(),
            _ => Vec::new(),
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}
