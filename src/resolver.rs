//! Schema resolution - turns a raw schema node into a preprocessed node.
//!
//! Resolution is shallow: only the node itself is transformed. Children
//! (`properties`, `items`, ...) stay raw until someone asks for them, so a
//! cyclic `$ref` graph is expanded one hop per access instead of forever.
//!
//! For one node, resolution runs these steps in order:
//! 1. replace `$ref` by `allOf: [target, siblings]`
//! 2. preprocess `allOf` members, lift their `if`/`then`/`else` into
//!    `conditions`, and merge the rest
//! 3. prune, collapse and fold `oneOf`/`anyOf` (see [`crate::union`])

use log::{debug, warn};
use serde_json::Value;

use crate::context::{CacheLookup, ResolutionContext};
use crate::error::ResolveError;
use crate::loader::{navigate_fragment, pointer_of};
use crate::merge::merge;
use crate::node::{Condition, SchemaNode, CONDITIONS};
use crate::union;

/// Resolve and transform `node` against `context`.
///
/// # Errors
///
/// Returns `ResolveError::DanglingReference` if the node's own `$ref` points
/// nowhere, or `ResolveError::EmptyUnion` if it declares an empty
/// `oneOf`/`anyOf`. Failures inside members and branches are recovered
/// locally and never surface here.
pub fn resolve_and_transform(
    node: &SchemaNode,
    context: &ResolutionContext,
) -> Result<SchemaNode, ResolveError> {
    Resolver::new(context).resolve_at(node, "")
}

/// Resolve the `$ref` of `node`, returning the node that replaces it.
///
/// A bare reference resolves to its (preprocessed) target. A reference with
/// sibling keywords becomes `allOf: [target, siblings]`.
pub fn resolve_ref(
    node: &SchemaNode,
    context: &ResolutionContext,
) -> Result<SchemaNode, ResolveError> {
    Resolver::new(context).resolve_reference(node, "")
}

/// Resolver bound to one [`ResolutionContext`].
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    context: &'a ResolutionContext,
}

impl<'a> Resolver<'a> {
    pub fn new(context: &'a ResolutionContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &'a ResolutionContext {
        self.context
    }

    /// Resolve `node`, which lives at the schema location `path`.
    pub fn resolve_at(&self, node: &SchemaNode, path: &str) -> Result<SchemaNode, ResolveError> {
        if node.is_boolean() {
            return Ok(node.clone());
        }

        let mut schema = node.clone();
        if schema.reference().is_some() {
            schema = self.resolve_reference(&schema, path)?;
        }
        schema = self.handle_all_of(schema, path);
        union::normalize(self, schema, path)
    }

    /// Like [`Resolver::resolve_at`], substituting the error's fallback schema.
    pub fn resolve_lenient(&self, node: &SchemaNode, path: &str) -> SchemaNode {
        match self.resolve_at(node, path) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("{}: {}", display_path(path), e);
                e.fallback_schema()
            }
        }
    }

    pub fn resolve_reference(
        &self,
        node: &SchemaNode,
        path: &str,
    ) -> Result<SchemaNode, ResolveError> {
        let Some(reference) = node.reference() else {
            return Ok(node.clone());
        };
        let pointer = pointer_of(reference).to_string();

        let target = match self.context.lookup(&pointer) {
            CacheLookup::Hit(target) => {
                debug!("reference cache hit for {}", reference);
                target
            }
            CacheLookup::InProgress => {
                debug!(
                    "{}: {} is already being resolved, not expanding further",
                    display_path(path),
                    reference
                );
                SchemaNode::Bool(true)
            }
            CacheLookup::Miss => {
                let raw = navigate_fragment(self.context.root(), reference)?;
                let raw = SchemaNode::try_from(raw.clone())?;
                self.context.begin(&pointer);
                match self.resolve_at(&raw, &pointer) {
                    Ok(target) => {
                        self.context.complete(&pointer, target.clone());
                        target
                    }
                    Err(e) => {
                        self.context.abandon(&pointer);
                        return Err(e);
                    }
                }
            }
        };

        let siblings = node.without(&["$ref"]);
        if siblings.is_always_true() {
            return Ok(target);
        }
        Ok(SchemaNode::all_of(vec![target, siblings]))
    }

    fn handle_all_of(&self, schema: SchemaNode, path: &str) -> SchemaNode {
        if !schema.has("allOf") {
            return schema;
        }
        let members = schema.all_of_members();
        let mut base = schema.without(&["allOf"]);
        if members.is_empty() {
            return base;
        }

        let mut conditions = Vec::new();
        let mut resolved = Vec::with_capacity(members.len() + 1);
        for (i, member) in members.iter().enumerate() {
            let member_path = format!("{}/allOf/{}", path, i);
            let member = self.resolve_lenient(member, &member_path);
            match member.if_schema() {
                Some(if_schema) => {
                    conditions.push(Condition {
                        if_schema: self.resolve_lenient(&if_schema, &format!("{}/if", member_path)),
                        then_schema: member
                            .then_schema()
                            .map(|s| self.resolve_lenient(&s, &format!("{}/then", member_path))),
                        else_schema: member
                            .else_schema()
                            .map(|s| self.resolve_lenient(&s, &format!("{}/else", member_path))),
                    });
                    resolved.push(member.without(&["if", "then", "else"]));
                }
                None => resolved.push(member),
            }
        }

        if !conditions.is_empty() {
            let mut all: Vec<Value> = match base.get(CONDITIONS) {
                Some(Value::Array(existing)) => existing.clone(),
                _ => Vec::new(),
            };
            all.extend(conditions.iter().map(Condition::to_value));
            base = base.with(CONDITIONS, Value::Array(all));
        }

        let mut schemas = Vec::with_capacity(resolved.len() + 1);
        schemas.push(base);
        schemas.extend(resolved);
        merge(&schemas)
    }
}

pub(crate) fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
