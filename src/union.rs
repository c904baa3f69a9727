//! `oneOf`/`anyOf` normalization.
//!
//! Runs after `$ref` and `allOf` handling on a single node:
//! 1. reject empty unions as authored
//! 2. prune branches that cannot hold alongside the rest of the node
//! 3. collapse single-branch unions into the node
//! 4. fold `oneOf` branches into `anyOf` branches when the pairing is unique
//! 5. preprocess the surviving branches

use log::debug;
use serde_json::Value;

use crate::error::ResolveError;
use crate::merge::{are_schemas_compatible, merge, merge_pair};
use crate::node::SchemaNode;
use crate::resolver::{display_path, Resolver};

const UNIONS: &[&str] = &["oneOf", "anyOf"];

pub(crate) fn normalize(
    resolver: &Resolver<'_>,
    schema: SchemaNode,
    path: &str,
) -> Result<SchemaNode, ResolveError> {
    if schema.is_boolean() {
        return Ok(schema);
    }
    for keyword in UNIONS {
        if let Some(Value::Array(branches)) = schema.get(keyword) {
            if branches.is_empty() {
                return Err(ResolveError::EmptyUnion {
                    keyword: (*keyword).to_string(),
                    path: display_path(path).to_string(),
                });
            }
        }
    }

    let mut schema = schema;
    for keyword in UNIONS {
        schema = prune_incompatible(&schema, keyword);
    }
    for keyword in UNIONS {
        if let Some(collapsed) = collapse_singleton(resolver, &schema, keyword, path)? {
            return Ok(collapsed);
        }
    }
    schema = fold_one_of_into_any_of(&schema);
    for keyword in UNIONS {
        schema = resolve_branches(resolver, &schema, keyword, path);
    }
    Ok(schema)
}

/// Drop the branches of `keyword` that cannot hold together with the rest of
/// the node. A union pruned down to nothing makes the node unsatisfiable.
pub fn prune_incompatible(schema: &SchemaNode, keyword: &str) -> SchemaNode {
    let branches = union_branches(schema, keyword);
    if branches.is_empty() {
        return schema.clone();
    }

    let parent = schema.without(&[keyword]);
    let survivors: Vec<SchemaNode> = branches
        .into_iter()
        .filter(|branch| are_schemas_compatible(&parent, branch))
        .collect();
    if survivors.is_empty() {
        debug!("every {} branch conflicts with its parent", keyword);
        return SchemaNode::Bool(false);
    }
    schema.with(
        keyword,
        Value::Array(survivors.into_iter().map(SchemaNode::into_value).collect()),
    )
}

/// Fold each `anyOf` branch with the single `oneOf` branch it is compatible
/// with. `oneOf` is dropped when no `anyOf` branch has several candidates.
pub fn fold_one_of_into_any_of(schema: &SchemaNode) -> SchemaNode {
    let one_of = union_branches(schema, "oneOf");
    let any_of = union_branches(schema, "anyOf");
    if one_of.is_empty() || any_of.is_empty() {
        return schema.clone();
    }

    let mut ambiguous = false;
    let folded: Vec<Value> = any_of
        .into_iter()
        .map(|branch| {
            let compatible: Vec<&SchemaNode> = one_of
                .iter()
                .filter(|option| are_schemas_compatible(&branch, option))
                .collect();
            match compatible.as_slice() {
                [only] => merge_pair(&branch, only).into_value(),
                [] => branch.into_value(),
                _ => {
                    ambiguous = true;
                    branch.into_value()
                }
            }
        })
        .collect();

    let schema = schema.with("anyOf", Value::Array(folded));
    if ambiguous {
        schema
    } else {
        schema.without(&["oneOf"])
    }
}

/// Merge a one-branch union into its parent and preprocess the result.
fn collapse_singleton(
    resolver: &Resolver<'_>,
    schema: &SchemaNode,
    keyword: &str,
    path: &str,
) -> Result<Option<SchemaNode>, ResolveError> {
    let mut branches = union_branches(schema, keyword);
    if branches.len() != 1 {
        return Ok(None);
    }
    let branch_path = format!("{}/{}/0", path, keyword);
    let branch = resolver.resolve_lenient(&branches.remove(0), &branch_path);
    let parent = resolver.resolve_at(&schema.without(&[keyword]), path)?;

    let merged = merge(&[parent, branch]);
    resolver.resolve_at(&merged, path).map(Some)
}

fn resolve_branches(
    resolver: &Resolver<'_>,
    schema: &SchemaNode,
    keyword: &str,
    path: &str,
) -> SchemaNode {
    let branches = union_branches(schema, keyword);
    if branches.is_empty() {
        return schema.clone();
    }
    let resolved: Vec<Value> = branches
        .iter()
        .enumerate()
        .map(|(i, branch)| {
            resolver
                .resolve_lenient(branch, &format!("{}/{}/{}", path, keyword, i))
                .into_value()
        })
        .collect();
    schema.with(keyword, Value::Array(resolved))
}

fn union_branches(schema: &SchemaNode, keyword: &str) -> Vec<SchemaNode> {
    match keyword {
        "oneOf" => schema.one_of(),
        _ => schema.any_of(),
    }
}
