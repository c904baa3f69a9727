//! Error types for schema resolution and effective-schema calculation.

use std::path::PathBuf;
use thiserror::Error;

use crate::node::SchemaNode;

/// Errors during schema loading and resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    // Schema errors (exit code 2)
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("dangling reference \"{reference}\": no node at that pointer")]
    DanglingReference { reference: String },

    #[error("{keyword} at {path} has zero entries")]
    EmptyUnion { keyword: String, path: String },
}

impl ResolveError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ResolveError::FileNotFound { .. } | ResolveError::ReadError { .. } => 3,
            _ => 2,
        }
    }

    /// Schema substituted for a node whose resolution failed.
    ///
    /// Authoring defects (empty unions) make the node always invalid; lookup
    /// failures degrade to the permissive schema so the editor stays usable.
    pub fn fallback_schema(&self) -> SchemaNode {
        match self {
            ResolveError::EmptyUnion { .. } => SchemaNode::Bool(false),
            _ => SchemaNode::Bool(true),
        }
    }
}

/// Errors raised by the validation service.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("cannot compile subschema: {message}")]
    Compile { message: String },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Resolve(e) => e.exit_code(),
            ValidateError::Compile { .. } => 2,
        }
    }
}
