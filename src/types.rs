//! Core types shared across resolution and effective-schema calculation.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hard cap on fixpoint iterations when resolving data-dependent keywords.
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Default quiet period before a burst of edits is reprocessed.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Which editing session a resolution is performed for.
///
/// Each mode resolves references against its own root document, so caches
/// are never shared between modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    FileEditor,
    SchemaEditor,
    Settings,
}

impl SessionMode {
    /// Parse a mode name as used on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file_editor" | "file-editor" | "data" => Some(SessionMode::FileEditor),
            "schema_editor" | "schema-editor" | "schema" => Some(SessionMode::SchemaEditor),
            "settings" => Some(SessionMode::Settings),
            _ => None,
        }
    }
}

/// One step of a [`Path`]: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key.replace('~', "~0").replace('/', "~1")),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Location in a data document. The empty path is the document root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Path(Vec<PathSegment>);

impl Path {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Parse a JSON Pointer (`/a/0/b`). All-digit segments become indices.
    pub fn parse(pointer: &str) -> Self {
        let trimmed = pointer.trim_start_matches('#');
        if trimmed.is_empty() || trimmed == "/" {
            return Self::root();
        }
        let segments = trimmed
            .trim_start_matches('/')
            .split('/')
            .map(|part| {
                let key = part.replace("~1", "/").replace("~0", "~");
                match key.parse::<usize>() {
                    Ok(index) if !key.starts_with('+') => PathSegment::Index(index),
                    _ => PathSegment::Key(key),
                }
            })
            .collect();
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Look up the value at `path` inside `data`.
///
/// Missing values are `None`, never an error. Keys that look like indices
/// address arrays, and indices address objects by their decimal key.
pub fn data_at<'a>(path: &Path, data: &'a Value) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.segments() {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
            (PathSegment::Key(key), Value::Array(arr)) => arr.get(key.parse::<usize>().ok()?)?,
            (PathSegment::Index(index), Value::Array(arr)) => arr.get(*index)?,
            (PathSegment::Index(index), Value::Object(map)) => map.get(&index.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

/// Options for preprocessing and effective-schema calculation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EngineOptions {
    /// Fixpoint cap for data-dependent keyword resolution.
    pub max_iterations: usize,
    /// Run the one-time normalization pass before resolving.
    pub normalize: bool,
    /// Quiet period, in milliseconds, before edits are reprocessed.
    pub debounce_ms: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            normalize: false,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fixpoint iteration cap. Zero is raised to one.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Enable or disable the one-time normalization pass.
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = debounce.as_millis() as u64;
        self
    }

    pub fn debounce_duration(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
