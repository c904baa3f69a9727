//! Preprocessed schema documents and debounced editing sessions.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::context::ResolutionContext;
use crate::effective::{EffectiveSchema, EffectiveSchemaCalculator, Selections};
use crate::error::ResolveError;
use crate::node::SchemaNode;
use crate::normalize::normalize_document;
use crate::resolver::Resolver;
use crate::types::{EngineOptions, Path, PathSegment, SessionMode};
use crate::validator::{JsonSchemaValidationService, ValidationService};

/// A raw schema document resolved for one [`SessionMode`].
///
/// Owns the Reference Cache for its document. Children are preprocessed on
/// access, so lookups through [`PreprocessedSchema::schema_at`] keep filling
/// the cache over the lifetime of the instance.
#[derive(Debug)]
pub struct PreprocessedSchema {
    raw: Arc<Value>,
    context: ResolutionContext,
    root: SchemaNode,
    validator: JsonSchemaValidationService,
    options: EngineOptions,
}

/// Preprocess `raw` for `mode`.
///
/// # Errors
///
/// Returns `ResolveError::InvalidSchema` if `raw` is neither a boolean nor an
/// object. Problems inside the document degrade per node instead.
pub fn preprocess(
    raw: &Value,
    mode: SessionMode,
    options: &EngineOptions,
) -> Result<PreprocessedSchema, ResolveError> {
    PreprocessedSchema::new(Arc::new(raw.clone()), mode, options.clone())
}

impl PreprocessedSchema {
    pub fn new(
        raw: Arc<Value>,
        mode: SessionMode,
        options: EngineOptions,
    ) -> Result<Self, ResolveError> {
        let document = if options.normalize {
            normalize_document(&raw)
        } else {
            (*raw).clone()
        };
        let root = SchemaNode::try_from(document.clone())?;
        let context = ResolutionContext::new(mode, Arc::new(document));
        let root = Resolver::new(&context).resolve_lenient(&root, "");
        let validator = JsonSchemaValidationService::for_context(&context);
        debug!("preprocessed {:?} document", mode);

        Ok(Self {
            raw,
            context,
            root,
            validator,
            options,
        })
    }

    /// The document as the user wrote it.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.context
    }

    pub fn mode(&self) -> SessionMode {
        self.context.mode()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.context)
    }

    /// Structural sub-schema at `path`, ignoring data.
    ///
    /// Every node on the way is preprocessed. A path that leaves the schema
    /// (through a `false` node) yields `false`.
    pub fn schema_at(&self, path: &Path) -> SchemaNode {
        let mut current = self.root.clone();
        let mut location = Path::root();
        for segment in path.segments() {
            current = self.resolve_child(&current, &location, segment);
            location = location.child(segment.clone());
        }
        current
    }

    /// Preprocessed child of an effective schema, without recomputing it
    /// against data. Use [`PreprocessedSchema::effective_schema_at`] on the
    /// child path when its own conditionals matter.
    pub fn child_of(&self, effective: &EffectiveSchema, segment: &PathSegment) -> SchemaNode {
        self.resolve_child(&effective.schema, &effective.path, segment)
    }

    /// Preprocessed `properties` entry `key` of an effective schema, or
    /// `None` when it declares no such property.
    pub fn property_of(&self, effective: &EffectiveSchema, key: &str) -> Option<SchemaNode> {
        let property = effective.schema.property(key)?;
        let location = effective.path.child(key);
        Some(self.resolver().resolve_lenient(&property, &location.to_string()))
    }

    fn resolve_child(&self, parent: &SchemaNode, location: &Path, segment: &PathSegment) -> SchemaNode {
        let child = parent.sub_schema(segment).unwrap_or(SchemaNode::Bool(false));
        let location = location.child(segment.clone());
        self.resolver().resolve_lenient(&child, &location.to_string())
    }

    /// Effective schema at `path` for the full document `data`.
    pub fn effective_schema_at(&self, data: &Value, path: &Path) -> EffectiveSchema {
        self.effective_schema_with(data, path, &self.validator, &Selections::new())
    }

    /// Like [`PreprocessedSchema::effective_schema_at`], with explicit
    /// `oneOf` selections and validation service.
    pub fn effective_schema_with(
        &self,
        data: &Value,
        path: &Path,
        validator: &dyn ValidationService,
        selections: &Selections,
    ) -> EffectiveSchema {
        EffectiveSchemaCalculator::new(self.resolver(), validator)
            .max_iterations(self.options.max_iterations)
            .at(&self.root, data, path, selections)
    }

    /// Effective schema at `path` using the built-in validation service.
    pub fn effective_schema_selecting(
        &self,
        data: &Value,
        path: &Path,
        selections: &Selections,
    ) -> EffectiveSchema {
        self.effective_schema_with(data, path, &self.validator, selections)
    }
}

struct PendingEdit {
    raw: Value,
    received: Instant,
    generation: u64,
}

#[derive(Default)]
struct EditQueue {
    /// Generation of the newest edit ever recorded.
    latest: u64,
    edit: Option<PendingEdit>,
}

struct Snapshot {
    generation: u64,
    document: Arc<PreprocessedSchema>,
}

/// Debounced owner of the current [`PreprocessedSchema`] for one mode.
///
/// Edits only record the latest raw document. [`SchemaSession::poll`]
/// reprocesses once the quiet period has passed, then swaps the new
/// instance in whole. Readers holding the previous `Arc` keep a consistent
/// view until they drop it. Every edit gets a generation number, and a
/// rebuild never replaces a document built from a newer edit.
pub struct SchemaSession {
    mode: SessionMode,
    options: EngineOptions,
    current: RwLock<Snapshot>,
    pending: Mutex<EditQueue>,
}

impl SchemaSession {
    /// Start a session and preprocess `raw` right away.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::InvalidSchema` if `raw` is not a schema.
    pub fn new(raw: Value, mode: SessionMode, options: EngineOptions) -> Result<Self, ResolveError> {
        let current = PreprocessedSchema::new(Arc::new(raw), mode, options.clone())?;
        Ok(Self {
            mode,
            options,
            current: RwLock::new(Snapshot {
                generation: 0,
                document: Arc::new(current),
            }),
            pending: Mutex::new(EditQueue::default()),
        })
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Snapshot of the current preprocessed document.
    pub fn current(&self) -> Arc<PreprocessedSchema> {
        Arc::clone(&self.current.read().document)
    }

    /// Record an edit. Replaces any edit not yet processed.
    pub fn edit(&self, raw: Value) {
        self.edit_at(raw, Instant::now());
    }

    pub fn edit_at(&self, raw: Value, now: Instant) {
        let mut queue = self.pending.lock();
        queue.latest += 1;
        queue.edit = Some(PendingEdit {
            raw,
            received: now,
            generation: queue.latest,
        });
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().edit.is_some()
    }

    /// Reprocess if the latest edit is older than the debounce period.
    /// Returns whether a new document was swapped in.
    pub fn poll(&self) -> bool {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&self, now: Instant) -> bool {
        let quiet = self.options.debounce_duration();
        let edit = {
            let mut queue = self.pending.lock();
            let ready = queue
                .edit
                .as_ref()
                .map_or(false, |edit| now.saturating_duration_since(edit.received) >= quiet);
            if ready {
                queue.edit.take()
            } else {
                None
            }
        };
        match edit {
            Some(edit) => self.rebuild(edit.raw, edit.generation),
            None => false,
        }
    }

    /// Process the pending edit immediately, ignoring the debounce period.
    pub fn flush(&self) -> bool {
        let edit = self.pending.lock().edit.take();
        match edit {
            Some(edit) => self.rebuild(edit.raw, edit.generation),
            None => false,
        }
    }

    /// Drop the current preprocessed document and its Reference Cache,
    /// rebuilding from the same raw document.
    pub fn invalidate(&self) {
        let (raw, generation) = {
            let current = self.current.read();
            (current.document.raw().clone(), current.generation)
        };
        self.rebuild(raw, generation);
    }

    fn rebuild(&self, raw: Value, generation: u64) -> bool {
        match PreprocessedSchema::new(Arc::new(raw), self.mode, self.options.clone()) {
            Ok(next) => {
                let mut current = self.current.write();
                if generation < current.generation {
                    debug!(
                        "discarding {:?} rebuild of edit {}, edit {} is already in place",
                        self.mode, generation, current.generation
                    );
                    return false;
                }
                *current = Snapshot {
                    generation,
                    document: Arc::new(next),
                };
                info!("reprocessed {:?} schema", self.mode);
                true
            }
            Err(e) => {
                warn!("keeping previous {:?} schema: {}", self.mode, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for SchemaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaSession")
            .field("mode", &self.mode)
            .field("pending", &self.has_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn options() -> EngineOptions {
        EngineOptions::new().debounce(Duration::from_millis(300))
    }

    #[test]
    fn preprocess_rejects_non_schema() {
        let result = preprocess(&json!(42), SessionMode::FileEditor, &EngineOptions::default());
        assert!(matches!(result, Err(ResolveError::InvalidSchema { .. })));
    }

    #[test]
    fn schema_at_resolves_each_step() {
        let raw = json!({
            "$defs": {"item": {"type": "object", "properties": {"n": {"type": "integer"}}}},
            "properties": {"list": {"type": "array", "items": {"$ref": "#/$defs/item"}}}
        });
        let doc = preprocess(&raw, SessionMode::FileEditor, &EngineOptions::default()).unwrap();
        let n = doc.schema_at(&Path::parse("/list/3/n"));
        assert_eq!(n.get("type"), Some(&json!("integer")));
        assert_eq!(doc.context().cached_len(), 1);
    }

    #[test]
    fn schema_at_through_false_is_false() {
        let raw = json!({"properties": {"a": false}});
        let doc = preprocess(&raw, SessionMode::FileEditor, &EngineOptions::default()).unwrap();
        assert_eq!(doc.schema_at(&Path::parse("/a/b")), SchemaNode::Bool(false));
    }

    #[test]
    fn normalization_does_not_touch_raw() {
        let raw = json!({"properties": {"age": {"const": 3}}});
        let doc = preprocess(&raw, SessionMode::FileEditor, &EngineOptions::new().normalize(true)).unwrap();
        assert_eq!(doc.raw(), &raw);
        let age = doc.schema_at(&Path::parse("/age"));
        assert_eq!(age.get("enum"), Some(&json!([3])));
        assert_eq!(age.title(), Some("age"));
    }

    #[test]
    fn session_debounces_to_latest_edit() {
        let start = Instant::now();
        let session = SchemaSession::new(json!({"title": "v0"}), SessionMode::SchemaEditor, options()).unwrap();

        session.edit_at(json!({"title": "v1"}), start);
        session.edit_at(json!({"title": "v2"}), start + Duration::from_millis(100));
        assert!(!session.poll_at(start + Duration::from_millis(200)));
        assert_eq!(session.current().root().title(), Some("v0"));

        assert!(session.poll_at(start + Duration::from_millis(400)));
        assert_eq!(session.current().root().title(), Some("v2"));
        assert!(!session.has_pending());
        assert!(!session.poll_at(start + Duration::from_millis(900)));
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let session = SchemaSession::new(json!({"title": "old"}), SessionMode::FileEditor, options()).unwrap();
        let before = session.current();
        session.edit(json!({"title": "new"}));
        assert!(session.flush());
        assert_eq!(before.root().title(), Some("old"));
        assert_eq!(session.current().root().title(), Some("new"));
    }

    #[test]
    fn invalid_edit_keeps_previous_document() {
        let session = SchemaSession::new(json!({"title": "ok"}), SessionMode::FileEditor, options()).unwrap();
        session.edit(json!("not a schema"));
        assert!(!session.flush());
        assert_eq!(session.current().root().title(), Some("ok"));
    }

    #[test]
    fn stale_rebuild_never_replaces_newer_edit() {
        let session = SchemaSession::new(json!({"title": "v0"}), SessionMode::FileEditor, options()).unwrap();
        session.edit(json!({"title": "first"}));
        let first = session.pending.lock().edit.take().unwrap();
        session.edit(json!({"title": "second"}));
        assert!(session.flush());

        assert!(!session.rebuild(first.raw, first.generation));
        assert_eq!(session.current().root().title(), Some("second"));

        session.invalidate();
        assert_eq!(session.current().root().title(), Some("second"));
    }

    #[test]
    fn property_of_resolves_effective_children() {
        let raw = json!({
            "$defs": {"name": {"type": "string"}},
            "if": {"required": ["married"]},
            "then": {"properties": {"spouse": {"$ref": "#/$defs/name"}}}
        });
        let doc = preprocess(&raw, SessionMode::FileEditor, &EngineOptions::default()).unwrap();
        let root = doc.effective_schema_at(&json!({"married": true}), &Path::root());
        let spouse = doc.property_of(&root, "spouse").unwrap();
        assert_eq!(spouse.get("type"), Some(&json!("string")));
        assert_eq!(doc.child_of(&root, &PathSegment::Key("spouse".into())), spouse);
        assert!(doc.property_of(&root, "other").is_none());
    }

    #[test]
    fn invalidate_clears_cache() {
        let raw = json!({"$defs": {"s": {"type": "string"}}, "properties": {"a": {"$ref": "#/$defs/s"}}});
        let session = SchemaSession::new(raw, SessionMode::FileEditor, options()).unwrap();
        session.current().schema_at(&Path::parse("/a"));
        assert_eq!(session.current().context().cached_len(), 1);

        session.invalidate();
        assert_eq!(session.current().context().cached_len(), 0);
    }
}
