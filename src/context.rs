//! Resolution contexts and their reference caches.
//!
//! A [`ResolutionContext`] binds one root document to one [`SessionMode`] and
//! owns the cache of already-preprocessed `$ref` targets for that pair. Two
//! contexts never share a cache, because the same pointer can address
//! different nodes in different root documents.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::node::SchemaNode;
use crate::types::SessionMode;

#[derive(Debug, Clone)]
enum CacheEntry {
    /// Resolution of this pointer has begun but not returned yet.
    Pending,
    Resolved(SchemaNode),
}

/// Outcome of a reference cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(SchemaNode),
    /// The pointer is being resolved further up the current call stack.
    InProgress,
    Miss,
}

/// Root document, mode and reference cache for one resolution session.
#[derive(Debug)]
pub struct ResolutionContext {
    mode: SessionMode,
    root: Arc<Value>,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl ResolutionContext {
    pub fn new(mode: SessionMode, root: Arc<Value>) -> Self {
        Self {
            mode,
            root,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// The document `$ref` pointers are resolved against.
    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn root_arc(&self) -> Arc<Value> {
        Arc::clone(&self.root)
    }

    pub fn lookup(&self, pointer: &str) -> CacheLookup {
        match self.cache.lock().get(pointer) {
            Some(CacheEntry::Resolved(node)) => CacheLookup::Hit(node.clone()),
            Some(CacheEntry::Pending) => CacheLookup::InProgress,
            None => CacheLookup::Miss,
        }
    }

    /// Mark `pointer` as being resolved, so reentrant lookups short-circuit.
    pub(crate) fn begin(&self, pointer: &str) {
        self.cache
            .lock()
            .insert(pointer.to_string(), CacheEntry::Pending);
    }

    pub(crate) fn complete(&self, pointer: &str, node: SchemaNode) {
        self.cache
            .lock()
            .insert(pointer.to_string(), CacheEntry::Resolved(node));
    }

    /// Drop a pending marker after a failed resolution.
    pub(crate) fn abandon(&self, pointer: &str) {
        let mut cache = self.cache.lock();
        if matches!(cache.get(pointer), Some(CacheEntry::Pending)) {
            cache.remove(pointer);
        }
    }

    /// Number of fully resolved pointers.
    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .values()
            .filter(|e| matches!(e, CacheEntry::Resolved(_)))
            .count()
    }

    /// Empty the cache. Always wholesale, never per entry.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}
