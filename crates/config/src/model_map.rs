//! Process-wide, invalidatable, lazily-loaded model-map cache.
//!
//! Loading is deliberately forgiving, mirroring the system this was modeled
//! on: a missing file, an unreadable file, or malformed YAML all collapse to
//! an empty map (logged at `error`) rather than failing every subsequent
//! request. Resolution logic itself lives in `transform::model_map` as a
//! pure function over the already-parsed map.

use std::sync::{LazyLock, RwLock};

use serde_json::Value;
use transform::model_map::{self, MapEntry};

static CACHE: LazyLock<RwLock<Option<Vec<(String, MapEntry)>>>> = LazyLock::new(|| RwLock::new(None));

/// A handle onto the process-wide model-map cache, bound to one file path.
#[derive(Debug, Clone)]
pub struct ModelMapCache {
    path: String,
}

impl ModelMapCache {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Drop the cached map so the next [`Self::resolve`] call reloads it
    /// from disk. Tests that write a new file in place of an old one must
    /// call this, since normal operation caches the map for process
    /// lifetime.
    pub fn invalidate() {
        *CACHE.write().expect("model map cache lock poisoned") = None;
    }

    fn ensure_loaded(&self) {
        if CACHE.read().expect("model map cache lock poisoned").is_some() {
            return;
        }
        let mut guard = CACHE.write().expect("model map cache lock poisoned");
        if guard.is_some() {
            return;
        }
        *guard = Some(Self::load_from_disk(&self.path));
    }

    fn load_from_disk(path: &str) -> Vec<(String, MapEntry)> {
        let file = std::path::Path::new(path);
        if !file.exists() {
            return Vec::new();
        }
        let raw = match std::fs::read_to_string(file) {
            Ok(raw) => raw,
            Err(err) => {
                log::error!("failed to read model map path={path}: {err}");
                return Vec::new();
            }
        };
        if raw.trim().is_empty() {
            return Vec::new();
        }
        let document: Value = match serde_yaml::from_str(&raw) {
            Ok(doc) => doc,
            Err(err) => {
                log::error!("failed to parse model map yaml path={path}: {err}");
                return Vec::new();
            }
        };
        model_map::parse_document(&document)
    }

    /// Resolve `model` against the cached map, loading it on first use.
    pub fn resolve(&self, model: &str) -> (String, Value) {
        self.ensure_loaded();
        let guard = CACHE.read().expect("model map cache lock poisoned");
        let map = guard.as_ref().expect("ensure_loaded always populates the cache");
        model_map::resolve(map, model)
    }
}
