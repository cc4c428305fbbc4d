//! # Schema Reference Resolution
//!
//! Loads the documents behind `$ref` targets before a schema is compiled.
//! Every identifier is looked up in the [`LocalSchemaIndex`] first; only on a
//! miss is it read from disk (`file:` URLs) or downloaded through the
//! [`SchemaFetcher`].
//!
//! ## Cycle Guard
//!
//! A [`PendingResolutionState`] is created for each top-level compilation and
//! passed explicitly through every call. An identifier is added before its
//! references are followed and removed on return, including on failure.
//! Meeting an identifier that is still pending fails with
//! [`ResolutionError::CyclicReference`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use url::Url;

use jsv_core::{DomainId, ResolutionError};

use crate::fetch::SchemaFetcher;
use crate::index::LocalSchemaIndex;

/// Hosts whose schemas are bundled with the validation engine.
const METASCHEMA_HOST: &str = "json-schema.org";

/// Keywords whose values map names to subschemas. Member names are data, so
/// a member called `default` or `enum` is still a schema.
const SCHEMA_MAP_KEYWORDS: [&str; 6] = [
    "properties",
    "patternProperties",
    "$defs",
    "definitions",
    "dependentSchemas",
    "dependencies",
];

/// Identifiers being resolved within one compilation.
#[derive(Debug)]
pub struct PendingResolutionState {
    domain: DomainId,
    pending: HashSet<String>,
}

impl PendingResolutionState {
    /// Fresh state for one compilation in `domain`.
    pub fn new(domain: DomainId) -> Self {
        Self {
            domain,
            pending: HashSet::new(),
        }
    }

    /// The domain references are resolved for.
    pub fn domain(&self) -> &DomainId {
        &self.domain
    }

    /// Mark `id` as pending, failing if it already is.
    pub fn enter(&mut self, id: &str) -> Result<(), ResolutionError> {
        if self.pending.insert(id.to_string()) {
            Ok(())
        } else {
            Err(ResolutionError::CyclicReference { id: id.to_string() })
        }
    }

    /// Mark `id` as no longer pending.
    pub fn leave(&mut self, id: &str) {
        self.pending.remove(id);
    }

    /// Whether `id` is currently pending.
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    /// Number of pending identifiers.
    pub fn depth(&self) -> usize {
        self.pending.len()
    }
}

/// Documents loaded for one compilation, keyed by [`document_key`].
pub type ResolvedResources = HashMap<String, Value>;

/// The document part of a URL: everything but the fragment.
pub fn document_key(url: &Url) -> String {
    let mut document = url.clone();
    document.set_fragment(None);
    document.into()
}

/// Loads referenced schemas, local index first.
pub struct SchemaResolver {
    index: Arc<LocalSchemaIndex>,
    fetcher: Arc<dyn SchemaFetcher>,
}

impl std::fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaResolver")
            .field("indexed", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl SchemaResolver {
    /// Create a resolver over an index and a fetcher.
    pub fn new(index: Arc<LocalSchemaIndex>, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self { index, fetcher }
    }

    /// Bytes of the schema identified by `id`.
    pub fn open(&self, id: &Url, domain: &DomainId) -> Result<Vec<u8>, ResolutionError> {
        if let Some(path) = self.index.get_schema_for_id(domain, id.as_str()) {
            tracing::debug!(%domain, id = %id, schema = %path.display(), "schema found locally");
            return std::fs::read(path).map_err(|e| failure(id, format!("cannot read {}: {e}", path.display())));
        }
        if id.scheme() == "file" {
            let path = id
                .to_file_path()
                .map_err(|_| failure(id, "not a local file path"))?;
            return std::fs::read(&path).map_err(|e| failure(id, format!("cannot read file: {e}")));
        }
        tracing::debug!(%domain, id = %id, "schema not found locally, looking up remotely");
        self.fetcher.fetch(id).map_err(|e| failure(id, e.to_string()))
    }

    /// Load `id` and, transitively, everything it references.
    ///
    /// Loaded documents are added to `resources`.
    pub fn resolve(
        &self,
        id: &Url,
        state: &mut PendingResolutionState,
        resources: &mut ResolvedResources,
    ) -> Result<(), ResolutionError> {
        let key = document_key(id);
        state.enter(&key)?;
        let result = self.load_document(&key, state, resources);
        state.leave(&key);
        result
    }

    /// Load everything referenced from `root`, whose base URL is `base`.
    ///
    /// The root itself should already be pending in `state`.
    pub fn resolve_references(
        &self,
        root: &Value,
        base: &Url,
        state: &mut PendingResolutionState,
    ) -> Result<ResolvedResources, ResolutionError> {
        let mut resources = ResolvedResources::new();
        self.walk(root, base, state, &mut resources)?;
        Ok(resources)
    }

    fn load_document(
        &self,
        key: &str,
        state: &mut PendingResolutionState,
        resources: &mut ResolvedResources,
    ) -> Result<(), ResolutionError> {
        let url = Url::parse(key).map_err(|e| ResolutionError::SchemaResolution {
            id: key.to_string(),
            reason: e.to_string(),
        })?;
        let bytes = self.open(&url, state.domain())?;
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| failure(&url, format!("invalid JSON: {e}")))?;
        resources.insert(key.to_string(), value.clone());
        self.walk(&value, &url, state, resources)
    }

    fn walk(
        &self,
        schema: &Value,
        base: &Url,
        state: &mut PendingResolutionState,
        resources: &mut ResolvedResources,
    ) -> Result<(), ResolutionError> {
        match schema {
            Value::Object(map) => {
                let scoped;
                let base = match nested_id(map).and_then(|id| base.join(id).ok()) {
                    Some(url) => {
                        scoped = url;
                        &scoped
                    }
                    None => base,
                };
                if let Some(Value::String(reference)) = map.get("$ref") {
                    self.follow(reference, base, state, resources)?;
                }
                for (keyword, child) in map {
                    match keyword.as_str() {
                        "enum" | "const" | "examples" | "default" => {}
                        keyword if SCHEMA_MAP_KEYWORDS.contains(&keyword) => {
                            if let Value::Object(members) = child {
                                for member in members.values() {
                                    self.walk(member, base, state, resources)?;
                                }
                            }
                        }
                        _ => self.walk(child, base, state, resources)?,
                    }
                }
                Ok(())
            }
            Value::Array(items) => items
                .iter()
                .try_for_each(|item| self.walk(item, base, state, resources)),
            _ => Ok(()),
        }
    }

    fn follow(
        &self,
        reference: &str,
        base: &Url,
        state: &mut PendingResolutionState,
        resources: &mut ResolvedResources,
    ) -> Result<(), ResolutionError> {
        if reference.starts_with('#') {
            return Ok(());
        }
        let target = base
            .join(reference)
            .map_err(|e| ResolutionError::SchemaResolution {
                id: reference.to_string(),
                reason: e.to_string(),
            })?;
        let key = document_key(&target);
        if key == document_key(base) || target.host_str() == Some(METASCHEMA_HOST) {
            return Ok(());
        }
        if state.is_pending(&key) {
            return Err(ResolutionError::CyclicReference { id: key });
        }
        if resources.contains_key(&key) {
            return Ok(());
        }
        self.resolve(&target, state, resources)
    }
}

fn nested_id(map: &Map<String, Value>) -> Option<&str> {
    map.get("$id").and_then(Value::as_str)
}

fn failure(id: &Url, reason: impl Into<String>) -> ResolutionError {
    ResolutionError::SchemaResolution {
        id: id.to_string(),
        reason: reason.into(),
    }
}
