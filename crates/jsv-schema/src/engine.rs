//! # Validation Engine
//!
//! Runs one document against one schema file and returns raw diagnostics in
//! the requested [`LocationStyle`]. The schema language itself is delegated
//! to the `jsonschema` crate.
//!
//! ## Reference Handling
//!
//! Before compilation every `$ref` target is loaded through the
//! [`SchemaResolver`] under a fresh [`PendingResolutionState`]. The loaded
//! documents are handed to `jsonschema` through a [`Retrieve`]
//! implementation, so compilation itself never touches the network.
//!
//! A schema without an identifier is given its `file:` URL, so relative
//! references resolve next to the schema file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonschema::{Retrieve, Uri};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use jsv_core::{DomainId, ResolutionError};

use crate::diagnostic::LocationStyle;
use crate::document::PreparedDocument;
use crate::resolver::{document_key, PendingResolutionState, SchemaResolver};

/// Error running the engine for one schema.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A referenced schema could not be loaded.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The schema file could not be read or parsed.
    #[error("schema load error for '{path}': {reason}")]
    SchemaLoad {
        /// Schema file.
        path: String,
        /// Reason the schema could not be loaded.
        reason: String,
    },

    /// The schema could not be compiled.
    #[error("validator build error for schema '{path}': {reason}")]
    Compile {
        /// Schema file.
        path: String,
        /// Reason the validator could not be built.
        reason: String,
    },
}

/// Validates one document against one schema.
pub trait ValidationEngine: Send + Sync {
    /// Validate `document` against the schema at `schema` and return one
    /// raw diagnostic per violation. An empty list means the document is
    /// valid.
    fn validate(
        &self,
        schema: &Path,
        document: &PreparedDocument,
        domain: &DomainId,
        style: LocationStyle,
    ) -> Result<Vec<String>, EngineError>;
}

/// Serves schemas loaded ahead of compilation.
struct PreloadedRetriever {
    resources: HashMap<String, Value>,
}

impl Retrieve for PreloadedRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let url = Url::parse(uri.as_str())?;
        self.resources
            .get(&document_key(&url))
            .cloned()
            .ok_or_else(|| format!("schema '{}' was not preloaded", uri.as_str()).into())
    }
}

/// [`ValidationEngine`] backed by the `jsonschema` crate.
#[derive(Debug, Clone)]
pub struct JsonSchemaEngine {
    resolver: Arc<SchemaResolver>,
}

impl JsonSchemaEngine {
    /// Create an engine resolving references through `resolver`.
    pub fn new(resolver: Arc<SchemaResolver>) -> Self {
        Self { resolver }
    }

    fn load_schema(&self, schema: &Path) -> Result<(Value, Url), EngineError> {
        let load_error = |reason: String| EngineError::SchemaLoad {
            path: schema.display().to_string(),
            reason,
        };
        let canonical: PathBuf = schema
            .canonicalize()
            .map_err(|e| load_error(format!("cannot read file: {e}")))?;
        let content = std::fs::read_to_string(&canonical)
            .map_err(|e| load_error(format!("cannot read file: {e}")))?;
        let mut value: Value =
            serde_json::from_str(&content).map_err(|e| load_error(format!("invalid JSON: {e}")))?;
        let file_url = Url::from_file_path(&canonical)
            .map_err(|_| load_error("path cannot be expressed as a file URL".to_string()))?;

        let keyword = id_keyword(&value);
        let base = value
            .get(keyword)
            .and_then(Value::as_str)
            .and_then(|id| file_url.join(id).ok())
            .unwrap_or(file_url);
        if let Some(object) = value.as_object_mut() {
            object.insert(keyword.to_string(), Value::String(base.to_string()));
        }
        Ok((value, base))
    }
}

impl ValidationEngine for JsonSchemaEngine {
    fn validate(
        &self,
        schema: &Path,
        document: &PreparedDocument,
        domain: &DomainId,
        style: LocationStyle,
    ) -> Result<Vec<String>, EngineError> {
        let (schema_value, base) = self.load_schema(schema)?;

        let root_key = document_key(&base);
        let mut state = PendingResolutionState::new(domain.clone());
        state.enter(&root_key)?;
        let resources = self
            .resolver
            .resolve_references(&schema_value, &base, &mut state);
        state.leave(&root_key);
        let resources = resources?;
        tracing::debug!(schema = %schema.display(), referenced = resources.len(), "compiling schema");

        let mut opts = jsonschema::options();
        opts.with_retriever(PreloadedRetriever { resources });
        let validator = opts
            .build(&schema_value)
            .map_err(|e| EngineError::Compile {
                path: schema.display().to_string(),
                reason: e.to_string(),
            })?;

        let diagnostics = validator
            .iter_errors(document.value())
            .map(|err| {
                let path = err.instance_path.to_string();
                let message = err.to_string();
                match style {
                    LocationStyle::Coordinates => {
                        let line = document.locate(&path).line;
                        style.format(line, 0, &path, &message)
                    }
                    LocationStyle::Pointer => style.format(0, 0, &format!("#{path}"), &message),
                }
            })
            .collect();
        Ok(diagnostics)
    }
}

/// Draft-04 schemas carry their identifier in `id`, later drafts in `$id`.
fn id_keyword(schema: &Value) -> &'static str {
    let draft4 = schema
        .get("$schema")
        .and_then(Value::as_str)
        .is_some_and(|s| s.contains("draft-04"));
    if draft4 {
        "id"
    } else {
        "$id"
    }
}
