//! # Local Schema Index
//!
//! Maps schema identifiers to local files, so that `$ref` targets declared as
//! shared schemas are read from disk instead of being downloaded.
//!
//! The index is built once from every domain's `shared_schemas` declarations
//! and is immutable afterwards; concurrent lookups need no locking.
//!
//! ## Build Rules
//!
//! - Each declaration is resolved against the domain folder (see
//!   [`Domain::resolve_resource`]). A failing declaration is logged and
//!   skipped; the rest of the domain is still indexed.
//! - A file declaration is indexed as-is. A folder declaration contributes
//!   every `.json` file (case-insensitive) up to [`MAX_SCAN_DEPTH`] levels
//!   deep.
//! - Only the top-level `$id` is read. Files without one are skipped with a
//!   warning.
//! - When two files of one domain declare the same `$id`, the file indexed
//!   last wins and a warning is logged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use jsv_core::{DomainId, SchemaId};

use crate::config::{Domain, DomainRegistry};

/// Maximum folder depth scanned below a declared folder.
pub const MAX_SCAN_DEPTH: usize = 10;

/// Only the part of a schema needed to index it.
#[derive(Debug, Deserialize)]
struct SchemaHeader {
    #[serde(rename = "$id")]
    id: Option<String>,
}

/// Immutable map from `(domain, $id)` to a local schema file.
#[derive(Debug, Default)]
pub struct LocalSchemaIndex {
    entries: HashMap<(DomainId, SchemaId), PathBuf>,
}

impl LocalSchemaIndex {
    /// Build the index from the shared schemas of every domain.
    pub fn build(registry: &DomainRegistry) -> Self {
        let mut index = Self::default();
        for domain in registry.iter() {
            index.add_domain(domain);
        }
        tracing::info!(count = index.len(), "preloaded shared schemas");
        index
    }

    fn add_domain(&mut self, domain: &Domain) {
        for declaration in &domain.config.shared_schemas {
            let resolved = match domain.resolve_resource(declaration) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(domain = %domain.id, error = %e, "skipping shared schema declaration");
                    continue;
                }
            };
            let mut files = Vec::new();
            if resolved.is_file() {
                files.push(resolved);
            } else if resolved.is_dir() {
                collect_json_files(&resolved, MAX_SCAN_DEPTH, &mut files);
                files.sort();
            }
            for file in files {
                self.add_file(&domain.id, file);
            }
        }
    }

    fn add_file(&mut self, domain: &DomainId, path: PathBuf) {
        let id = match read_schema_id(&path) {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::warn!(domain = %domain, schema = %path.display(), "shared schema has no $id, skipping");
                return;
            }
            Err(reason) => {
                tracing::warn!(domain = %domain, schema = %path.display(), %reason, "unreadable shared schema, skipping");
                return;
            }
        };
        let key = (domain.clone(), index_key(&id));
        if let Some(previous) = self.entries.insert(key, path.clone()) {
            tracing::warn!(
                domain = %domain,
                id = %id,
                previous = %previous.display(),
                schema = %path.display(),
                "duplicate shared schema $id, keeping the last file"
            );
        }
    }

    /// Local file for a schema identifier in a domain.
    ///
    /// `https://x/s` and `https://x/s#` name the same entry.
    pub fn get_schema_for_id(&self, domain: &DomainId, id: &str) -> Option<&Path> {
        self.entries
            .get(&(domain.clone(), index_key(id)))
            .map(PathBuf::as_path)
    }

    /// Number of indexed schemas across all domains.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key for an identifier. URLs are compared in parsed form without fragment.
fn index_key(id: &str) -> SchemaId {
    match Url::parse(id.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            SchemaId::new(url.as_str())
        }
        Err(_) => SchemaId::new(id),
    }
}

fn read_schema_id(path: &Path) -> Result<Option<String>, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("cannot read file: {e}"))?;
    let header: SchemaHeader =
        serde_json::from_str(&content).map_err(|e| format!("invalid JSON: {e}"))?;
    Ok(header.id.filter(|id| !id.trim().is_empty()))
}

/// Collect `.json` files below `dir`, descending at most `depth` levels.
pub(crate) fn collect_json_files(dir: &Path, depth: usize, acc: &mut Vec<PathBuf>) {
    if depth == 0 {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_json_files(&path, depth - 1, acc);
        } else if is_json_file(&path) {
            acc.push(path);
        }
    }
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}
