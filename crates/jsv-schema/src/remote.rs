//! # Remote Schema Cache
//!
//! Preconfigured schemas given as `http(s)` URLs are downloaded into an
//! on-disk cache (`<cache_dir>/<domain>/<type>/remote_<n>.json`) and
//! refreshed periodically by a background thread.
//!
//! ## Concurrency
//!
//! Each domain has its own reader/writer lock. A refresh holds the write lock
//! while it clears and repopulates the domain's folder. Validations hold the
//! read lock only while selecting schema files, so no validation ever sees a
//! half-refreshed schema set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::RwLock;
use url::Url;

use jsv_core::{DomainId, ValidationType};

use crate::config::{is_remote, Domain, DomainRegistry};
use crate::fetch::SchemaFetcher;
use crate::index::{collect_json_files, MAX_SCAN_DEPTH};

/// Cached remote files of one domain, by validation type, in declaration order.
#[derive(Debug, Default)]
struct CachedDomain {
    files: HashMap<String, Vec<Option<PathBuf>>>,
}

/// Per-domain cache of downloaded schemas.
pub struct RemoteSchemaCache {
    root: PathBuf,
    registry: Arc<DomainRegistry>,
    fetcher: Arc<dyn SchemaFetcher>,
    domains: HashMap<DomainId, RwLock<CachedDomain>>,
}

impl std::fmt::Debug for RemoteSchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSchemaCache")
            .field("root", &self.root)
            .field("domains", &self.domains.len())
            .finish_non_exhaustive()
    }
}

impl RemoteSchemaCache {
    /// Create an empty cache for every domain of `registry`.
    ///
    /// Nothing is downloaded until [`refresh_all`](Self::refresh_all) runs.
    pub fn new(
        root: impl Into<PathBuf>,
        registry: Arc<DomainRegistry>,
        fetcher: Arc<dyn SchemaFetcher>,
    ) -> Self {
        let domains = registry
            .iter()
            .map(|d| (d.id.clone(), RwLock::new(CachedDomain::default())))
            .collect();
        Self {
            root: root.into(),
            registry,
            fetcher,
            domains,
        }
    }

    /// Refresh every domain.
    pub fn refresh_all(&self) {
        for domain in self.registry.iter() {
            self.refresh_domain(domain);
        }
    }

    /// Clear and re-download the remote schemas of one domain.
    pub fn refresh_domain(&self, domain: &Domain) {
        let Some(slot) = self.domains.get(&domain.id) else {
            return;
        };
        let mut cached = slot.write();
        let folder = self.root.join(domain.id.as_str());
        if let Err(e) = std::fs::remove_dir_all(&folder) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(domain = %domain.id, folder = %folder.display(), error = %e, "cannot clear remote schema cache");
            }
        }
        cached.files.clear();

        let mut downloaded = 0usize;
        for (type_name, type_config) in &domain.config.types {
            let type_folder = folder.join(folder_name(type_name));
            let files = type_config
                .remote_schemas()
                .enumerate()
                .map(|(n, reference)| {
                    let target = type_folder.join(format!("remote_{n}.json"));
                    match self.download(reference, &target) {
                        Ok(()) => {
                            downloaded += 1;
                            Some(target)
                        }
                        Err(reason) => {
                            tracing::warn!(domain = %domain.id, schema = reference, %reason, "remote schema download failed");
                            None
                        }
                    }
                })
                .collect();
            cached.files.insert(type_name.clone(), files);
        }
        tracing::info!(domain = %domain.id, count = downloaded, "refreshed remote schemas");
    }

    fn download(&self, reference: &str, target: &Path) -> Result<(), String> {
        let url = Url::parse(reference.trim()).map_err(|e| format!("invalid URL: {e}"))?;
        let bytes = self.fetcher.fetch(&url).map_err(|e| e.to_string())?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| format!("cannot create folder: {e}"))?;
        }
        std::fs::write(target, bytes).map_err(|e| format!("cannot write file: {e}"))
    }

    /// The preconfigured schema files of a validation type, in declaration
    /// order.
    ///
    /// Local folders contribute their `.json` files, sorted. Declarations that
    /// cannot be resolved and remote schemas that are not cached are logged
    /// and left out.
    pub fn select(&self, domain: &Domain, validation_type: &ValidationType) -> Vec<PathBuf> {
        let Some(type_config) = domain.type_config(validation_type) else {
            return Vec::new();
        };
        let cached = self.domains.get(&domain.id).map(|slot| slot.read());

        let mut selected = Vec::new();
        let mut remote_index = 0usize;
        for reference in &type_config.schemas {
            if is_remote(reference) {
                let file = cached
                    .as_ref()
                    .and_then(|c| c.files.get(validation_type.as_str()))
                    .and_then(|files| files.get(remote_index))
                    .and_then(Option::as_ref);
                remote_index += 1;
                match file {
                    Some(path) => selected.push(path.clone()),
                    None => tracing::warn!(domain = %domain.id, schema = %reference, "remote schema not available"),
                }
                continue;
            }
            match domain.resolve_resource(reference) {
                Ok(path) if path.is_dir() => {
                    let mut files = Vec::new();
                    collect_json_files(&path, MAX_SCAN_DEPTH, &mut files);
                    files.sort();
                    selected.extend(files);
                }
                Ok(path) => selected.push(path),
                Err(e) => tracing::warn!(domain = %domain.id, error = %e, "skipping schema declaration"),
            }
        }
        selected
    }

    /// Start refreshing every `interval` on a background thread.
    ///
    /// The thread stops when the returned handle is stopped or dropped.
    pub fn spawn_refresher(self: &Arc<Self>, interval: Duration) -> RefreshHandle {
        let (stop, signal) = mpsc::channel::<()>();
        let cache = Arc::clone(self);
        let thread = std::thread::spawn(move || loop {
            match signal.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => cache.refresh_all(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        RefreshHandle {
            stop: Some(stop),
            thread: Some(thread),
        }
    }
}

fn folder_name(type_name: &str) -> String {
    type_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Handle to the background refresh thread.
#[derive(Debug)]
pub struct RefreshHandle {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Stop the refresher and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("remote schema refresher panicked");
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainConfig;
    use crate::fetch::FetchError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ServingFetcher {
        calls: AtomicUsize,
    }

    impl SchemaFetcher for ServingFetcher {
        fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.path().ends_with("missing.json") {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            }
            Ok(format!(r#"{{"$comment": "{url}"}}"#).into_bytes())
        }
    }

    const CONFIG: &str = r#"
types:
  t:
    schemas:
      - local.json
      - https://x.org/a.json
      - folder
      - https://x.org/missing.json
      - https://x.org/b.json
"#;

    fn setup() -> (tempfile::TempDir, Arc<DomainRegistry>, Arc<ServingFetcher>) {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("resources/d");
        std::fs::create_dir_all(folder.join("folder")).unwrap();
        std::fs::write(folder.join("local.json"), "{}").unwrap();
        std::fs::write(folder.join("folder/z.json"), "{}").unwrap();
        std::fs::write(folder.join("folder/y.json"), "{}").unwrap();
        let config: DomainConfig = serde_yaml::from_str(CONFIG).unwrap();
        let domain = Domain::new(
            DomainId::new("d").unwrap(),
            folder.canonicalize().unwrap(),
            config,
            true,
        );
        let registry = Arc::new(DomainRegistry::from_domains([domain]));
        let fetcher = Arc::new(ServingFetcher {
            calls: AtomicUsize::new(0),
        });
        (dir, registry, fetcher)
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_select_before_refresh_has_only_local_files() {
        let (dir, registry, fetcher) = setup();
        let cache = RemoteSchemaCache::new(dir.path().join("cache"), registry.clone(), fetcher);
        let domain = registry.get("d").unwrap();
        let selected = cache.select(domain, &ValidationType::new("t").unwrap());
        assert_eq!(names(&selected), vec!["local.json", "y.json", "z.json"]);
    }

    #[test]
    fn test_refresh_downloads_in_declaration_order() {
        let (dir, registry, fetcher) = setup();
        let cache = RemoteSchemaCache::new(dir.path().join("cache"), registry.clone(), fetcher.clone());
        cache.refresh_all();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);

        let domain = registry.get("d").unwrap();
        let selected = cache.select(domain, &ValidationType::new("t").unwrap());
        assert_eq!(
            names(&selected),
            vec!["local.json", "remote_0.json", "y.json", "z.json", "remote_2.json"]
        );
        let content = std::fs::read_to_string(&selected[4]).unwrap();
        assert!(content.contains("https://x.org/b.json"));
    }

    #[test]
    fn test_refresh_replaces_previous_files() {
        let (dir, registry, fetcher) = setup();
        let root = dir.path().join("cache");
        let cache = RemoteSchemaCache::new(&root, registry.clone(), fetcher);
        std::fs::create_dir_all(root.join("d/stale")).unwrap();
        std::fs::write(root.join("d/stale/old.json"), "{}").unwrap();
        cache.refresh_all();
        assert!(!root.join("d/stale").exists());
        assert!(root.join("d/t/remote_0.json").is_file());
    }

    #[test]
    fn test_unknown_type_selects_nothing() {
        let (dir, registry, fetcher) = setup();
        let cache = RemoteSchemaCache::new(dir.path().join("cache"), registry.clone(), fetcher);
        let domain = registry.get("d").unwrap();
        assert!(cache.select(domain, &ValidationType::new("other").unwrap()).is_empty());
    }

    #[test]
    fn test_refresher_stops() {
        let (dir, registry, fetcher) = setup();
        let cache = Arc::new(RemoteSchemaCache::new(dir.path().join("cache"), registry, fetcher.clone()));
        let handle = cache.spawn_refresher(Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(100));
        handle.stop();
        let calls = fetcher.calls.load(Ordering::SeqCst);
        assert!(calls >= 3, "expected at least one refresh, saw {calls} downloads");
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), calls);
    }

    #[test]
    fn test_folder_name_sanitized() {
        assert_eq!(folder_name("a/b c"), "a_b_c");
        assert_eq!(folder_name("order-v2"), "order-v2");
    }
}
