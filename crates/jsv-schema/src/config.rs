//! # Configuration
//!
//! Application settings are read from the environment ([`AppConfig`]).
//! Each configuration domain is a sub-folder of the resource root holding a
//! `config.yaml` ([`DomainConfig`]) next to its schema files. All domains are
//! loaded once at startup into a [`DomainRegistry`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use jsv_core::{
    CombinationApproach, ConfigurationError, DomainId, ValidationError, ValidationType,
};

/// File name of a domain's configuration inside its folder.
pub const DOMAIN_CONFIG_FILE: &str = "config.yaml";

/// Application-wide settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Folder containing one sub-folder per domain.
    pub resource_root: PathBuf,
    /// Domains to load. `None` loads every sub-folder with a configuration.
    pub domains: Option<Vec<String>>,
    /// Reject resources that resolve outside their domain folder.
    pub restrict_resources_to_domain: bool,
    /// Root of the remote schema cache.
    pub cache_dir: PathBuf,
    /// Fixed delay between remote schema refreshes.
    pub refresh_interval: Duration,
    /// Proxy for remote schema downloads.
    pub proxy_url: Option<Url>,
    /// Timeout for one remote schema download.
    pub fetch_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `JSV_RESOURCE_ROOT` (default: `./resources`)
    /// - `JSV_DOMAINS` (comma-separated, default: all)
    /// - `JSV_RESTRICT_RESOURCES_TO_DOMAIN` (default: `true`)
    /// - `JSV_CACHE_DIR` (default: `<tmp>/jsv-remote-schemas`)
    /// - `JSV_REFRESH_INTERVAL_SECS` (default: 3600)
    /// - `JSV_PROXY_URL` (optional)
    /// - `JSV_FETCH_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let domains = var("JSV_DOMAINS").map(|list| {
            list.split(',')
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect()
        });
        let proxy_url = var("JSV_PROXY_URL")
            .map(|raw| {
                Url::parse(&raw).map_err(|e| ConfigurationError::InvalidSetting {
                    name: "JSV_PROXY_URL".to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            resource_root: var("JSV_RESOURCE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./resources")),
            domains,
            restrict_resources_to_domain: parse_setting(
                "JSV_RESTRICT_RESOURCES_TO_DOMAIN",
                var("JSV_RESTRICT_RESOURCES_TO_DOMAIN"),
                true,
            )?,
            cache_dir: var("JSV_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("jsv-remote-schemas")),
            refresh_interval: Duration::from_secs(parse_setting(
                "JSV_REFRESH_INTERVAL_SECS",
                var("JSV_REFRESH_INTERVAL_SECS"),
                3600,
            )?),
            proxy_url,
            fetch_timeout: Duration::from_secs(parse_setting(
                "JSV_FETCH_TIMEOUT_SECS",
                var("JSV_FETCH_TIMEOUT_SECS"),
                30,
            )?),
        })
    }

    /// Configuration rooted at `resource_root` with defaults for the rest.
    pub fn with_root(resource_root: impl Into<PathBuf>) -> Self {
        Self {
            resource_root: resource_root.into(),
            domains: None,
            restrict_resources_to_domain: true,
            cache_dir: std::env::temp_dir().join("jsv-remote-schemas"),
            refresh_interval: Duration::from_secs(3600),
            proxy_url: None,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

fn parse_setting<T>(name: &str, raw: Option<String>, default: T) -> Result<T, ConfigurationError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigurationError::InvalidSetting {
                name: name.to_string(),
                reason: format!("{raw:?}: {e}"),
            }),
    }
}

// ---------------------------------------------------------------------------
// Domain configuration
// ---------------------------------------------------------------------------

/// Whether user-supplied schemas are accepted for a validation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalSchemaSupport {
    /// External schemas are rejected.
    #[default]
    None,
    /// External schemas may be supplied.
    Optional,
    /// At least one external schema must be supplied.
    Required,
}

/// How YAML input is handled for a validation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YamlSupport {
    /// Input is always JSON.
    #[default]
    None,
    /// Input is always YAML.
    Force,
    /// Input may be either; the format is sniffed.
    Support,
}

/// Configuration of one validation type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TypeConfig {
    /// Preconfigured schemas: paths relative to the domain folder or
    /// `http(s)` URLs.
    pub schemas: Vec<String>,
    /// Approach for the preconfigured schemas.
    pub combination: CombinationApproach,
    /// Whether callers may supply their own schemas.
    pub external_schemas: ExternalSchemaSupport,
    /// Default approach for user-supplied schemas.
    pub external_combination: CombinationApproach,
    /// JSON Pointer selecting the part of the input to validate.
    pub preprocessor: Option<String>,
    /// YAML handling.
    pub yaml: YamlSupport,
}

impl TypeConfig {
    /// Schema references that are local paths.
    pub fn local_schemas(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(String::as_str).filter(|s| !is_remote(s))
    }

    /// Schema references that are downloaded into the remote cache.
    pub fn remote_schemas(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(String::as_str).filter(|s| is_remote(s))
    }
}

/// Whether a schema reference names a remote resource.
pub fn is_remote(reference: &str) -> bool {
    let lower = reference.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Contents of a domain's `config.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Validation types by name.
    pub types: BTreeMap<String, TypeConfig>,
    /// Files or folders preloaded into the local schema index.
    pub shared_schemas: Vec<String>,
    /// Report the number of items when the validated content is an array.
    pub report_item_count: bool,
}

/// A loaded configuration domain.
#[derive(Debug, Clone)]
pub struct Domain {
    /// Domain name.
    pub id: DomainId,
    /// Canonical domain folder.
    pub root: PathBuf,
    /// Parsed configuration.
    pub config: DomainConfig,
    /// Whether resources must stay under `root`.
    pub restrict_resources: bool,
}

impl Domain {
    /// Load a domain from its folder.
    pub fn load(id: DomainId, folder: &Path, restrict_resources: bool) -> Result<Self, ConfigurationError> {
        let root = folder
            .canonicalize()
            .map_err(|e| ConfigurationError::UnreadablePath {
                path: folder.display().to_string(),
                reason: e.to_string(),
            })?;
        let config_path = root.join(DOMAIN_CONFIG_FILE);
        let content =
            std::fs::read_to_string(&config_path).map_err(|e| ConfigurationError::DomainLoad {
                path: config_path.display().to_string(),
                reason: format!("cannot read file: {e}"),
            })?;
        let config: DomainConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigurationError::DomainLoad {
                path: config_path.display().to_string(),
                reason: format!("invalid YAML: {e}"),
            })?;
        Ok(Self::new(id, root, config, restrict_resources))
    }

    /// Build a domain from an already parsed configuration.
    pub fn new(id: DomainId, root: PathBuf, config: DomainConfig, restrict_resources: bool) -> Self {
        Self {
            id,
            root,
            config,
            restrict_resources,
        }
    }

    /// Configuration of a validation type.
    pub fn type_config(&self, validation_type: &ValidationType) -> Option<&TypeConfig> {
        self.config.types.get(validation_type.as_str())
    }

    /// Pick the validation type for a request.
    ///
    /// Without an explicit type the domain's only type is used.
    pub fn resolve_type(&self, requested: Option<&str>) -> Result<ValidationType, ValidationError> {
        match requested {
            Some(name) => {
                if self.config.types.contains_key(name) {
                    ValidationType::new(name)
                } else {
                    Err(ValidationError::InvalidRequest(format!(
                        "unknown validation type '{name}', expected one of [{}]",
                        self.type_names().join("|")
                    )))
                }
            }
            None => {
                let mut names = self.config.types.keys();
                match (names.next(), names.next()) {
                    (Some(only), None) => ValidationType::new(only.clone()),
                    (None, _) => Err(ValidationError::InvalidRequest(format!(
                        "domain '{}' defines no validation types",
                        self.id
                    ))),
                    _ => Err(ValidationError::InvalidRequest(format!(
                        "a validation type is required, expected one of [{}]",
                        self.type_names().join("|")
                    ))),
                }
            }
        }
    }

    /// Names of all validation types, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        self.config.types.keys().map(String::as_str).collect()
    }

    /// Resolve a declared resource path against the domain folder.
    ///
    /// With containment enabled, absolute declarations and paths that
    /// canonicalize outside the domain folder are rejected.
    pub fn resolve_resource(&self, declaration: &str) -> Result<PathBuf, ConfigurationError> {
        let declared = Path::new(declaration.trim());
        if self.restrict_resources && declared.is_absolute() {
            return Err(self.outside(declaration));
        }
        let joined = self.root.join(declared);
        let resolved = joined
            .canonicalize()
            .map_err(|e| ConfigurationError::UnreadablePath {
                path: joined.display().to_string(),
                reason: e.to_string(),
            })?;
        if self.restrict_resources && !resolved.starts_with(&self.root) {
            return Err(self.outside(declaration));
        }
        Ok(resolved)
    }

    fn outside(&self, declaration: &str) -> ConfigurationError {
        ConfigurationError::ResourceOutsideDomain {
            domain: self.id.to_string(),
            declaration: declaration.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// All loaded domains, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    domains: BTreeMap<DomainId, Arc<Domain>>,
}

impl DomainRegistry {
    /// Load every domain under the resource root.
    ///
    /// A domain that fails to load is logged and skipped. Only an unreadable
    /// resource root is an error.
    pub fn load(config: &AppConfig) -> Result<Self, ConfigurationError> {
        let entries = std::fs::read_dir(&config.resource_root).map_err(|e| {
            ConfigurationError::UnreadablePath {
                path: config.resource_root.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let mut registry = Self::default();
        for entry in entries.flatten() {
            let folder = entry.path();
            if !folder.is_dir() || !folder.join(DOMAIN_CONFIG_FILE).is_file() {
                continue;
            }
            let Some(name) = folder.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(allowed) = &config.domains {
                if !allowed.iter().any(|d| d == name) {
                    continue;
                }
            }
            let loaded = DomainId::new(name)
                .map_err(|e| ConfigurationError::DomainLoad {
                    path: folder.display().to_string(),
                    reason: e.to_string(),
                })
                .and_then(|id| Domain::load(id, &folder, config.restrict_resources_to_domain));
            match loaded {
                Ok(domain) => {
                    tracing::info!(domain = %domain.id, types = domain.config.types.len(), "loaded domain");
                    registry.insert(domain);
                }
                Err(e) => tracing::warn!(domain = name, error = %e, "skipping domain"),
            }
        }
        Ok(registry)
    }

    /// Build a registry from already loaded domains.
    pub fn from_domains(domains: impl IntoIterator<Item = Domain>) -> Self {
        let mut registry = Self::default();
        for domain in domains {
            registry.insert(domain);
        }
        registry
    }

    fn insert(&mut self, domain: Domain) {
        self.domains.insert(domain.id.clone(), Arc::new(domain));
    }

    /// Look up a domain by name.
    pub fn get(&self, name: &str) -> Result<&Arc<Domain>, ValidationError> {
        self.domains
            .iter()
            .find(|(id, _)| id.as_str() == name)
            .map(|(_, d)| d)
            .ok_or_else(|| ValidationError::UnknownDomain(name.to_string()))
    }

    /// Iterate over all domains in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Domain>> {
        self.domains.values()
    }

    /// Number of loaded domains.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Whether no domain was loaded.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
shared_schemas:
  - shared
report_item_count: true
types:
  invoice:
    schemas:
      - invoice.schema.json
      - https://example.org/schemas/common.json
    combination: oneOf
    external_schemas: optional
    preprocessor: /payload
    yaml: support
  order:
    schemas: [order.schema.json]
"#;

    fn write_domain(root: &Path, name: &str, yaml: &str) -> PathBuf {
        let folder = root.join(name);
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join(DOMAIN_CONFIG_FILE), yaml).unwrap();
        folder
    }

    #[test]
    fn test_from_lookup_defaults() {
        let cfg = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.resource_root, PathBuf::from("./resources"));
        assert!(cfg.domains.is_none());
        assert!(cfg.restrict_resources_to_domain);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(3600));
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(30));
        assert!(cfg.proxy_url.is_none());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("JSV_RESOURCE_ROOT", "/srv/jsv"),
            ("JSV_DOMAINS", "a, b,,"),
            ("JSV_RESTRICT_RESOURCES_TO_DOMAIN", "false"),
            ("JSV_REFRESH_INTERVAL_SECS", "60"),
            ("JSV_PROXY_URL", "http://proxy:3128"),
        ]
        .into_iter()
        .collect();
        let cfg = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.resource_root, PathBuf::from("/srv/jsv"));
        assert_eq!(cfg.domains, Some(vec!["a".to_string(), "b".to_string()]));
        assert!(!cfg.restrict_resources_to_domain);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(60));
        assert_eq!(cfg.proxy_url.unwrap().host_str(), Some("proxy"));
    }

    #[test]
    fn test_from_lookup_rejects_invalid_values() {
        let err = AppConfig::from_lookup(|k| {
            (k == "JSV_FETCH_TIMEOUT_SECS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidSetting { ref name, .. } if name == "JSV_FETCH_TIMEOUT_SECS"));

        let err = AppConfig::from_lookup(|k| (k == "JSV_PROXY_URL").then(|| "not a url".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidSetting { .. }));
    }

    #[test]
    fn test_domain_config_parses() {
        let config: DomainConfig = serde_yaml::from_str(SAMPLE).unwrap();
        assert!(config.report_item_count);
        assert_eq!(config.shared_schemas, vec!["shared"]);
        let invoice = &config.types["invoice"];
        assert_eq!(invoice.combination, CombinationApproach::OneOf);
        assert_eq!(invoice.external_schemas, ExternalSchemaSupport::Optional);
        assert_eq!(invoice.external_combination, CombinationApproach::AllOf);
        assert_eq!(invoice.yaml, YamlSupport::Support);
        assert_eq!(invoice.preprocessor.as_deref(), Some("/payload"));
        assert_eq!(invoice.local_schemas().collect::<Vec<_>>(), vec!["invoice.schema.json"]);
        assert_eq!(invoice.remote_schemas().count(), 1);
        let order = &config.types["order"];
        assert_eq!(order.external_schemas, ExternalSchemaSupport::None);
        assert_eq!(order.yaml, YamlSupport::None);
    }

    #[test]
    fn test_resolve_type_defaulting() {
        let config: DomainConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let domain = Domain::new(DomainId::new("d").unwrap(), PathBuf::from("/d"), config, true);
        assert_eq!(domain.resolve_type(Some("order")).unwrap().as_str(), "order");
        assert!(domain.resolve_type(Some("missing")).is_err());
        let err = domain.resolve_type(None).unwrap_err();
        assert!(err.to_string().contains("invoice|order"));

        let mut single = domain.clone();
        single.config.types.remove("order");
        assert_eq!(single.resolve_type(None).unwrap().as_str(), "invoice");
    }

    #[test]
    fn test_resolve_resource_containment() {
        let dir = tempfile::tempdir().unwrap();
        let folder = write_domain(dir.path(), "d", "types: {}");
        std::fs::write(folder.join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("outside.json"), "{}").unwrap();

        let domain = Domain::load(DomainId::new("d").unwrap(), &folder, true).unwrap();
        assert!(domain.resolve_resource("a.json").is_ok());
        assert!(matches!(
            domain.resolve_resource("../outside.json"),
            Err(ConfigurationError::ResourceOutsideDomain { .. })
        ));
        let absolute = dir.path().join("outside.json").display().to_string();
        assert!(domain.resolve_resource(&absolute).is_err());
        assert!(matches!(
            domain.resolve_resource("missing.json"),
            Err(ConfigurationError::UnreadablePath { .. })
        ));

        let relaxed = Domain::load(DomainId::new("d").unwrap(), &folder, false).unwrap();
        assert!(relaxed.resolve_resource("../outside.json").is_ok());
    }

    #[test]
    fn test_registry_skips_broken_domains() {
        let dir = tempfile::tempdir().unwrap();
        write_domain(dir.path(), "good", SAMPLE);
        write_domain(dir.path(), "broken", "types: [not, a, map");
        std::fs::create_dir_all(dir.path().join("no-config")).unwrap();

        let registry = DomainRegistry::load(&AppConfig::with_root(dir.path())).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("good").is_ok());
        assert!(matches!(
            registry.get("broken"),
            Err(ValidationError::UnknownDomain(_))
        ));
    }

    #[test]
    fn test_registry_honours_allow_list() {
        let dir = tempfile::tempdir().unwrap();
        write_domain(dir.path(), "a", SAMPLE);
        write_domain(dir.path(), "b", SAMPLE);
        let mut config = AppConfig::with_root(dir.path());
        config.domains = Some(vec!["b".to_string()]);
        let registry = DomainRegistry::load(&config).unwrap();
        assert_eq!(registry.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["b"]);
    }
}
