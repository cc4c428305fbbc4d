//! # Validation Orchestrator
//!
//! Runs one validation request end to end:
//!
//! 1. Resolve the domain and validation type and check the request against
//!    the type's external-schema permission ([`ValidationSpecs::build`]).
//! 2. Select the preconfigured schema files under the domain's read lock.
//!    With neither preconfigured nor external schemas the request fails with
//!    [`ValidationError::NoSchemaDefined`] before the input is parsed.
//! 3. Prepare the document (format detection, parsing, preprocessing,
//!    pretty-printing, location tracking).
//! 4. Evaluate the preconfigured set under the type's combination approach,
//!    then the external set under the external approach, and concatenate
//!    the diagnostics.
//! 5. Normalize the diagnostics into [`ErrorRecord`]s.
//!
//! Fatal request errors produce no outcome at all; a failing document is an
//! ordinary [`ValidationOutcome`] with `success == false`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use jsv_core::{CombinationApproach, ConfigurationError, JsvError, ValidationError, ValidationType};

use crate::combination::{group_headers, CombinationEvaluator};
use crate::config::{AppConfig, Domain, DomainRegistry, ExternalSchemaSupport};
use crate::diagnostic::{normalize_batch, ErrorRecord, LocationStyle};
use crate::document::PreparedDocument;
use crate::engine::JsonSchemaEngine;
use crate::fetch::HttpFetcher;
use crate::index::LocalSchemaIndex;
use crate::remote::RemoteSchemaCache;
use crate::resolver::SchemaResolver;

/// A validation request as submitted by a caller.
#[derive(Debug, Clone, Default)]
pub struct ValidationRequest {
    /// Configuration domain name.
    pub domain: String,
    /// Validation type; optional when the domain defines exactly one.
    pub validation_type: Option<String>,
    /// Raw document content.
    pub document: String,
    /// User-supplied schema files.
    pub external_schemas: Vec<PathBuf>,
    /// Approach for the external schemas; defaults to the type's setting.
    pub external_combination: Option<CombinationApproach>,
    /// Report locations as JSON Pointers instead of line coordinates.
    pub location_as_pointer: bool,
}

impl ValidationRequest {
    /// Read the document from `path`.
    pub fn with_document_file(mut self, path: &Path) -> Result<Self, JsvError> {
        self.document = std::fs::read_to_string(path)?;
        Ok(self)
    }
}

/// A request checked against its domain configuration.
#[derive(Debug, Clone)]
pub struct ValidationSpecs {
    /// Resolved domain.
    pub domain: Arc<Domain>,
    /// Resolved validation type.
    pub validation_type: ValidationType,
    /// User-supplied schema files.
    pub external_schemas: Vec<PathBuf>,
    /// Approach for the external schemas.
    pub external_combination: CombinationApproach,
    /// Diagnostic convention.
    pub style: LocationStyle,
}

impl ValidationSpecs {
    /// Validate `request` against the configuration of `registry`.
    pub fn build(registry: &DomainRegistry, request: &ValidationRequest) -> Result<Self, ValidationError> {
        let domain = Arc::clone(registry.get(&request.domain)?);
        let validation_type = domain.resolve_type(request.validation_type.as_deref())?;
        let type_config = domain.type_config(&validation_type).ok_or_else(|| {
            ValidationError::InvalidRequest(format!("unknown validation type '{validation_type}'"))
        })?;

        match type_config.external_schemas {
            ExternalSchemaSupport::None if !request.external_schemas.is_empty() => {
                return Err(ValidationError::InvalidRequest(format!(
                    "validation type '{validation_type}' does not accept user-provided schemas"
                )));
            }
            ExternalSchemaSupport::Required if request.external_schemas.is_empty() => {
                return Err(ValidationError::InvalidRequest(format!(
                    "validation type '{validation_type}' requires user-provided schemas"
                )));
            }
            _ => {}
        }

        let external_combination = request
            .external_combination
            .unwrap_or(type_config.external_combination);
        let style = if request.location_as_pointer {
            LocationStyle::Pointer
        } else {
            LocationStyle::Coordinates
        };
        Ok(Self {
            domain,
            validation_type,
            external_schemas: request.external_schemas.clone(),
            external_combination,
            style,
        })
    }
}

/// Result of one validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    /// Whether the document satisfied every schema set.
    pub success: bool,
    /// Findings in emission order.
    pub errors: Vec<ErrorRecord>,
    /// Number of items, when enabled for the domain and the content is an array.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
}

/// Entry point for validations.
#[derive(Debug, Clone)]
pub struct Validator {
    registry: Arc<DomainRegistry>,
    schemas: Arc<RemoteSchemaCache>,
    evaluator: CombinationEvaluator,
}

impl Validator {
    /// Create a validator over loaded domains, the schema cache and an
    /// evaluator.
    pub fn new(
        registry: Arc<DomainRegistry>,
        schemas: Arc<RemoteSchemaCache>,
        evaluator: CombinationEvaluator,
    ) -> Self {
        Self {
            registry,
            schemas,
            evaluator,
        }
    }

    /// Wire a validator from application configuration.
    ///
    /// Loads every domain, builds the local schema index and downloads the
    /// remotely configured schemas once. Periodic refreshes are left to the
    /// caller through [`RemoteSchemaCache::spawn_refresher`].
    pub fn from_config(config: &AppConfig) -> Result<Self, JsvError> {
        let registry = Arc::new(DomainRegistry::load(config)?);
        let index = Arc::new(LocalSchemaIndex::build(&registry));
        let fetcher = Arc::new(HttpFetcher::new(config).map_err(|e| {
            ConfigurationError::InvalidSetting {
                name: "JSV_PROXY_URL".to_string(),
                reason: e.to_string(),
            }
        })?);
        let resolver = Arc::new(SchemaResolver::new(index, fetcher.clone()));
        let engine = Arc::new(JsonSchemaEngine::new(resolver));

        let schemas = Arc::new(RemoteSchemaCache::new(
            &config.cache_dir,
            registry.clone(),
            fetcher,
        ));
        schemas.refresh_all();

        Ok(Self::new(registry, schemas, CombinationEvaluator::new(engine)))
    }

    /// The loaded domains.
    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    /// Validate one request.
    pub fn validate(&self, request: &ValidationRequest) -> Result<ValidationOutcome, ValidationError> {
        let specs = ValidationSpecs::build(&self.registry, request)?;
        let domain = &specs.domain;
        let type_config = domain.type_config(&specs.validation_type).ok_or_else(|| {
            ValidationError::InvalidRequest(format!("unknown validation type '{}'", specs.validation_type))
        })?;

        let preconfigured = self.schemas.select(domain, &specs.validation_type);
        if preconfigured.is_empty() && specs.external_schemas.is_empty() {
            return Err(ValidationError::NoSchemaDefined {
                validation_type: specs.validation_type.to_string(),
            });
        }

        let document = PreparedDocument::prepare(
            &request.document,
            type_config.yaml,
            type_config.preprocessor.as_deref(),
        )?;
        tracing::debug!(
            domain = %domain.id,
            validation_type = %specs.validation_type,
            preconfigured = preconfigured.len(),
            external = specs.external_schemas.len(),
            "validating document"
        );

        let mut diagnostics = self.evaluator.evaluate(
            &preconfigured,
            type_config.combination,
            &document,
            &domain.id,
            specs.style,
        );
        diagnostics.extend(self.evaluator.evaluate(
            &specs.external_schemas,
            specs.external_combination,
            &document,
            &domain.id,
            specs.style,
        ));

        let mut errors = normalize_batch(&diagnostics, &group_headers());
        if specs.style == LocationStyle::Pointer {
            for record in &mut errors {
                if let Some(pointer) = &record.pointer {
                    record.line = document.locate(pointer).line;
                }
            }
        }

        let item_count = if domain.config.report_item_count {
            document.item_count()
        } else {
            None
        };
        Ok(ValidationOutcome {
            success: errors.is_empty(),
            errors,
            item_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainConfig;
    use jsv_core::DomainId;

    const CONFIG: &str = r#"
types:
  strict:
    schemas: [a.json]
    external_schemas: none
  open:
    schemas: []
    external_schemas: required
    external_combination: oneOf
"#;

    fn registry() -> DomainRegistry {
        let config: DomainConfig = serde_yaml::from_str(CONFIG).unwrap();
        let domain = Domain::new(
            DomainId::new("d").unwrap(),
            std::env::temp_dir(),
            config,
            true,
        );
        DomainRegistry::from_domains([domain])
    }

    fn request(validation_type: Option<&str>, external: &[&str]) -> ValidationRequest {
        ValidationRequest {
            domain: "d".into(),
            validation_type: validation_type.map(str::to_string),
            document: "{}".into(),
            external_schemas: external.iter().map(PathBuf::from).collect(),
            ..ValidationRequest::default()
        }
    }

    #[test]
    fn test_type_is_required_with_several_types() {
        let err = ValidationSpecs::build(&registry(), &request(None, &[])).unwrap_err();
        assert!(err.to_string().contains("open|strict"), "got {err}");
    }

    #[test]
    fn test_external_schemas_rejected_when_unsupported() {
        let err = ValidationSpecs::build(&registry(), &request(Some("strict"), &["x.json"])).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRequest(_)));
    }

    #[test]
    fn test_external_schemas_required() {
        let err = ValidationSpecs::build(&registry(), &request(Some("open"), &[])).unwrap_err();
        assert!(err.to_string().contains("requires"));

        let specs = ValidationSpecs::build(&registry(), &request(Some("open"), &["x.json"])).unwrap();
        assert_eq!(specs.external_combination, CombinationApproach::OneOf);
        assert_eq!(specs.style, LocationStyle::Coordinates);
    }

    #[test]
    fn test_requested_external_approach_wins() {
        let mut req = request(Some("open"), &["x.json"]);
        req.external_combination = Some(CombinationApproach::AnyOf);
        req.location_as_pointer = true;
        let specs = ValidationSpecs::build(&registry(), &req).unwrap();
        assert_eq!(specs.external_combination, CombinationApproach::AnyOf);
        assert_eq!(specs.style, LocationStyle::Pointer);
    }

    #[test]
    fn test_document_file_read_errors_are_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = request(Some("strict"), &[])
            .with_document_file(&dir.path().join("absent.json"))
            .unwrap_err();
        assert!(matches!(err, JsvError::Io(_)));

        let path = dir.path().join("doc.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        let req = request(Some("strict"), &[]).with_document_file(&path).unwrap();
        assert_eq!(req.document, "[1, 2]");
    }

    #[test]
    fn test_from_config_loads_domains() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("resources/d");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("config.yaml"), CONFIG).unwrap();
        let mut config = AppConfig::with_root(dir.path().join("resources"));
        config.cache_dir = dir.path().join("cache");

        let validator = Validator::from_config(&config).unwrap();
        assert_eq!(validator.registry().len(), 1);
    }

    #[test]
    fn test_from_config_without_resource_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::with_root(dir.path().join("missing"));
        let err = Validator::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            JsvError::Configuration(ConfigurationError::UnreadablePath { .. })
        ));
    }

    #[test]
    fn test_unknown_domain() {
        let mut req = request(Some("strict"), &[]);
        req.domain = "missing".into();
        let err = ValidationSpecs::build(&registry(), &req).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownDomain(_)));
    }
}
