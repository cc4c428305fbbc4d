//! # jsv-schema: JSON Schema Validation Service
//!
//! Validates JSON and YAML documents against preconfigured and user-supplied
//! JSON Schemas, grouped into configuration domains.
//!
//! ## Pipeline
//!
//! | Stage | Module |
//! |-------|--------|
//! | Domain and application configuration | [`config`] |
//! | Shared schemas preloaded by `$id` | [`index`] |
//! | `$ref` loading with cycle detection | [`resolver`], [`fetch`] |
//! | Remotely configured schemas | [`remote`] |
//! | Parsing, preprocessing, pretty-printing | [`document`], [`location`] |
//! | One schema against one document | [`engine`] |
//! | ALL / ANY / ONE_OF over schema sets | [`combination`] |
//! | Free-text diagnostics to records | [`diagnostic`] |
//! | End-to-end request handling | [`validate`] |
//!
//! ## Crate Policy
//!
//! - Depends only on `jsv-core` internally.
//! - The local schema index and the remote cache are built once at startup
//!   and injected; there is no global state.
//! - Locally indexed schemas always take precedence over network lookups.

pub mod combination;
pub mod config;
pub mod diagnostic;
pub mod document;
pub mod engine;
pub mod fetch;
pub mod index;
pub mod location;
pub mod remote;
pub mod resolver;
pub mod validate;

pub use combination::{group_headers, CombinationEvaluator, ANY_OF_HEADER, ONE_OF_HEADER};
pub use config::{
    AppConfig, Domain, DomainConfig, DomainRegistry, ExternalSchemaSupport, TypeConfig,
    YamlSupport,
};
pub use diagnostic::{normalize, normalize_batch, ErrorRecord, LocationStyle};
pub use document::{InputFormat, PreparedDocument};
pub use engine::{EngineError, JsonSchemaEngine, ValidationEngine};
pub use fetch::{FetchError, HttpFetcher, SchemaFetcher};
pub use index::LocalSchemaIndex;
pub use location::{LocatedDocument, LocationError, Position};
pub use remote::{RefreshHandle, RemoteSchemaCache};
pub use resolver::{PendingResolutionState, SchemaResolver};
pub use validate::{ValidationOutcome, ValidationRequest, ValidationSpecs, Validator};
