//! # Error Types: Structured Error Hierarchy
//!
//! Defines the error types used throughout the validator. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Request errors ([`ValidationError`]) abort a validation before any
//!   report is produced. They are distinct from a validation *failure*,
//!   which is an ordinary outcome carrying a list of diagnostics.
//! - Reference resolution errors ([`ResolutionError`]) are scoped to one
//!   schema compilation and are surfaced as a single diagnostic.
//! - Configuration errors ([`ConfigurationError`]) are raised while loading
//!   domains and shared schemas; callers log them and skip the declaration.

use thiserror::Error;

/// Top-level error type for the validator.
#[derive(Error, Debug)]
pub enum JsvError {
    /// A validation request could not be carried out.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A schema reference could not be resolved.
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// The configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal errors for a single validation request.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Neither preconfigured nor user-supplied schemas exist for the type.
    #[error("no schema is defined for validation type '{validation_type}'")]
    NoSchemaDefined {
        /// The requested validation type.
        validation_type: String,
    },

    /// The input is not syntactically valid.
    #[error("the provided input is not valid {format}: {reason}")]
    MalformedInput {
        /// `JSON` or `YAML`.
        format: &'static str,
        /// Parser message.
        reason: String,
    },

    /// The configured preprocessing expression could not be applied.
    #[error("preprocessing with expression '{expression}' failed: {reason}")]
    Preprocessing {
        /// The configured expression.
        expression: String,
        /// Why evaluation failed.
        reason: String,
    },

    /// The request itself is inconsistent with the domain configuration.
    #[error("invalid validation request: {0}")]
    InvalidRequest(String),

    /// The request names a domain that is not loaded.
    #[error("unknown validation domain: {0}")]
    UnknownDomain(String),
}

/// Errors raised while resolving `$ref` targets for one schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Neither the local index nor the remote lookup produced the schema.
    #[error("schema '{id}' could not be resolved: {reason}")]
    SchemaResolution {
        /// The identifier being resolved.
        id: String,
        /// The underlying failure.
        reason: String,
    },

    /// The identifier is already being resolved higher up the chain.
    #[error("cyclic schema reference detected while resolving '{id}'")]
    CyclicReference {
        /// The identifier that was revisited.
        id: String,
    },
}

impl ResolutionError {
    /// The identifier the error refers to.
    pub fn id(&self) -> &str {
        match self {
            Self::SchemaResolution { id, .. } | Self::CyclicReference { id } => id,
        }
    }
}

/// Errors in startup configuration.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// A declared resource escapes the domain's resource folder.
    #[error("resource '{declaration}' of domain '{domain}' is not under the domain root")]
    ResourceOutsideDomain {
        /// The configuring domain.
        domain: String,
        /// The declared path.
        declaration: String,
    },

    /// A declared path could not be read or canonicalized.
    #[error("cannot read '{path}': {reason}")]
    UnreadablePath {
        /// The offending path.
        path: String,
        /// Reason for the failure.
        reason: String,
    },

    /// A domain configuration file could not be loaded.
    #[error("failed to load domain configuration {path}: {reason}")]
    DomainLoad {
        /// Path of the configuration file.
        path: String,
        /// Reason for the failure.
        reason: String,
    },

    /// An application setting has an invalid value.
    #[error("invalid value for {name}: {reason}")]
    InvalidSetting {
        /// Environment variable or setting name.
        name: String,
        /// Reason the value was rejected.
        reason: String,
    },
}
