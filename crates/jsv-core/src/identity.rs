//! # Identity Newtypes
//!
//! Newtype wrappers for the identifiers passed around the validator. These
//! prevent accidental identifier confusion: a validation type cannot be
//! passed where a domain is expected, and schema identifiers are always
//! compared in their normalized form.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Name of a configuration domain (one sub-folder of the resource root).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DomainId(String);

/// Name of a validation type configured within a domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidationType(String);

/// A schema `$id`, normalized to end with exactly one trailing `#`.
///
/// `https://x/schema` and `https://x/schema#` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SchemaId(String);

impl DomainId {
    /// Create a domain identifier.
    ///
    /// Domain names become folder names, so they must be non-empty and must
    /// not contain path separators.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::UnknownDomain(
                "domain name must not be empty".to_string(),
            ));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ValidationError::UnknownDomain(format!(
                "{name:?} is not a valid domain name"
            )));
        }
        Ok(Self(name))
    }

    /// Access the domain name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValidationType {
    /// Create a validation type name.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::InvalidRequest(
                "validation type must not be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Access the type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl SchemaId {
    /// Normalize an identifier by ensuring a single trailing `#`.
    pub fn new(id: &str) -> Self {
        let trimmed = id.trim().trim_end_matches('#');
        Self(format!("{trimmed}#"))
    }

    /// Access the normalized identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SchemaId {
    fn from(id: String) -> Self {
        Self::new(&id)
    }
}

impl From<SchemaId> for String {
    fn from(id: SchemaId) -> Self {
        id.0
    }
}

impl std::fmt::Display for DomainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ValidationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_id_trailing_hash_equivalence() {
        assert_eq!(
            SchemaId::new("https://x/schema"),
            SchemaId::new("https://x/schema#")
        );
        assert_eq!(SchemaId::new("https://x/schema").as_str(), "https://x/schema#");
    }

    #[test]
    fn test_schema_id_collapses_repeated_hashes() {
        assert_eq!(SchemaId::new("urn:a##").as_str(), "urn:a#");
    }

    #[test]
    fn test_schema_id_serde_normalizes() {
        let id: SchemaId = serde_json::from_str("\"https://x/s\"").unwrap();
        assert_eq!(id.as_str(), "https://x/s#");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"https://x/s#\"");
    }

    #[test]
    fn test_domain_id_rejects_path_like_names() {
        assert!(DomainId::new("").is_err());
        assert!(DomainId::new("..").is_err());
        assert!(DomainId::new("a/b").is_err());
        assert_eq!(DomainId::new("invoices").unwrap().as_str(), "invoices");
    }

    #[test]
    fn test_validation_type_rejects_blank() {
        assert!(ValidationType::new("  ").is_err());
        assert_eq!(ValidationType::new("order").unwrap().to_string(), "order");
    }
}
