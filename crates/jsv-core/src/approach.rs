//! # Schema Combination Approach
//!
//! Defines the closed set of policies used to turn the results of validating
//! one document against several schemas into a single verdict. Every `match`
//! on [`CombinationApproach`] must be exhaustive so that adding a policy
//! forces every evaluator to handle it.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ValidationError;

/// How a document is judged against an ordered set of schemas.
///
/// | Approach | Verdict |
/// |----------|---------|
/// | `AllOf`  | every schema must pass |
/// | `AnyOf`  | at least one schema must pass |
/// | `OneOf`  | exactly one schema must pass |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CombinationApproach {
    /// Every schema must validate the document.
    #[default]
    #[serde(rename = "allOf")]
    AllOf,
    /// At least one schema must validate the document.
    #[serde(rename = "anyOf")]
    AnyOf,
    /// Exactly one schema must validate the document.
    #[serde(rename = "oneOf")]
    OneOf,
}

impl CombinationApproach {
    /// Returns all approaches in canonical order.
    pub fn all() -> &'static [CombinationApproach] {
        &[Self::AllOf, Self::AnyOf, Self::OneOf]
    }

    /// Returns the configuration identifier for this approach.
    ///
    /// This must match the serde serialization format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllOf => "allOf",
            Self::AnyOf => "anyOf",
            Self::OneOf => "oneOf",
        }
    }
}

impl std::fmt::Display for CombinationApproach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CombinationApproach {
    type Err = ValidationError;

    /// Parse an approach from its configuration identifier.
    ///
    /// Accepts the identifiers produced by [`CombinationApproach::as_str()`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allOf" => Ok(Self::AllOf),
            "anyOf" => Ok(Self::AnyOf),
            "oneOf" => Ok(Self::OneOf),
            other => Err(ValidationError::InvalidRequest(format!(
                "unknown schema combination approach {other:?}, expected one of [allOf|anyOf|oneOf]"
            ))),
        }
    }
}
