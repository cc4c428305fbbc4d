//! # Schema Combination
//!
//! Evaluates one document against an ordered set of schemas and merges the
//! per-schema diagnostics into one list according to a
//! [`CombinationApproach`].
//!
//! | Approach | Outcome |
//! |----------|---------|
//! | `AllOf`  | every diagnostic of every schema |
//! | `AnyOf`  | nothing as soon as one schema passes, otherwise a header and every branch |
//! | `OneOf`  | nothing for exactly one pass, one count diagnostic for several, otherwise a header and every branch |
//!
//! Branch diagnostics are labelled with the schema's 1-based position: the
//! first diagnostic of a branch is prefixed `N) `, the rest are padded with
//! blanks so the normalizer attaches them to the same branch.
//!
//! A schema that cannot be loaded or compiled contributes a single
//! diagnostic describing the failure and does not stop the evaluation.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use jsv_core::{CombinationApproach, DomainId};

use crate::diagnostic::LocationStyle;
use crate::document::PreparedDocument;
use crate::engine::ValidationEngine;

/// Header emitted when no schema of an `anyOf` set passed.
pub const ANY_OF_HEADER: &str =
    "The content should be valid against at least one of the provided schemas.";

/// Header emitted when no schema of a `oneOf` set passed.
pub const ONE_OF_HEADER: &str =
    "The content should be valid against exactly one of the provided schemas.";

/// The header lines, used to group diagnostics during normalization.
pub fn group_headers() -> HashSet<String> {
    [ANY_OF_HEADER, ONE_OF_HEADER]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Runs documents against schema sets.
#[derive(Clone)]
pub struct CombinationEvaluator {
    engine: Arc<dyn ValidationEngine>,
}

impl std::fmt::Debug for CombinationEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinationEvaluator").finish_non_exhaustive()
    }
}

impl CombinationEvaluator {
    /// Create an evaluator over a validation engine.
    pub fn new(engine: Arc<dyn ValidationEngine>) -> Self {
        Self { engine }
    }

    /// Validate `document` against `schemas` under `approach`.
    pub fn evaluate(
        &self,
        schemas: &[PathBuf],
        approach: CombinationApproach,
        document: &PreparedDocument,
        domain: &DomainId,
        style: LocationStyle,
    ) -> Vec<String> {
        let run = |schema: &PathBuf| self.run(schema, document, domain, style);
        match approach {
            CombinationApproach::AllOf => schemas.iter().flat_map(run).collect(),
            CombinationApproach::AnyOf => {
                let mut branches = Vec::new();
                for (position, schema) in schemas.iter().enumerate() {
                    let diagnostics = run(schema);
                    if diagnostics.is_empty() {
                        return Vec::new();
                    }
                    label_branch(&mut branches, position + 1, diagnostics);
                }
                with_header(ANY_OF_HEADER, branches)
            }
            CombinationApproach::OneOf => {
                let mut successes = 0usize;
                let mut branches = Vec::new();
                for (position, schema) in schemas.iter().enumerate() {
                    let diagnostics = run(schema);
                    if diagnostics.is_empty() {
                        successes += 1;
                    } else {
                        label_branch(&mut branches, position + 1, diagnostics);
                    }
                }
                match successes {
                    0 => with_header(ONE_OF_HEADER, branches),
                    1 => Vec::new(),
                    n => vec![style.unlocated(&format!(
                        "The content was valid against {n} schemas but should have been valid against only one."
                    ))],
                }
            }
        }
    }

    fn run(
        &self,
        schema: &PathBuf,
        document: &PreparedDocument,
        domain: &DomainId,
        style: LocationStyle,
    ) -> Vec<String> {
        match self.engine.validate(schema, document, domain, style) {
            Ok(diagnostics) => diagnostics,
            Err(e) => {
                tracing::warn!(schema = %schema.display(), error = %e, "schema could not be evaluated");
                vec![style.unlocated(&e.to_string())]
            }
        }
    }
}

fn label_branch(out: &mut Vec<String>, position: usize, diagnostics: Vec<String>) {
    let label = format!("{position}) ");
    let padding = " ".repeat(label.len());
    for (i, diagnostic) in diagnostics.into_iter().enumerate() {
        let prefix = if i == 0 { &label } else { &padding };
        out.push(format!("{prefix}{diagnostic}"));
    }
}

fn with_header(header: &str, branches: Vec<String>) -> Vec<String> {
    if branches.is_empty() {
        return branches;
    }
    let mut out = Vec::with_capacity(branches.len() + 1);
    out.push(header.to_string());
    out.extend(branches);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::normalize_batch;

    #[test]
    fn test_label_branch_shapes() {
        let mut out = Vec::new();
        label_branch(
            &mut out,
            12,
            vec!["[1,0][/a] x".to_string(), "[2,0][/b] y".to_string()],
        );
        assert_eq!(out, vec!["12) [1,0][/a] x", "    [2,0][/b] y"]);
    }

    #[test]
    fn test_labels_normalize_into_sets() {
        let mut out = vec![ANY_OF_HEADER.to_string()];
        label_branch(&mut out, 1, vec!["[1,0][/a] x".into(), "[2,0][/b] y".into()]);
        label_branch(&mut out, 2, vec!["[3,0][/c] z".into()]);
        let records = normalize_batch(&out, &group_headers());
        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                ANY_OF_HEADER,
                "- [Set 1]: [/a] x",
                "- [Set 1]: [/b] y",
                "- [Set 2]: [/c] z",
            ]
        );
        assert_eq!(records[2].line, 2);
    }

    #[test]
    fn test_header_only_with_branches() {
        assert!(with_header(ONE_OF_HEADER, Vec::new()).is_empty());
        assert_eq!(with_header(ONE_OF_HEADER, vec!["1) x".into()]).len(), 2);
    }
}
