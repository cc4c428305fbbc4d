//! # Diagnostic Normalization
//!
//! Converts the free-text diagnostics produced by the validation engine and
//! the combination evaluator into structured [`ErrorRecord`]s.
//!
//! ## Tolerated Shapes
//!
//! | Shape | Example |
//! |-------|---------|
//! | located | `[LINE,COL][POINTER] MESSAGE` |
//! | plain | `MESSAGE` |
//! | branch | `N) [LINE,COL][POINTER] MESSAGE` |
//! | grouped | `   [LINE,COL][POINTER] MESSAGE` |
//! | pointer-only | `[POINTER] MESSAGE` |
//!
//! Numeric coordinates that fail to parse default to `0` without affecting
//! the rest of the line. A captured pointer is re-prefixed onto the message
//! as `[pointer] message`.
//!
//! ## Batches
//!
//! [`normalize_batch`] reconstructs nesting from the flat diagnostic stream
//! in a single fold: lines equal to a group header are kept verbatim, and
//! branch or grouped lines are labelled `- [Set N]: ` with the most recent
//! branch.

use std::collections::HashSet;

use serde::Serialize;

/// One structured validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    /// Display message, including the `[pointer] ` and `- [Set N]: ` prefixes.
    pub message: String,
    /// Branch index captured from an `N) ` prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// JSON Pointer of the offending node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    /// 1-based line, or `0` when unknown.
    pub line: usize,
    /// Column, or `0` when unknown.
    pub column: usize,
    /// Whether the line continues a previously opened branch.
    #[serde(skip)]
    pub grouped: bool,
}

impl ErrorRecord {
    fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            branch: None,
            pointer: None,
            line: 0,
            column: 0,
            grouped: false,
        }
    }
}

/// The location convention diagnostics are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationStyle {
    /// `[LINE,COL][POINTER] MESSAGE`
    #[default]
    Coordinates,
    /// `[POINTER] MESSAGE`
    Pointer,
}

impl LocationStyle {
    /// Format one located diagnostic.
    pub fn format(&self, line: usize, column: usize, pointer: &str, message: &str) -> String {
        match self {
            Self::Coordinates => format!("[{line},{column}][{pointer}] {message}"),
            Self::Pointer => format!("[{pointer}] {message}"),
        }
    }

    /// Format a diagnostic that concerns the document as a whole.
    pub fn unlocated(&self, message: &str) -> String {
        match self {
            Self::Coordinates => format!("[0,0] {message}"),
            Self::Pointer => format!("[#/] {message}"),
        }
    }
}

/// Parse a single raw diagnostic.
pub fn normalize(raw: &str) -> ErrorRecord {
    let mut record = ErrorRecord::plain(raw.trim());
    let Some(open) = raw.find('[') else {
        return record;
    };

    let prefix = &raw[..open];
    let body = if let Some((branch, rest)) = split_branch(raw, open) {
        record.branch = Some(branch.to_string());
        rest
    } else if !prefix.is_empty() && prefix.trim().is_empty() {
        record.grouped = true;
        &raw[open..]
    } else if prefix.is_empty() {
        raw
    } else {
        return record;
    };

    let Some(first) = bracket_block(body) else {
        record.message = body.trim().to_string();
        return record;
    };
    let mut rest = &body[first.len() + 2..];

    let pointer = if is_pointer_block(first) {
        Some(first)
    } else {
        let (line, column) = parse_coordinates(first);
        record.line = line;
        record.column = column;
        match bracket_block(rest) {
            Some(pointer) => {
                rest = &rest[pointer.len() + 2..];
                Some(pointer)
            }
            None => None,
        }
    };

    let message = rest.trim();
    record.pointer = pointer
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    record.message = match &record.pointer {
        Some(p) => format!("[{p}] {message}"),
        None => message.to_string(),
    };
    record
}

/// Normalize a batch, reconstructing branch labels.
///
/// Members of `group_headers` are kept as-is and close any open branch.
pub fn normalize_batch<S: AsRef<str>>(
    diagnostics: &[S],
    group_headers: &HashSet<String>,
) -> Vec<ErrorRecord> {
    diagnostics
        .iter()
        .scan(None::<String>, |current_branch, raw| {
            let raw = raw.as_ref();
            if group_headers.contains(raw) {
                *current_branch = None;
                return Some(ErrorRecord::plain(raw));
            }
            let mut record = normalize(raw);
            if let Some(branch) = &record.branch {
                *current_branch = Some(branch.clone());
            } else if !record.grouped {
                *current_branch = None;
            }
            if record.branch.is_some() || record.grouped {
                if let Some(branch) = current_branch.as_deref() {
                    record.message = format!("- [Set {branch}]: {}", record.message);
                }
            }
            Some(record)
        })
        .collect()
}

/// Split an `N) ...` line into its branch label and the text after `)`.
///
/// The first `)` must come before the first `[` (at `open`) and must not start
/// the line. Everything before it is the label.
fn split_branch(raw: &str, open: usize) -> Option<(&str, &str)> {
    let close = raw.find(')')?;
    if close == 0 || close > open {
        return None;
    }
    let label = raw[..close].trim();
    if label.is_empty() {
        return None;
    }
    Some((label, raw[close + 1..].trim()))
}

/// Contents of a leading `[...]` block.
fn bracket_block(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('[')?;
    let close = inner.find(']')?;
    Some(&inner[..close])
}

fn is_pointer_block(block: &str) -> bool {
    block.is_empty() || block.starts_with('/') || block.starts_with('#')
}

fn parse_coordinates(block: &str) -> (usize, usize) {
    let mut parts = block.splitn(2, ',');
    let line = parts.next().and_then(|p| p.trim().parse().ok()).unwrap_or(0);
    let column = parts.next().and_then(|p| p.trim().parse().ok()).unwrap_or(0);
    (line, column)
}
