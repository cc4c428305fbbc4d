//! # Document Preparation
//!
//! Turns raw input into the form that is validated:
//!
//! 1. Detect the input format (JSON or YAML) from the type's YAML support.
//! 2. Parse. Invalid input fails with [`ValidationError::MalformedInput`].
//! 3. Apply the type's preprocessing pointer, if any. A pointer that is
//!    malformed or selects nothing fails with [`ValidationError::Preprocessing`].
//! 4. Pretty-print JSON with stable two-space indentation and run the
//!    location-tracking parse over the pretty text, so reported lines refer
//!    to the pretty-printed document.
//!
//! YAML documents are not pretty-printed and carry no line information.

use serde_json::Value;

use jsv_core::ValidationError;

use crate::config::YamlSupport;
use crate::location::{LocatedDocument, Position};

/// Syntax of the submitted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// JSON text.
    Json,
    /// YAML text.
    Yaml,
}

impl InputFormat {
    /// Decide the format of `text` under the given YAML support.
    ///
    /// With [`YamlSupport::Support`] the first line decides: content starting
    /// with `{` or `[` is JSON, anything else is YAML.
    pub fn detect(text: &str, support: YamlSupport) -> Self {
        match support {
            YamlSupport::None => Self::Json,
            YamlSupport::Force => Self::Yaml,
            YamlSupport::Support => {
                let first_line = text
                    .trim_start_matches('\u{feff}')
                    .lines()
                    .next()
                    .unwrap_or("")
                    .trim_start();
                if first_line.starts_with('{') || first_line.starts_with('[') {
                    Self::Json
                } else {
                    Self::Yaml
                }
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }
}

/// A document ready for validation.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    format: InputFormat,
    text: String,
    value: Value,
    located: Option<LocatedDocument>,
}

impl PreparedDocument {
    /// Prepare `raw` for validation.
    pub fn prepare(
        raw: &str,
        yaml: YamlSupport,
        preprocessor: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let format = InputFormat::detect(raw, yaml);
        let parsed = match format {
            InputFormat::Json => serde_json::from_str::<Value>(raw).map_err(|e| malformed(format, e))?,
            InputFormat::Yaml => {
                let yaml: serde_yaml::Value =
                    serde_yaml::from_str(raw).map_err(|e| malformed(format, e))?;
                yaml_to_json(yaml).map_err(|e| malformed(format, e))?
            }
        };
        let value = match preprocessor {
            Some(expression) => preprocess(parsed, expression)?,
            None => parsed,
        };

        match format {
            InputFormat::Json => {
                let text = serde_json::to_string_pretty(&value).map_err(|e| malformed(format, e))?;
                let located = match LocatedDocument::parse(&text) {
                    Ok(located) => Some(located),
                    Err(e) => {
                        tracing::warn!(error = %e, "location tracking unavailable for document");
                        None
                    }
                };
                Ok(Self {
                    format,
                    text,
                    value,
                    located,
                })
            }
            InputFormat::Yaml => {
                let text = if preprocessor.is_some() {
                    serde_yaml::to_string(&value).map_err(|e| malformed(format, e))?
                } else {
                    raw.to_string()
                };
                Ok(Self {
                    format,
                    text,
                    value,
                    located: None,
                })
            }
        }
    }

    /// Prepare plain JSON without preprocessing.
    pub fn json(raw: &str) -> Result<Self, ValidationError> {
        Self::prepare(raw, YamlSupport::None, None)
    }

    /// Detected input format.
    pub fn format(&self) -> InputFormat {
        self.format
    }

    /// The text validated and reported against.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The parsed content.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Position of the node at `pointer`, `(0, 0)` when unknown.
    pub fn locate(&self, pointer: &str) -> Position {
        self.located
            .as_ref()
            .map(|doc| doc.locate(pointer))
            .unwrap_or_default()
    }

    /// Number of items when the content is an array.
    pub fn item_count(&self) -> Option<usize> {
        self.value.as_array().map(Vec::len)
    }
}

fn malformed(format: InputFormat, e: impl std::fmt::Display) -> ValidationError {
    ValidationError::MalformedInput {
        format: format.label(),
        reason: e.to_string(),
    }
}

fn preprocess(value: Value, expression: &str) -> Result<Value, ValidationError> {
    let failure = |reason: &str| ValidationError::Preprocessing {
        expression: expression.to_string(),
        reason: reason.to_string(),
    };
    let pointer = expression.trim();
    let pointer = pointer.strip_prefix('#').unwrap_or(pointer);
    if !pointer.is_empty() && !pointer.starts_with('/') {
        return Err(failure("expression is not a JSON Pointer"));
    }
    value
        .pointer(pointer)
        .cloned()
        .ok_or_else(|| failure("expression selected no content"))
}

/// Convert parsed YAML into the JSON data model the schemas are written for.
///
/// Tags are discarded in favour of the tagged value. Scalar mapping keys
/// become their text form; sequence or mapping keys have no JSON equivalent.
fn yaml_to_json(yaml: serde_yaml::Value) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;

    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => yaml_number(&n)?,
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(entries) => {
            let mut object = serde_json::Map::with_capacity(entries.len());
            for (key, value) in entries {
                object.insert(mapping_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_number(n: &serde_yaml::Number) -> Result<Value, String> {
    if let Some(i) = n.as_i64() {
        return Ok(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Ok(u.into());
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("number {n} has no JSON representation"))
}

fn mapping_key(key: serde_yaml::Value) -> Result<String, String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        serde_yaml::Value::Tagged(tagged) => mapping_key(tagged.value),
        other => Err(format!("mapping key {other:?} is not a scalar")),
    }
}
