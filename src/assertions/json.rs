use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde_json_path::JsonPath;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub const PATH_FORMATS: [&str; 5] = ["date", "date-time", "uri", "uuid", "uuid4"];

/// Assertions about a JSON response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonExpect {
    /// Expected length of the response body in bytes.
    pub len: Option<usize>,
    /// JSONPath expression to the expected value rendered as a string.
    pub paths: BTreeMap<String, String>,
    /// JSONPath expression to the name of a format the value must satisfy.
    pub path_formats: BTreeMap<String, String>,
    /// JSON Schema file the whole document must validate against.
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum JsonFailure {
    #[error("expected JSON length of {expected} but got {got}")]
    LenNotEqual { expected: usize, got: usize },
    #[error("failed to unmarshal JSON response: {0}")]
    Unmarshal(String),
    #[error("JSONPath {0} not found in response")]
    PathNotFound(String),
    #[error("expected {expected} at JSONPath {path} but got {got}")]
    PathValueNotEqual {
        path: String,
        expected: String,
        got: String,
    },
    #[error("expected value at JSONPath {path} to be in {format} format but got {got}")]
    PathFormatNotMatch {
        path: String,
        format: String,
        got: String,
    },
    #[error("unable to load JSONSchema {path}: {message}")]
    SchemaInvalid { path: String, message: String },
    #[error("response does not satisfy JSONSchema {path}: {}", .errors.join("; "))]
    SchemaNotSatisfied { path: String, errors: Vec<String> },
}

/// First JSON failure found, with whether retrying could change the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonOutcome {
    pub failure: JsonFailure,
    pub terminal: bool,
}

impl JsonOutcome {
    fn retryable(failure: JsonFailure) -> Self {
        Self {
            failure,
            terminal: false,
        }
    }

    fn terminal(failure: JsonFailure) -> Self {
        Self {
            failure,
            terminal: true,
        }
    }
}

impl JsonExpect {
    /// Checks the body, stopping at the first failure.
    pub fn evaluate(&self, body: &[u8]) -> Option<JsonOutcome> {
        if let Some(expected) = self.len {
            if body.len() != expected {
                return Some(JsonOutcome::retryable(JsonFailure::LenNotEqual {
                    expected,
                    got: body.len(),
                }));
            }
        }
        if self.paths.is_empty() && self.path_formats.is_empty() && self.schema.is_none() {
            return None;
        }

        let document: Value = match serde_json::from_slice(body) {
            Ok(document) => document,
            Err(err) => {
                return Some(JsonOutcome::terminal(JsonFailure::Unmarshal(
                    err.to_string(),
                )))
            }
        };

        for (path, expected) in &self.paths {
            let got = match select_first(path, &document) {
                Ok(got) => got,
                Err(failure) => return Some(JsonOutcome::retryable(failure)),
            };
            let got = render(&got);
            if &got != expected {
                return Some(JsonOutcome::retryable(JsonFailure::PathValueNotEqual {
                    path: path.clone(),
                    expected: expected.clone(),
                    got,
                }));
            }
        }

        for (path, format) in &self.path_formats {
            let got = match select_first(path, &document) {
                Ok(got) => got,
                Err(failure) => return Some(JsonOutcome::retryable(failure)),
            };
            let got = render(&got);
            if !matches_format(format, &got) {
                return Some(JsonOutcome::retryable(JsonFailure::PathFormatNotMatch {
                    path: path.clone(),
                    format: format.clone(),
                    got,
                }));
            }
        }

        if let Some(schema_path) = &self.schema {
            return validate_schema(schema_path, &document);
        }
        None
    }
}

fn select_first(path: &str, document: &Value) -> Result<Value, JsonFailure> {
    let not_found = || JsonFailure::PathNotFound(path.to_string());
    JsonPath::parse(path)
        .map_err(|_| not_found())?
        .query(document)
        .first()
        .cloned()
        .ok_or_else(not_found)
}

/// Strings compare by content, everything else by its JSON text.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn is_known_format(format: &str) -> bool {
    PATH_FORMATS.contains(&format)
}

fn matches_format(format: &str, value: &str) -> bool {
    match format {
        "uuid" => Uuid::parse_str(value).is_ok(),
        "uuid4" => Uuid::parse_str(value)
            .map(|id| id.get_version_num() == 4)
            .unwrap_or(false),
        "date" => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        "date-time" => chrono::DateTime::parse_from_rfc3339(value).is_ok(),
        "uri" => url::Url::parse(value).is_ok(),
        _ => false,
    }
}

fn validate_schema(path: &Path, document: &Value) -> Option<JsonOutcome> {
    let display = path.display().to_string();
    let schema = match load_schema(path) {
        Ok(schema) => schema,
        Err(message) => {
            return Some(JsonOutcome::terminal(JsonFailure::SchemaInvalid {
                path: display,
                message,
            }))
        }
    };
    let validator = match jsonschema::validator_for(&schema) {
        Ok(validator) => validator,
        Err(err) => {
            return Some(JsonOutcome::terminal(JsonFailure::SchemaInvalid {
                path: display,
                message: err.to_string(),
            }))
        }
    };
    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|err| format!("{} at {}", err, err.instance_path))
        .collect();
    if errors.is_empty() {
        return None;
    }
    Some(JsonOutcome::retryable(JsonFailure::SchemaNotSatisfied {
        path: display,
        errors,
    }))
}

fn load_schema(path: &Path) -> Result<Value, String> {
    let contents = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&contents).map_err(|err| err.to_string())
}
