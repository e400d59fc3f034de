use std::time::Duration;

use thiserror::Error;

use crate::assertions::json::JsonFailure;

/// Runtime errors raised while evaluating a single test unit.
///
/// These abort the unit. Assertion mismatches are never reported through this
/// type; they surface as [`Failure`] records on the evaluation result.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("test unit referenced $LOCATION before executing an HTTP request")]
    LocationBeforeRequest,
    #[error("expected Location HTTP header in previous response")]
    ExpectedLocationHeader,
    #[error("fixture state for key {key} must be a string to rewrite a request data key")]
    FixtureState { key: String },
    #[error("serializing request data: {0}")]
    SerializeData(#[source] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("timed out after {0:?} waiting for HTTP response")]
    Timeout(Duration),
    #[error("decoding response body as JSON: {0}")]
    DecodeBody(#[source] serde_json::Error),
    #[error("unhandled extract type {0}")]
    UnsupportedBodyShape(&'static str),
    #[error("JSONPath {path} not found in response")]
    PathNotFound { path: String },
}

impl EvalError {
    /// Usage errors mean the test itself is malformed. The scenario must stop
    /// and the unit must never be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EvalError::LocationBeforeRequest)
    }
}

/// A single failed expectation, recorded with what was expected and what was
/// observed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Failure {
    #[error("expected HTTP status {expected} but got {got}")]
    StatusNotEqual { expected: u16, got: u16 },
    #[error("expected HTTP body to contain {0}")]
    NotInBody(String),
    #[error("expected HTTP headers {headers:?} to contain {expected}")]
    HeaderNotIn {
        expected: String,
        headers: Vec<String>,
    },
    #[error("expected HTTP header {name} to have value {expected} but got {got}")]
    HeaderValueNotEqual {
        name: String,
        expected: String,
        got: String,
    },
    #[error(transparent)]
    Json(#[from] JsonFailure),
    #[error("timeout exceeded after {0:?}")]
    Timeout(Duration),
}

/// Errors raised while turning YAML documents into test units.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("parsing YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("scenario: expected map{}", field_suffix(.0))]
    ScenarioExpectedMap(Option<String>),
    #[error("scenario: unknown field {0}")]
    ScenarioUnknownField(String),
    #[error("scenario: expected list for field {0}")]
    ScenarioExpectedList(String),
    #[error("scenario: invalid defaults: {0}")]
    InvalidDefaults(String),
    #[error("test {index}: expected map{}", field_suffix(.field))]
    ExpectedMap { index: usize, field: Option<String> },
    #[error("test {index}: expected scalar for field {field}")]
    ExpectedScalar { index: usize, field: String },
    #[error("test {index}: expected list of strings for field {field}")]
    ExpectedStringList { index: usize, field: String },
    #[error("test {index}: unknown field {field}")]
    UnknownField { index: usize, field: String },
    #[error("test {index}: invalid HTTP method specified: {method}. valid values: {valid}")]
    InvalidMethod {
        index: usize,
        method: String,
        valid: String,
    },
    #[error(
        "test {index}: multiple HTTP methods specified ({first:?}, {second:?}). \
         please specify a single HTTP method for each test spec."
    )]
    MultipleMethods {
        index: usize,
        first: String,
        second: String,
    },
    #[error(
        "test {index}: either specify a full HTTP spec in the `http` field or \
         specify one of the shortcuts (e.g. `http.get` or `GET`)"
    )]
    EitherShortcutOrHttp { index: usize },
    #[error("test {index}: missing URL")]
    MissingUrl { index: usize },
    #[error("test {index}: invalid value for {field}: {message}")]
    InvalidValue {
        index: usize,
        field: String,
        message: String,
    },
    #[error("test {index}: JSONPath {path} must start with the $ root")]
    JsonPathNoRoot { index: usize, path: String },
    #[error("test {index}: invalid JSONPath {path}: {message}")]
    JsonPathInvalid {
        index: usize,
        path: String,
        message: String,
    },
    #[error("test {index}: unknown path format {format} for {path}")]
    UnknownPathFormat {
        index: usize,
        path: String,
        format: String,
    },
    #[error("test {index}: unable to find JSONSchema file {path}")]
    MissingSchema { index: usize, path: String },
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(field) => format!(" for field {field}"),
        None => String::new(),
    }
}

/// Error aborting a scenario run.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("fixture {0} required by the scenario is not registered")]
    MissingFixture(String),
    #[error("test {index} ({title}): {source}")]
    Unit {
        index: usize,
        title: String,
        #[source]
        source: EvalError,
    },
}

impl ScenarioError {
    pub fn is_fatal(&self) -> bool {
        match self {
            ScenarioError::MissingFixture(_) => true,
            ScenarioError::Unit { source, .. } => source.is_fatal(),
        }
    }
}
