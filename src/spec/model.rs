use std::{collections::BTreeMap, fmt, str::FromStr, time::Duration};

use serde_json::Value;

use crate::assertions::json::JsonExpect;
use crate::config::RetryPolicy;

pub const LOCATION_SENTINEL: &str = "$LOCATION";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::Delete,
        Method::Get,
        Method::Patch,
        Method::Post,
        Method::Put,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Mutating methods must never be re-issued automatically.
    pub fn is_idempotent_read(&self) -> bool {
        matches!(self, Method::Get)
    }

    pub fn valid_names() -> String {
        Method::ALL
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(s.to_string()),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(value: Method) -> Self {
        match value {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// The HTTP call a test unit performs.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub url: String,
    pub method: Method,
    pub data: Option<Value>,
}

impl Action {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_location(&self) -> bool {
        self.url.eq_ignore_ascii_case(LOCATION_SENTINEL)
    }
}

/// Assertions about the HTTP response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expect {
    pub status: Option<u16>,
    pub headers: Vec<String>,
    pub strings: Vec<String>,
    pub json: Option<JsonExpect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarEntry {
    /// JSONPath expression selecting the value from the response body.
    pub from: String,
}

pub type Variables = BTreeMap<String, VarEntry>;

/// One test unit: a single request and the expectations about its response.
#[derive(Debug, Clone, PartialEq)]
pub struct Spec {
    pub index: usize,
    pub name: Option<String>,
    pub description: Option<String>,
    pub action: Action,
    pub assert: Option<Expect>,
    pub var: Variables,
    pub timeout: Option<Duration>,
    pub retry: Option<RetryPolicy>,
}

impl Spec {
    pub fn new(index: usize, action: Action) -> Self {
        Self {
            index,
            name: None,
            description: None,
            action,
            assert: None,
            var: Variables::new(),
            timeout: None,
            retry: None,
        }
    }

    pub fn title(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}:{}", self.action.method, self.action.url),
        }
    }

    /// Returns the retry policy for this unit. `None` means the runner's
    /// default applies.
    pub fn retry(&self) -> Option<RetryPolicy> {
        if let Some(policy) = &self.retry {
            return Some(policy.clone());
        }
        if self.action.method.is_idempotent_read() {
            return None;
        }
        Some(RetryPolicy::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!(" Patch ".parse::<Method>(), Ok(Method::Patch));
        assert!("HEAD".parse::<Method>().is_err());
    }

    #[test]
    fn title_defaults_to_method_and_url() {
        let spec = Spec::new(0, Action::new(Method::Post, "/books"));
        assert_eq!(spec.title(), "POST:/books");

        let mut named = spec.clone();
        named.name = Some("create a book".to_string());
        assert_eq!(named.title(), "create a book");
    }

    #[test]
    fn mutating_methods_never_retry() {
        for method in [Method::Post, Method::Put, Method::Patch, Method::Delete] {
            let spec = Spec::new(0, Action::new(method, "/books"));
            assert_eq!(spec.retry(), Some(RetryPolicy::none()));
        }
        let get = Spec::new(0, Action::new(Method::Get, "/books"));
        assert_eq!(get.retry(), None);
    }

    #[test]
    fn explicit_retry_overrides_method_default() {
        let mut spec = Spec::new(0, Action::new(Method::Post, "/books"));
        let policy = RetryPolicy {
            attempts: 5,
            interval: Duration::from_millis(10),
            exponential: false,
        };
        spec.retry = Some(policy.clone());
        assert_eq!(spec.retry(), Some(policy));
    }

    #[test]
    fn location_sentinel_is_case_insensitive() {
        assert!(Action::new(Method::Get, "$location").is_location());
        assert!(Action::new(Method::Get, "$LOCATION").is_location());
        assert!(!Action::new(Method::Get, "/books").is_location());
    }
}
