use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde_json_path::JsonPath;
use serde_json::Value;

use super::{Fixture, State};

/// Serves values out of a JSON document. State keys are JSONPath expressions
/// evaluated against the document, so request data can carry placeholders
/// such as `$.authors.hemingway.id`.
#[derive(Debug, Clone)]
pub struct JsonFixture {
    document: Value,
}

impl JsonFixture {
    pub fn new(document: Value) -> Self {
        Self { document }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading JSON fixture {}", path.display()))?;
        let document = serde_json::from_str(&contents)
            .with_context(|| format!("parsing JSON fixture {}", path.display()))?;
        Ok(Self::new(document))
    }

    fn select(&self, key: &str) -> Option<Value> {
        if !key.starts_with('$') {
            return None;
        }
        let path = JsonPath::parse(key).ok()?;
        path.query(&self.document).first().cloned()
    }
}

impl Fixture for JsonFixture {
    fn has_state(&self, key: &str) -> bool {
        self.select(key).is_some()
    }

    fn state(&self, key: &str) -> Option<State> {
        self.select(key).map(State::Value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn books() -> JsonFixture {
        JsonFixture::new(json!({
            "authors": {
                "hemingway": {"id": "author-1", "name": "Ernest Hemingway"}
            },
            "publishers": {
                "scribner": {"id": "publisher-1"}
            }
        }))
    }

    #[test]
    fn resolves_jsonpath_keys() {
        let fixture = books();
        assert!(fixture.has_state("$.authors.hemingway.id"));
        let state = fixture.state("$.authors.hemingway.id").unwrap();
        assert_eq!(state.as_str(), Some("author-1"));
    }

    #[test]
    fn supports_bracket_and_descendant_paths() {
        let fixture = books();
        let state = fixture.state("$['authors']['hemingway']['id']").unwrap();
        assert_eq!(state.as_str(), Some("author-1"));
        let state = fixture.state("$..scribner.id").unwrap();
        assert_eq!(state.as_str(), Some("publisher-1"));
    }

    #[test]
    fn unparsable_paths_are_not_state() {
        let fixture = books();
        assert!(!fixture.has_state("$[?(@.n == 99999999999999999999)]"));
        assert!(!fixture.has_state("$.authors["));
    }

    #[test]
    fn ignores_plain_strings_and_missing_paths() {
        let fixture = books();
        assert!(!fixture.has_state("authors"));
        assert!(!fixture.has_state("$.authors.faulkner.id"));
        assert!(fixture.state("title").is_none());
    }

    #[test]
    fn loads_from_file() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("fixtures.json");
        std::fs::write(&path, r#"{"publishers": {"scribner": {"id": "p-9"}}}"#)?;

        let fixture = JsonFixture::from_path(&path)?;
        let state = fixture.state("$.publishers.scribner.id").unwrap();
        assert_eq!(state.as_str(), Some("p-9"));
        Ok(())
    }

    #[test]
    fn reports_missing_file() {
        let err = JsonFixture::from_path(Path::new("does-not-exist.json")).unwrap_err();
        assert!(err.to_string().contains("reading JSON fixture"));
    }
}
