pub mod json;

use reqwest::header::HeaderMap;

use crate::error::Failure;
use crate::executor::CapturedResponse;
use crate::spec::Expect;

/// Result of checking an [`Expect`] against a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub failures: Vec<Failure>,
    /// Set when retrying the unit cannot change the result.
    pub terminal: bool,
}

impl Outcome {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(failure: Failure) -> Self {
        Self {
            failures: vec![failure],
            terminal: false,
        }
    }
}

/// Evaluates status, JSON, body strings and headers in that order and
/// reports only the first category that fails.
pub fn evaluate(expect: &Expect, response: &CapturedResponse, body: &[u8]) -> Outcome {
    if let Some(expected) = expect.status {
        let got = response.status.as_u16();
        if got != expected {
            return Outcome::fail(Failure::StatusNotEqual { expected, got });
        }
    }

    if let Some(json) = &expect.json {
        if let Some(outcome) = json.evaluate(body) {
            return Outcome {
                failures: vec![Failure::Json(outcome.failure)],
                terminal: outcome.terminal,
            };
        }
    }

    if !expect.strings.is_empty() {
        let text = String::from_utf8_lossy(body);
        for expected in &expect.strings {
            if !text.contains(expected.as_str()) {
                return Outcome::fail(Failure::NotInBody(expected.clone()));
            }
        }
    }

    for expected in &expect.headers {
        if let Some(failure) = check_header(&response.headers, expected) {
            return Outcome::fail(failure);
        }
    }

    Outcome::default()
}

/// `Key` checks presence; `Key: Value` also compares the value
/// case-insensitively.
fn check_header(headers: &HeaderMap, expected: &str) -> Option<Failure> {
    let (name, value) = match expected.split_once(':') {
        Some((name, value)) => (name.trim(), Some(value.trim())),
        None => (expected.trim(), None),
    };
    let Some(got) = headers.get(name) else {
        return Some(Failure::HeaderNotIn {
            expected: expected.to_string(),
            headers: header_names(headers),
        });
    };
    let value = value?;
    let got = got.to_str().unwrap_or_default().trim();
    if got.to_lowercase() == value.to_lowercase() {
        return None;
    }
    Some(Failure::HeaderValueNotEqual {
        name: name.to_string(),
        expected: value.to_string(),
        got: got.to_string(),
    })
}

fn header_names(headers: &HeaderMap) -> Vec<String> {
    let mut names: Vec<String> = headers.keys().map(|k| k.as_str().to_string()).collect();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::json::{JsonExpect, JsonFailure};
    use reqwest::{header::HeaderValue, StatusCode};
    use url::Url;

    fn response(status: u16, headers: &[(&'static str, &str)]) -> CapturedResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        CapturedResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: map,
            url: Url::parse("http://localhost/books").unwrap(),
        }
    }

    #[test]
    fn empty_expectation_passes() {
        let outcome = evaluate(&Expect::default(), &response(500, &[]), b"");
        assert!(outcome.ok());
    }

    #[test]
    fn header_key_only_checks_presence() {
        let expect = Expect {
            headers: vec!["X-Foo".to_string()],
            ..Expect::default()
        };
        assert!(evaluate(&expect, &response(200, &[("x-foo", "anything")]), b"").ok());

        let outcome = evaluate(&expect, &response(200, &[("x-bar", "1")]), b"");
        assert!(matches!(
            outcome.failures.as_slice(),
            [Failure::HeaderNotIn { headers, .. }] if headers == &vec!["x-bar".to_string()]
        ));
    }

    #[test]
    fn header_value_compares_case_insensitively() {
        let expect = Expect {
            headers: vec!["X-Foo: bar".to_string()],
            ..Expect::default()
        };
        assert!(evaluate(&expect, &response(200, &[("x-foo", "BAR")]), b"").ok());

        let outcome = evaluate(&expect, &response(200, &[("x-foo", "baz")]), b"");
        assert_eq!(
            outcome.failures,
            vec![Failure::HeaderValueNotEqual {
                name: "X-Foo".to_string(),
                expected: "bar".to_string(),
                got: "baz".to_string(),
            }]
        );

        let missing = evaluate(&expect, &response(200, &[]), b"");
        assert!(matches!(
            missing.failures.as_slice(),
            [Failure::HeaderNotIn { .. }]
        ));
    }

    #[test]
    fn strings_must_all_appear() {
        let expect = Expect {
            strings: vec!["Hemingway".to_string(), "Faulkner".to_string()],
            ..Expect::default()
        };
        let outcome = evaluate(&expect, &response(200, &[]), b"Ernest Hemingway");
        assert_eq!(
            outcome.failures,
            vec![Failure::NotInBody("Faulkner".to_string())]
        );
    }

    #[test]
    fn only_first_failing_category_is_reported() {
        let expect = Expect {
            status: Some(201),
            headers: vec!["Location".to_string()],
            strings: vec!["created".to_string()],
            json: Some(JsonExpect {
                len: Some(0),
                ..JsonExpect::default()
            }),
        };
        let outcome = evaluate(&expect, &response(400, &[]), b"bad request");
        assert_eq!(
            outcome.failures,
            vec![Failure::StatusNotEqual {
                expected: 201,
                got: 400
            }]
        );

        let outcome = evaluate(&expect, &response(201, &[]), b"bad request");
        assert_eq!(
            outcome.failures,
            vec![Failure::Json(JsonFailure::LenNotEqual {
                expected: 0,
                got: 11
            })]
        );
    }

    #[test]
    fn json_terminal_flag_is_propagated() {
        let mut json = JsonExpect::default();
        json.paths.insert("$.id".to_string(), "1".to_string());
        let expect = Expect {
            json: Some(json),
            strings: vec!["never checked".to_string()],
            ..Expect::default()
        };
        let outcome = evaluate(&expect, &response(200, &[]), b"not json");
        assert!(outcome.terminal);
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(
            outcome.failures[0],
            Failure::Json(JsonFailure::Unmarshal(_))
        ));
    }

    #[test]
    fn not_found_with_empty_body_passes() {
        let expect = Expect {
            status: Some(404),
            json: Some(JsonExpect {
                len: Some(0),
                ..JsonExpect::default()
            }),
            ..Expect::default()
        };
        let outcome = evaluate(&expect, &response(404, &[]), b"");
        assert!(outcome.ok());
        assert!(!outcome.terminal);
    }
}
