use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde_json_path::JsonPath;
use serde_yaml::{Mapping, Value};

use crate::assertions::json::{is_known_format, JsonExpect, PATH_FORMATS};
use crate::config::{parse_duration, RetryConfig};
use crate::error::ParseError;

use super::model::{Action, Expect, Method, Spec, VarEntry, Variables};

#[derive(Default)]
struct PartialAction {
    url: Option<String>,
    method: Option<Method>,
    data: Option<serde_json::Value>,
}

impl PartialAction {
    fn is_empty(&self) -> bool {
        self.url.is_none() && self.method.is_none()
    }

    fn claimed_by(&self) -> String {
        match self.method {
            Some(method) => method.to_string(),
            None => "url".to_string(),
        }
    }
}

/// Maps a shortcut field such as `GET`, `get` or `http.get` to its method.
fn shortcut_method(key: &str) -> Option<Method> {
    let verb = match key.strip_prefix("http.") {
        Some(verb) if verb.chars().all(|c| c.is_ascii_lowercase()) => verb,
        Some(_) => return None,
        None if key.chars().all(|c| c.is_ascii_lowercase())
            || key.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            key
        }
        None => return None,
    };
    verb.parse().ok()
}

/// Parses one test unit from its YAML mapping. `base_dir` anchors relative
/// JSON Schema paths.
pub fn parse_spec(index: usize, node: &Value, base_dir: &Path) -> Result<Spec, ParseError> {
    let map = node
        .as_mapping()
        .ok_or(ParseError::ExpectedMap { index, field: None })?;

    // Shortcut fields first, everything else after.
    let mut action = PartialAction::default();
    let mut data = None;
    for (key_node, val) in map {
        let key = key_str(index, key_node)?;
        match key {
            "url" => {
                let url = scalar(index, key, val)?;
                if action.url.is_some() {
                    return Err(ParseError::MultipleMethods {
                        index,
                        first: action.claimed_by(),
                        second: key.to_string(),
                    });
                }
                action.url = Some(url);
            }
            "method" => {
                let method = parse_method(index, val)?;
                if let Some(first) = action.method {
                    return Err(ParseError::MultipleMethods {
                        index,
                        first: first.to_string(),
                        second: method.to_string(),
                    });
                }
                action.method = Some(method);
            }
            "data" => data = Some(to_json(index, key, val)?),
            other => {
                if let Some(method) = shortcut_method(other) {
                    let url = scalar(index, other, val)?;
                    if !action.is_empty() {
                        return Err(ParseError::MultipleMethods {
                            index,
                            first: action.claimed_by(),
                            second: method.to_string(),
                        });
                    }
                    action.method = Some(method);
                    action.url = Some(url);
                }
            }
        }
    }

    let mut spec_name = None;
    let mut description = None;
    let mut timeout = None;
    let mut retry = None;
    let mut assert = None;
    let mut vars = Variables::new();
    for (key_node, val) in map {
        let key = key_str(index, key_node)?;
        match key {
            "http" => {
                let http = val.as_mapping().ok_or_else(|| expected_map(index, key))?;
                if !action.is_empty() {
                    return Err(ParseError::EitherShortcutOrHttp { index });
                }
                action = parse_http(index, http)?;
            }
            "var" => {
                let mapping = val.as_mapping().ok_or_else(|| expected_map(index, key))?;
                vars = parse_vars(index, mapping)?;
            }
            "assert" => {
                let mapping = val.as_mapping().ok_or_else(|| expected_map(index, key))?;
                assert = Some(parse_expect(index, mapping, base_dir)?);
            }
            "name" => spec_name = Some(scalar(index, key, val)?),
            "description" => description = Some(scalar(index, key, val)?),
            "timeout" => timeout = Some(parse_timeout(index, val)?),
            "retry" => {
                let config: RetryConfig = serde_yaml::from_value(val.clone())
                    .map_err(|err| invalid(index, key, err))?;
                retry = Some(config.into_policy().map_err(|err| invalid(index, key, err))?);
            }
            "url" | "method" | "data" => continue,
            other if shortcut_method(other).is_some() => continue,
            other => {
                return Err(ParseError::UnknownField {
                    index,
                    field: other.to_string(),
                })
            }
        }
    }

    if action.data.is_none() {
        action.data = data;
    }
    let url = action
        .url
        .filter(|url| !url.is_empty())
        .ok_or(ParseError::MissingUrl { index })?;
    // a bare url is a GET
    let method = action.method.unwrap_or(Method::Get);

    Ok(Spec {
        index,
        name: spec_name,
        description,
        action: Action {
            url,
            method,
            data: action.data,
        },
        assert,
        var: vars,
        timeout,
        retry,
    })
}

fn parse_http(index: usize, map: &Mapping) -> Result<PartialAction, ParseError> {
    let mut action = PartialAction::default();
    for (key_node, val) in map {
        let key = key_str(index, key_node)?;
        match key {
            "url" => action.url = Some(scalar(index, key, val)?),
            "method" => {
                let method = parse_method(index, val)?;
                if let Some(first) = action.method {
                    return Err(ParseError::MultipleMethods {
                        index,
                        first: first.to_string(),
                        second: method.to_string(),
                    });
                }
                action.method = Some(method);
            }
            "data" => action.data = Some(to_json(index, key, val)?),
            other => match shortcut_method(other) {
                Some(method) if !other.starts_with("http.") => {
                    if let Some(first) = action.method {
                        return Err(ParseError::MultipleMethods {
                            index,
                            first: first.to_string(),
                            second: method.to_string(),
                        });
                    }
                    action.method = Some(method);
                    action.url = Some(scalar(index, other, val)?);
                }
                _ => {
                    return Err(ParseError::UnknownField {
                        index,
                        field: format!("http.{other}"),
                    })
                }
            },
        }
    }
    Ok(action)
}

fn parse_expect(index: usize, map: &Mapping, base_dir: &Path) -> Result<Expect, ParseError> {
    let mut expect = Expect::default();
    for (key_node, val) in map {
        let key = key_str(index, key_node)?;
        match key {
            "status" => {
                let status = val
                    .as_u64()
                    .and_then(|code| u16::try_from(code).ok())
                    .filter(|code| (100..=999).contains(code))
                    .ok_or_else(|| invalid(index, "assert.status", "expected HTTP status code"))?;
                expect.status = Some(status);
            }
            "headers" => expect.headers = string_list(index, "assert.headers", val)?,
            "strings" => expect.strings = string_list(index, "assert.strings", val)?,
            "json" => {
                let mapping = val
                    .as_mapping()
                    .ok_or_else(|| expected_map(index, "assert.json"))?;
                expect.json = Some(parse_json_expect(index, mapping, base_dir)?);
            }
            other => {
                return Err(ParseError::UnknownField {
                    index,
                    field: format!("assert.{other}"),
                })
            }
        }
    }
    Ok(expect)
}

fn parse_json_expect(
    index: usize,
    map: &Mapping,
    base_dir: &Path,
) -> Result<JsonExpect, ParseError> {
    let mut expect = JsonExpect::default();
    for (key_node, val) in map {
        let key = key_str(index, key_node)?;
        match key {
            "len" | "length" => {
                let len = val
                    .as_u64()
                    .and_then(|len| usize::try_from(len).ok())
                    .ok_or_else(|| invalid(index, "assert.json.len", "expected integer"))?;
                expect.len = Some(len);
            }
            "paths" => {
                let paths = string_map(index, "assert.json.paths", val)?;
                for path in paths.keys() {
                    validate_jsonpath(index, path)?;
                }
                expect.paths = paths;
            }
            "path_formats" | "path-formats" => {
                let formats = string_map(index, "assert.json.path_formats", val)?;
                for (path, format) in &formats {
                    validate_jsonpath(index, path)?;
                    if !is_known_format(format) {
                        return Err(ParseError::UnknownPathFormat {
                            index,
                            path: path.clone(),
                            format: format!("{format} (valid: {})", PATH_FORMATS.join(",")),
                        });
                    }
                }
                expect.path_formats = formats;
            }
            "schema" => {
                let raw = scalar(index, "assert.json.schema", val)?;
                expect.schema = Some(resolve_schema(index, &raw, base_dir)?);
            }
            other => {
                return Err(ParseError::UnknownField {
                    index,
                    field: format!("assert.json.{other}"),
                })
            }
        }
    }
    Ok(expect)
}

fn resolve_schema(index: usize, raw: &str, base_dir: &Path) -> Result<PathBuf, ParseError> {
    let stripped = raw.strip_prefix("file://").unwrap_or(raw);
    let candidate = Path::new(stripped);
    let path = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };
    if !path.is_file() {
        return Err(ParseError::MissingSchema {
            index,
            path: path.display().to_string(),
        });
    }
    Ok(path)
}

fn parse_vars(index: usize, map: &Mapping) -> Result<Variables, ParseError> {
    let mut vars = Variables::new();
    for (key_node, val) in map {
        let name = key_str(index, key_node)?;
        let field = format!("var.{name}");
        let entry = val.as_mapping().ok_or_else(|| expected_map(index, &field))?;
        let mut from = None;
        for (entry_key, entry_val) in entry {
            match key_str(index, entry_key)? {
                "from" => {
                    let path = scalar(index, &field, entry_val)?;
                    validate_jsonpath(index, &path)?;
                    from = Some(path);
                }
                other => {
                    return Err(ParseError::UnknownField {
                        index,
                        field: format!("{field}.{other}"),
                    })
                }
            }
        }
        let from = from.ok_or_else(|| invalid(index, &field, "missing `from` JSONPath"))?;
        vars.insert(name.to_string(), VarEntry { from });
    }
    Ok(vars)
}

fn validate_jsonpath(index: usize, path: &str) -> Result<(), ParseError> {
    if !path.starts_with('$') {
        return Err(ParseError::JsonPathNoRoot {
            index,
            path: path.to_string(),
        });
    }
    JsonPath::parse(path)
        .map(|_| ())
        .map_err(|err| ParseError::JsonPathInvalid {
            index,
            path: path.to_string(),
            message: err.to_string(),
        })
}

fn parse_timeout(index: usize, val: &Value) -> Result<std::time::Duration, ParseError> {
    let raw = match val {
        Value::Mapping(map) => map
            .get("after")
            .ok_or_else(|| invalid(index, "timeout", "missing `after`"))
            .and_then(|after| scalar(index, "timeout.after", after))?,
        other => scalar(index, "timeout", other)?,
    };
    parse_duration(&raw).map_err(|err| invalid(index, "timeout", err))
}

fn parse_method(index: usize, val: &Value) -> Result<Method, ParseError> {
    let raw = scalar(index, "method", val)?;
    raw.parse().map_err(|method| ParseError::InvalidMethod {
        index,
        method,
        valid: Method::valid_names(),
    })
}

fn key_str(index: usize, key: &Value) -> Result<&str, ParseError> {
    key.as_str().ok_or_else(|| ParseError::ExpectedScalar {
        index,
        field: format!("{key:?}"),
    })
}

fn scalar(index: usize, field: &str, val: &Value) -> Result<String, ParseError> {
    match val {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ParseError::ExpectedScalar {
            index,
            field: field.to_string(),
        }),
    }
}

fn string_list(index: usize, field: &str, val: &Value) -> Result<Vec<String>, ParseError> {
    let expected = || ParseError::ExpectedStringList {
        index,
        field: field.to_string(),
    };
    match val {
        Value::Sequence(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(expected))
            .collect(),
        Value::String(s) => Ok(vec![s.clone()]),
        _ => Err(expected()),
    }
}

fn string_map(
    index: usize,
    field: &str,
    val: &Value,
) -> Result<BTreeMap<String, String>, ParseError> {
    let map = val.as_mapping().ok_or_else(|| expected_map(index, field))?;
    let mut out = BTreeMap::new();
    for (key, value) in map {
        out.insert(
            key_str(index, key)?.to_string(),
            scalar(index, field, value)?,
        );
    }
    Ok(out)
}

fn to_json(index: usize, field: &str, val: &Value) -> Result<serde_json::Value, ParseError> {
    serde_json::to_value(val).map_err(|err| invalid(index, field, err))
}

fn expected_map(index: usize, field: &str) -> ParseError {
    ParseError::ExpectedMap {
        index,
        field: Some(field.to_string()),
    }
}

fn invalid(index: usize, field: &str, message: impl std::fmt::Display) -> ParseError {
    ParseError::InvalidValue {
        index,
        field: field.to_string(),
        message: message.to_string(),
    }
}
