use serde_json::{Map, Value};
use tracing::debug;

use crate::error::EvalError;
use crate::fixture::{Fixtures, State};

/// Rewrites request data in place, replacing map keys and string values that
/// a fixture claims as state with the fixture's value for them.
///
/// Keys are rewritten independently of their values. Sequence elements are
/// visited like any other value, so a placeholder nested anywhere in the
/// payload is substituted.
pub fn preprocess(data: Option<&mut Value>, fixtures: &Fixtures) -> Result<(), EvalError> {
    let Some(data) = data else {
        return Ok(());
    };
    if fixtures.is_empty() {
        return Ok(());
    }
    rewrite_value(data, fixtures)
}

fn rewrite_value(value: &mut Value, fixtures: &Fixtures) -> Result<(), EvalError> {
    match value {
        Value::Object(map) => rewrite_map(map, fixtures),
        Value::Array(items) => {
            for item in items.iter_mut() {
                rewrite_value(item, fixtures)?;
            }
            Ok(())
        }
        Value::String(s) => {
            if let Some(State::Value(replacement)) = fixtures.lookup(s) {
                debug!(placeholder = %s, value = %replacement, "substituting fixture state");
                *value = replacement;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn rewrite_map(map: &mut Map<String, Value>, fixtures: &Fixtures) -> Result<(), EvalError> {
    let entries = std::mem::take(map);
    for (key, mut val) in entries {
        let key = rewrite_key(key, fixtures)?;
        rewrite_value(&mut val, fixtures)?;
        map.insert(key, val);
    }
    Ok(())
}

fn rewrite_key(key: String, fixtures: &Fixtures) -> Result<String, EvalError> {
    match fixtures.lookup(&key) {
        None => Ok(key),
        Some(state) => match state.as_str() {
            Some(replacement) => {
                debug!(placeholder = %key, key = %replacement, "substituting fixture key");
                Ok(replacement.to_string())
            }
            None => Err(EvalError::FixtureState { key }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::tests::MapFixture;
    use crate::fixture::JsonFixture;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fixtures() -> Fixtures {
        let mut fixtures = Fixtures::new();
        fixtures.register(
            "books_data",
            MapFixture::new([
                ("$.authors.hemingway.id", json!("author-1")),
                ("$.publishers.scribner.id", json!("publisher-1")),
                ("$.keys.title", json!("book_title")),
                ("$.counts.pages", json!(480)),
            ]),
        );
        fixtures.register(
            "shadowed",
            MapFixture::new([("$.authors.hemingway.id", json!("author-2"))]),
        );
        fixtures
    }

    #[test]
    fn unparsable_placeholders_pass_through() -> Result<(), EvalError> {
        let mut fixtures = Fixtures::new();
        fixtures.register(
            "books_data",
            JsonFixture::new(json!({"authors": {"hemingway": {"id": "author-1"}}})),
        );
        let mut data = json!({
            "filter": "$[?(@.n == 99999999999999999999)]",
            "$.authors[": "broken",
            "author_id": "$.authors.hemingway.id"
        });
        preprocess(Some(&mut data), &fixtures)?;
        assert_eq!(
            data,
            json!({
                "filter": "$[?(@.n == 99999999999999999999)]",
                "$.authors[": "broken",
                "author_id": "author-1"
            })
        );
        Ok(())
    }

    #[test]
    fn absent_data_is_a_no_op() -> Result<(), EvalError> {
        preprocess(None, &fixtures())
    }

    #[test]
    fn map_values_are_substituted_and_others_pass_through() -> Result<(), EvalError> {
        let mut data = json!({
            "title": "For Whom The Bell Tolls",
            "pages": "$.counts.pages",
            "author_id": "$.authors.hemingway.id",
            "nested": {"publisher_id": "$.publishers.scribner.id"}
        });
        preprocess(Some(&mut data), &fixtures())?;
        assert_eq!(
            data,
            json!({
                "title": "For Whom The Bell Tolls",
                "pages": 480,
                "author_id": "author-1",
                "nested": {"publisher_id": "publisher-1"}
            })
        );
        Ok(())
    }

    #[test]
    fn array_of_maps_is_substituted() -> Result<(), EvalError> {
        let mut data = json!([
            {"title": "For Whom The Bell Tolls", "author_id": "$.authors.hemingway.id"},
            {"title": "To Have and Have Not", "publisher_id": "$.publishers.scribner.id"}
        ]);
        preprocess(Some(&mut data), &fixtures())?;
        assert_eq!(data[0]["author_id"], json!("author-1"));
        assert_eq!(data[1]["publisher_id"], json!("publisher-1"));
        assert_eq!(data[1]["title"], json!("To Have and Have Not"));
        Ok(())
    }

    #[test]
    fn sequences_inside_maps_are_substituted() -> Result<(), EvalError> {
        let mut data = json!({"authors": ["$.authors.hemingway.id", "unknown", 3]});
        preprocess(Some(&mut data), &fixtures())?;
        assert_eq!(data, json!({"authors": ["author-1", "unknown", 3]}));
        Ok(())
    }

    #[test]
    fn keys_are_rewritten() -> Result<(), EvalError> {
        let mut data = json!({"$.keys.title": "Islands in the Stream"});
        preprocess(Some(&mut data), &fixtures())?;
        assert_eq!(data, json!({"book_title": "Islands in the Stream"}));
        Ok(())
    }

    #[test]
    fn non_string_state_cannot_replace_a_key() {
        let mut data = json!({"$.counts.pages": 1});
        let err = preprocess(Some(&mut data), &fixtures()).unwrap_err();
        assert!(matches!(err, EvalError::FixtureState { .. }));
    }

    #[test]
    fn first_registered_fixture_wins() -> Result<(), EvalError> {
        let mut data = json!({"author_id": "$.authors.hemingway.id"});
        preprocess(Some(&mut data), &fixtures())?;
        assert_eq!(data["author_id"], json!("author-1"));
        Ok(())
    }
}
