use reqwest::header::LOCATION;

use crate::error::EvalError;
use crate::session::Session;
use crate::spec::Action;

/// Returns the URL the action's request is sent to.
///
/// `$LOCATION` resolves to the previous response's `Location` header. Any
/// other URL is prefixed with the session's base URL as-is.
pub fn resolve_url(action: &Action, session: &Session) -> Result<String, EvalError> {
    if action.is_location() {
        let prior = session
            .prior_run()
            .and_then(|record| record.response.as_ref())
            .ok_or(EvalError::LocationBeforeRequest)?;
        let location = prior
            .headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty())
            .ok_or(EvalError::ExpectedLocationHeader)?;
        let resolved = prior
            .url
            .join(location.trim())
            .map_err(|_| EvalError::ExpectedLocationHeader)?;
        return Ok(resolved.to_string());
    }
    Ok(format!("{}{}", session.base_url(), action.url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Defaults;
    use crate::eval::EvalResult;
    use crate::executor::CapturedResponse;
    use crate::fixture::{Fixtures, ServerFixture};
    use crate::session::RunRecord;
    use crate::spec::Method;
    use reqwest::{
        header::{HeaderMap, HeaderValue},
        StatusCode,
    };
    use url::Url;

    fn session_with_prior(location: Option<&str>) -> Session {
        let mut session = Session::new(Fixtures::new(), Defaults::default());
        let mut headers = HeaderMap::new();
        if let Some(location) = location {
            headers.insert(LOCATION, HeaderValue::from_str(location).unwrap());
        }
        let record = RunRecord {
            response: Some(CapturedResponse {
                status: StatusCode::CREATED,
                headers,
                url: Url::parse("http://127.0.0.1:8080/books").unwrap(),
            }),
        };
        assert!(session.commit(EvalResult::new(record)));
        session
    }

    #[test]
    fn location_without_prior_request_is_a_usage_error() {
        let session = Session::new(Fixtures::new(), Defaults::default());
        let action = Action::new(Method::Get, "$LOCATION");
        let err = resolve_url(&action, &session).unwrap_err();
        assert!(matches!(err, EvalError::LocationBeforeRequest));
        assert!(err.is_fatal());
    }

    #[test]
    fn location_with_empty_prior_record_is_a_usage_error() {
        let mut session = Session::new(Fixtures::new(), Defaults::default());
        session.commit(EvalResult::new(RunRecord::default()));
        let action = Action::new(Method::Get, "$location");
        let err = resolve_url(&action, &session).unwrap_err();
        assert!(matches!(err, EvalError::LocationBeforeRequest));
    }

    #[test]
    fn location_header_missing_is_reported() {
        let session = session_with_prior(None);
        let action = Action::new(Method::Get, "$LOCATION");
        let err = resolve_url(&action, &session).unwrap_err();
        assert!(matches!(err, EvalError::ExpectedLocationHeader));
        assert!(!err.is_fatal());
    }

    #[test]
    fn relative_location_resolves_against_prior_url() -> Result<(), EvalError> {
        let session = session_with_prior(Some("/books/abc-123"));
        let action = Action::new(Method::Get, "$LOCATION");
        assert_eq!(
            resolve_url(&action, &session)?,
            "http://127.0.0.1:8080/books/abc-123"
        );
        Ok(())
    }

    #[test]
    fn absolute_location_is_used_verbatim() -> Result<(), EvalError> {
        let session = session_with_prior(Some("https://other.example/books/1"));
        let action = Action::new(Method::Get, "$LOCATION");
        assert_eq!(resolve_url(&action, &session)?, "https://other.example/books/1");
        Ok(())
    }

    #[test]
    fn base_url_is_concatenated_without_normalization() -> Result<(), EvalError> {
        let mut fixtures = Fixtures::new();
        fixtures.register("api", ServerFixture::new("http://127.0.0.1:8080/"));
        let session = Session::new(fixtures, Defaults::default());
        let action = Action::new(Method::Get, "/books");
        assert_eq!(resolve_url(&action, &session)?, "http://127.0.0.1:8080//books");
        Ok(())
    }
}
