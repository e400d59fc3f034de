use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::assertions;
use crate::error::{EvalError, Failure};
use crate::executor::{execute, preprocess, resolve_url};
use crate::session::{RunRecord, Session};
use crate::spec::Spec;
use crate::vars::save_vars;

/// Outcome of evaluating one test unit.
#[derive(Debug, Clone, Default)]
pub struct EvalResult {
    pub failures: Vec<Failure>,
    /// Set when the failures cannot be fixed by retrying the unit.
    pub terminal: bool,
    /// Run data for the next unit, kept only if this one succeeds.
    pub record: RunRecord,
    /// Variables extracted from the response.
    pub data: HashMap<String, Value>,
    pub duration_ms: Option<f64>,
}

impl EvalResult {
    pub fn new(record: RunRecord) -> Self {
        Self {
            record,
            ..Self::default()
        }
    }

    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn timed_out(&self) -> bool {
        self.failures
            .iter()
            .any(|failure| matches!(failure, Failure::Timeout(_)))
    }
}

impl Spec {
    /// Performs the unit's HTTP request and checks its expectations.
    ///
    /// Returns `Err` for runtime errors (transport, `$LOCATION` misuse,
    /// extraction problems). Assertion mismatches and an elapsed deadline
    /// are failures on the returned result.
    pub async fn eval(&self, session: &Session) -> Result<EvalResult, EvalError> {
        let url = resolve_url(&self.action, session)?;

        let mut data = self.action.data.clone();
        preprocess(data.as_mut(), session.fixtures())?;

        let client = session.client();
        let timeout = session.deadline(self.timeout);
        let exchange = match execute(&client, self.action.method, &url, data.as_ref(), timeout)
            .await
        {
            Ok(exchange) => exchange,
            Err(EvalError::Timeout(limit)) => {
                debug!(test = %self.title(), "deadline of {:?} exceeded", limit);
                return Ok(EvalResult {
                    failures: vec![Failure::Timeout(limit)],
                    ..EvalResult::default()
                });
            }
            Err(err) => return Err(err),
        };

        let mut result = EvalResult {
            duration_ms: Some(exchange.duration_ms),
            ..EvalResult::default()
        };
        if let Some(expect) = &self.assert {
            let outcome = assertions::evaluate(expect, &exchange.response, &exchange.body);
            if !outcome.ok() {
                result.failures = outcome.failures;
                result.terminal = outcome.terminal;
                return Ok(result);
            }
        }

        save_vars(&self.var, &exchange.body, &mut result.data)?;
        result.record = RunRecord {
            response: Some(exchange.response),
        };
        Ok(result)
    }
}
