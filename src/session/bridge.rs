use std::{any::Any, collections::HashMap};

use serde_json::Value;

use crate::config::PLUGIN_NAME;
use crate::executor::CapturedResponse;

/// Data a test unit leaves behind for the next unit in the same scenario.
#[derive(Debug, Clone, Default)]
pub struct RunRecord {
    pub response: Option<CapturedResponse>,
}

/// Per-scenario bag of state shared between sequentially evaluated units.
/// Plugin data is keyed by plugin name so co-resident plugins never collide.
#[derive(Default)]
pub struct RunContext {
    prior_run: HashMap<String, Box<dyn Any + Send + Sync>>,
    vars: HashMap<String, Value>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }
}

pub fn get(ctx: &RunContext) -> Option<&RunRecord> {
    ctx.prior_run
        .get(PLUGIN_NAME)
        .and_then(|data| data.downcast_ref::<RunRecord>())
}

pub fn put(ctx: &mut RunContext, record: RunRecord) {
    ctx.prior_run
        .insert(PLUGIN_NAME.to_string(), Box::new(record));
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{header::HeaderMap, StatusCode};
    use url::Url;

    fn record(status: u16) -> RunRecord {
        RunRecord {
            response: Some(CapturedResponse {
                status: StatusCode::from_u16(status).unwrap(),
                headers: HeaderMap::new(),
                url: Url::parse("http://localhost/books").unwrap(),
            }),
        }
    }

    #[test]
    fn empty_context_has_no_prior_run() {
        let ctx = RunContext::new();
        assert!(get(&ctx).is_none());
    }

    #[test]
    fn last_write_wins() {
        let mut ctx = RunContext::new();
        put(&mut ctx, record(201));
        put(&mut ctx, record(200));
        let status = get(&ctx).and_then(|r| r.response.as_ref()).map(|r| r.status);
        assert_eq!(status, Some(StatusCode::OK));
    }

    #[test]
    fn foreign_plugin_data_is_ignored() {
        let mut ctx = RunContext::new();
        ctx.prior_run
            .insert(PLUGIN_NAME.to_string(), Box::new("not a record"));
        assert!(get(&ctx).is_none());
    }
}
