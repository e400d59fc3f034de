pub mod bridge;

pub use bridge::{RunContext, RunRecord};

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::Defaults;
use crate::eval::EvalResult;
use crate::fixture::Fixtures;

/// Everything a test unit may consult while it is evaluated: registered
/// fixtures, plugin defaults, and the state left by earlier units.
pub struct Session {
    fixtures: Fixtures,
    defaults: Defaults,
    context: RunContext,
    client: Client,
}

impl Session {
    pub fn new(fixtures: Fixtures, defaults: Defaults) -> Self {
        Self {
            fixtures,
            defaults,
            context: RunContext::new(),
            client: Client::new(),
        }
    }

    pub fn fixtures(&self) -> &Fixtures {
        &self.fixtures
    }

    pub fn fixtures_mut(&mut self) -> &mut Fixtures {
        &mut self.fixtures
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn set_defaults(&mut self, defaults: Defaults) {
        self.defaults = defaults;
    }

    pub fn prior_run(&self) -> Option<&RunRecord> {
        bridge::get(&self.context)
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.context.var(name)
    }

    /// Base URL from the configured defaults, falling back to the first
    /// fixture exposing `http.base_url`.
    pub fn base_url(&self) -> String {
        if let Some(url) = self.defaults.base_url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }
        self.fixtures.base_url().unwrap_or_default()
    }

    pub fn client(&self) -> Client {
        self.fixtures
            .client()
            .unwrap_or_else(|| self.client.clone())
    }

    pub fn deadline(&self, unit_timeout: Option<Duration>) -> Option<Duration> {
        unit_timeout.or(self.defaults.timeout)
    }

    /// Records a successful unit's run data and variables for later units.
    /// Failed results leave the context untouched.
    pub fn commit(&mut self, result: EvalResult) -> bool {
        if !result.ok() {
            return false;
        }
        for (name, value) in result.data {
            debug!(var = %name, value = %value, "saving variable");
            self.context.set_var(name, value);
        }
        bridge::put(&mut self.context, result.record);
        true
    }

    /// Starts a fresh scenario run, discarding prior run data and variables.
    pub fn reset(&mut self) {
        self.context = RunContext::new();
    }
}
