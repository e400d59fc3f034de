use reqwest::Client;
use serde_json::Value;

use super::{Fixture, State, STATE_KEY_BASE_URL, STATE_KEY_CLIENT};

/// Exposes a running HTTP server to test units through the `http.base_url`
/// and `http.client` state keys.
#[derive(Debug, Clone)]
pub struct ServerFixture {
    base_url: String,
    client: Option<Client>,
}

impl ServerFixture {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: None,
        }
    }

    /// Hands out a preconfigured client (TLS roots, proxies) instead of the
    /// session default.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }
}

impl Fixture for ServerFixture {
    fn has_state(&self, key: &str) -> bool {
        match key.to_ascii_lowercase().as_str() {
            STATE_KEY_BASE_URL => true,
            STATE_KEY_CLIENT => self.client.is_some(),
            _ => false,
        }
    }

    fn state(&self, key: &str) -> Option<State> {
        match key.to_ascii_lowercase().as_str() {
            STATE_KEY_BASE_URL => Some(State::Value(Value::String(self.base_url.clone()))),
            STATE_KEY_CLIENT => self.client.clone().map(State::Client),
            _ => None,
        }
    }
}
