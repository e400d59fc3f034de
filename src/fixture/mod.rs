mod json;
mod server;

pub use json::JsonFixture;
pub use server::ServerFixture;

use anyhow::Result;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

pub const STATE_KEY_BASE_URL: &str = "http.base_url";
pub const STATE_KEY_CLIENT: &str = "http.client";

/// A value handed out by a fixture for a state key.
#[derive(Debug, Clone)]
pub enum State {
    Value(Value),
    Client(Client),
}

impl State {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            State::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// External collaborator that owns named state and optional lifecycle hooks.
pub trait Fixture: Send + Sync {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn has_state(&self, key: &str) -> bool;

    fn state(&self, key: &str) -> Option<State>;
}

/// Fixtures in registration order. Lookups stop at the first fixture
/// claiming a key.
#[derive(Default)]
pub struct Fixtures {
    entries: Vec<(String, Box<dyn Fixture>)>,
}

impl Fixtures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, fixture: impl Fixture + 'static) {
        self.entries.push((name.into(), Box::new(fixture)));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn start_all(&mut self) -> Result<()> {
        for (name, fixture) in &mut self.entries {
            debug!(fixture = %name, "starting fixture");
            fixture.start()?;
        }
        Ok(())
    }

    pub fn stop_all(&mut self) {
        for (name, fixture) in self.entries.iter_mut().rev() {
            debug!(fixture = %name, "stopping fixture");
            fixture.stop();
        }
    }

    pub fn lookup(&self, key: &str) -> Option<State> {
        self.entries
            .iter()
            .find(|(_, fixture)| fixture.has_state(key))
            .and_then(|(_, fixture)| fixture.state(key))
    }

    pub fn base_url(&self) -> Option<String> {
        self.lookup(STATE_KEY_BASE_URL)
            .and_then(|state| state.as_str().map(str::to_string))
    }

    pub fn client(&self) -> Option<Client> {
        match self.lookup(STATE_KEY_CLIENT) {
            Some(State::Client(client)) => Some(client),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) struct MapFixture(pub HashMap<String, Value>);

    impl MapFixture {
        pub(crate) fn new<const N: usize>(pairs: [(&str, Value); N]) -> Self {
            Self(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            )
        }
    }

    impl Fixture for MapFixture {
        fn has_state(&self, key: &str) -> bool {
            self.0.contains_key(key)
        }

        fn state(&self, key: &str) -> Option<State> {
            self.0.get(key).cloned().map(State::Value)
        }
    }

    #[test]
    fn first_registered_fixture_wins() {
        let mut fixtures = Fixtures::new();
        fixtures.register("first", MapFixture::new([("k", Value::from("one"))]));
        fixtures.register("second", MapFixture::new([("k", Value::from("two"))]));

        let state = fixtures.lookup("k").unwrap();
        assert_eq!(state.as_str(), Some("one"));
        assert!(fixtures.lookup("missing").is_none());
    }

    #[test]
    fn base_url_requires_string_state() {
        let mut fixtures = Fixtures::new();
        fixtures.register(
            "odd",
            MapFixture::new([(STATE_KEY_BASE_URL, Value::from(42))]),
        );
        assert_eq!(fixtures.base_url(), None);
        assert!(fixtures.client().is_none());
    }
}
