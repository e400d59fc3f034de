use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_yaml::Value;
use tracing::{info, warn};

use crate::config::Defaults;
use crate::error::{Failure, ParseError, ScenarioError};
use crate::session::Session;
use crate::spec::{parse_spec, Method, Spec};

/// A YAML file holding an ordered list of test units plus shared defaults.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub path: PathBuf,
    pub name: Option<String>,
    pub description: Option<String>,
    pub defaults: Defaults,
    /// Names of fixtures that must be registered before the scenario runs.
    pub fixtures: Vec<String>,
    pub tests: Vec<Spec>,
}

/// What happened to one unit during a run.
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub index: usize,
    pub title: String,
    pub method: Method,
    pub url: String,
    pub failures: Vec<Failure>,
    pub terminal: bool,
    pub attempts: u32,
    pub duration_ms: Option<f64>,
    pub saved_vars: Vec<String>,
}

impl UnitReport {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub title: String,
    pub units: Vec<UnitReport>,
    /// Titles of units never run because an earlier unit failed.
    pub skipped: Vec<String>,
}

impl ScenarioReport {
    pub fn ok(&self) -> bool {
        self.skipped.is_empty() && self.units.iter().all(UnitReport::ok)
    }

    pub fn failed(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|unit| !unit.ok())
    }
}

impl Scenario {
    pub async fn from_path(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading scenario file {}", path.display()))?;
        Self::parse(&contents, path)
            .with_context(|| format!("parsing scenario file {}", path.display()))
    }

    /// Parses a scenario document. Relative schema paths are resolved against
    /// the directory holding `path`.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ParseError> {
        let document: Value = serde_yaml::from_str(contents)?;
        let Value::Mapping(map) = document else {
            return Err(ParseError::ScenarioExpectedMap(None));
        };
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut scenario = Scenario {
            path: path.to_path_buf(),
            name: None,
            description: None,
            defaults: Defaults::default(),
            fixtures: Vec::new(),
            tests: Vec::new(),
        };

        for (key, value) in &map {
            let key = key
                .as_str()
                .ok_or_else(|| ParseError::ScenarioUnknownField(format!("{key:?}")))?;
            match key {
                "name" => scenario.name = value.as_str().map(str::to_string),
                "description" => scenario.description = value.as_str().map(str::to_string),
                "defaults" => {
                    scenario.defaults = Defaults::from_yaml(value)
                        .map_err(|err| ParseError::InvalidDefaults(format!("{err:#}")))?;
                }
                "fixtures" => {
                    let Value::Sequence(items) = value else {
                        return Err(ParseError::ScenarioExpectedList(key.to_string()));
                    };
                    scenario.fixtures = items
                        .iter()
                        .map(|item| {
                            item.as_str()
                                .map(str::to_string)
                                .ok_or_else(|| ParseError::ScenarioExpectedList(key.to_string()))
                        })
                        .collect::<Result<_, _>>()?;
                }
                "tests" => {
                    let Value::Sequence(items) = value else {
                        return Err(ParseError::ScenarioExpectedList(key.to_string()));
                    };
                    scenario.tests = items
                        .iter()
                        .enumerate()
                        .map(|(index, node)| parse_spec(index, node, &base_dir))
                        .collect::<Result<_, _>>()?;
                }
                other => return Err(ParseError::ScenarioUnknownField(other.to_string())),
            }
        }
        Ok(scenario)
    }

    pub fn title(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Runs every unit in order against `session`.
    ///
    /// The scenario's `defaults` block applies for the duration of the run,
    /// with anything already set on the session taking precedence. Prior run
    /// data and variables from earlier scenarios are discarded first.
    pub async fn run(&self, session: &mut Session) -> Result<ScenarioReport, ScenarioError> {
        let registered: Vec<&str> = session.fixtures().names().collect();
        if let Some(missing) = self
            .fixtures
            .iter()
            .find(|name| !registered.contains(&name.as_str()))
        {
            return Err(ScenarioError::MissingFixture(missing.clone()));
        }

        let overrides = session.defaults().clone();
        let mut effective = self.defaults.clone();
        effective.overlay(&overrides);
        session.set_defaults(effective);
        session.reset();

        let result = self.run_units(session).await;
        session.set_defaults(overrides);
        result
    }

    async fn run_units(&self, session: &mut Session) -> Result<ScenarioReport, ScenarioError> {
        let title = self.title();
        info!(scenario = %title, tests = self.tests.len(), "running scenario");

        let mut report = ScenarioReport {
            title,
            units: Vec::with_capacity(self.tests.len()),
            skipped: Vec::new(),
        };
        for (position, spec) in self.tests.iter().enumerate() {
            let unit = run_unit(spec, session).await?;
            let ok = unit.ok();
            report.units.push(unit);
            if !ok {
                report.skipped = self.tests[position + 1..]
                    .iter()
                    .map(Spec::title)
                    .collect();
                break;
            }
        }
        Ok(report)
    }
}

async fn run_unit(spec: &Spec, session: &mut Session) -> Result<UnitReport, ScenarioError> {
    let policy = spec
        .retry()
        .unwrap_or_else(|| session.defaults().retry_policy());
    let title = spec.title();

    let mut attempt = 1;
    loop {
        let result = spec
            .eval(session)
            .await
            .map_err(|source| ScenarioError::Unit {
                index: spec.index,
                title: title.clone(),
                source,
            })?;

        let mut unit = UnitReport {
            index: spec.index,
            title: title.clone(),
            method: spec.action.method,
            url: spec.action.url.clone(),
            failures: result.failures.clone(),
            terminal: result.terminal,
            attempts: attempt,
            duration_ms: result.duration_ms,
            saved_vars: Vec::new(),
        };

        if result.ok() {
            let mut names: Vec<String> = result.data.keys().cloned().collect();
            names.sort();
            unit.saved_vars = names;
            session.commit(result);
            return Ok(unit);
        }
        if result.terminal || attempt >= policy.attempts {
            return Ok(unit);
        }

        let delay = policy.delay_after(attempt);
        warn!(
            test = %title,
            attempt,
            failure = %result.failures[0],
            "retrying in {:?}",
            delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
