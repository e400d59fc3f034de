use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use httpspec::config::{parse_duration, Defaults};
use httpspec::fixture::{Fixtures, JsonFixture, ServerFixture};
use httpspec::report::{print_scenario_error, print_scenario_report};
use httpspec::scenario::Scenario;
use httpspec::session::Session;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "httpspec",
    version,
    about = "Declarative HTTP API tests from YAML scenarios"
)]
struct Cli {
    /// Scenario files to run (.yaml)
    #[arg(value_name = "SCENARIO", required = true)]
    scenarios: Vec<PathBuf>,

    /// Prefix for every request URL, overriding scenario defaults
    #[arg(long)]
    base_url: Option<String>,

    /// Per-request timeout, e.g. 500ms or 2s
    #[arg(long, value_parser = parse_duration)]
    timeout: Option<std::time::Duration>,

    /// Register a JSON document fixture (NAME=FILE.json)
    #[arg(long = "fixture", value_name = "NAME=FILE")]
    fixtures: Vec<String>,

    /// Register a server fixture exposing a base URL (NAME=URL)
    #[arg(long = "server", value_name = "NAME=URL")]
    servers: Vec<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir()?;
    let mut fixtures = Fixtures::new();
    for raw in &cli.servers {
        let (name, url) = split_pair(raw, "--server")?;
        fixtures.register(name, ServerFixture::new(url));
    }
    for raw in &cli.fixtures {
        let (name, file) = split_pair(raw, "--fixture")?;
        let fixture = JsonFixture::from_path(&resolve_relative(&cwd, Path::new(file)))?;
        fixtures.register(name, fixture);
    }
    fixtures.start_all().context("starting fixtures")?;

    let overrides = Defaults {
        base_url: cli.base_url.clone(),
        timeout: cli.timeout,
        retry: None,
    };
    let mut session = Session::new(fixtures, overrides);

    let mut all_ok = true;
    for path in &cli.scenarios {
        let path = resolve_relative(&cwd, path);
        let scenario = match Scenario::from_path(&path).await {
            Ok(scenario) => scenario,
            Err(err) => {
                session.fixtures_mut().stop_all();
                return Err(err);
            }
        };
        match scenario.run(&mut session).await {
            Ok(report) => {
                print_scenario_report(&report);
                all_ok &= report.ok();
            }
            Err(err) => {
                print_scenario_error(&scenario.title(), &err);
                all_ok = false;
                if err.is_fatal() {
                    break;
                }
            }
        }
    }

    session.fixtures_mut().stop_all();
    Ok(if all_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn split_pair<'a>(raw: &'a str, flag: &str) -> Result<(&'a str, &'a str)> {
    raw.split_once('=')
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .ok_or_else(|| anyhow!("{flag} expects NAME=VALUE, got {raw}"))
}

fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
