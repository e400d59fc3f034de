use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

pub const PLUGIN_NAME: &str = "http";

static DURATION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*(ms|s|m|h)?\s*$").unwrap());

/// Parses durations written as `250ms`, `2s`, `1.5s`, `1m` or `1h`. A bare
/// number is read as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let captures = DURATION_PATTERN
        .captures(raw)
        .ok_or_else(|| anyhow!("Invalid duration: {raw}"))?;
    let amount: f64 = captures[1]
        .parse()
        .map_err(|_| anyhow!("Invalid duration: {raw}"))?;
    let seconds = match captures.get(2).map(|m| m.as_str()) {
        Some("ms") => amount / 1000.0,
        Some("m") => amount * 60.0,
        Some("h") => amount * 3600.0,
        _ => amount,
    };
    if !seconds.is_finite() {
        bail!("Invalid duration: {raw}");
    }
    Ok(Duration::from_secs_f64(seconds))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
    pub exponential: bool,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            interval: Duration::ZERO,
            exponential: false,
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.interval;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.interval.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            interval: Duration::from_millis(250),
            exponential: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: Option<u32>,
    pub interval: Option<String>,
    pub exponential: Option<bool>,
}

impl RetryConfig {
    pub fn into_policy(self) -> Result<RetryPolicy> {
        let defaults = RetryPolicy::default();
        let interval = match self.interval.as_deref() {
            Some(raw) => parse_duration(raw)?,
            None => defaults.interval,
        };
        let attempts = self.attempts.unwrap_or(defaults.attempts);
        if attempts == 0 {
            bail!("retry attempts must be at least 1");
        }
        Ok(RetryPolicy {
            attempts,
            interval,
            exponential: self.exponential.unwrap_or(defaults.exponential),
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct HttpDefaults {
    base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDefaults {
    http: HttpDefaults,
    timeout: Option<String>,
    retry: Option<RetryConfig>,
}

/// Plugin defaults, read from a scenario's `defaults` block and optionally
/// overridden from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defaults {
    /// Prefix for every non-`$LOCATION` URL. When unset the fixtures are
    /// asked for an `http.base_url` state key.
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    /// Retry policy for units that do not pick their own.
    pub retry: Option<RetryPolicy>,
}

impl Defaults {
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self> {
        if !value.is_mapping() {
            bail!("defaults: expected map");
        }
        let raw: RawDefaults = serde_yaml::from_value(value.clone())?;
        let timeout = raw.timeout.as_deref().map(parse_duration).transpose()?;
        let retry = raw.retry.map(RetryConfig::into_policy).transpose()?;
        Ok(Self {
            base_url: raw.http.base_url.filter(|url| !url.is_empty()),
            timeout,
            retry,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default()
    }

    /// Lays `overrides` on top of these defaults; values set there win.
    pub fn overlay(&mut self, overrides: &Defaults) {
        if overrides.base_url.is_some() {
            self.base_url = overrides.base_url.clone();
        }
        if overrides.timeout.is_some() {
            self.timeout = overrides.timeout;
        }
        if overrides.retry.is_some() {
            self.retry = overrides.retry.clone();
        }
    }
}
