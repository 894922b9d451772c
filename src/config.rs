//! Configuration module for Pingkeeper.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::auth::Credentials;
use crate::history::HistoryLimits;
use crate::scheduler::{Cadence, MAX_DELAY};

const PREFIX: &str = "PINGKEEPER_";

/// Configuration error types.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
    #[error("{0}")]
    Range(String),
    #[error("no targets configured (set PINGKEEPER_TARGETS)")]
    NoTargets,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// URLs to monitor, in display order
    pub targets: Vec<String>,
    pub limits: HistoryLimits,
    pub cadence: Cadence,
    /// Sliding window for the on-demand rate limiter (default: 60s)
    pub rate_limit_window: Duration,
    /// Requests allowed per client per window (default: 60)
    pub rate_limit_max: usize,
    /// Tracked client identities before idle ones are swept (default: 10000)
    pub rate_limit_max_clients: usize,
    /// Session token lifetime and cookie max-age (default: 300s)
    pub session_ttl: Duration,
    /// Signing secret; a random one is generated when unset
    pub session_secret: Option<String>,
    pub credentials: Option<Credentials>,
    /// On-demand probes are refused this close to a scheduled cycle (default: 60s)
    pub guard_window: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            targets: Vec::new(),
            limits: HistoryLimits::default(),
            cadence: Cadence::default(),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 60,
            rate_limit_max_clients: 10_000,
            session_ttl: Duration::from_secs(300),
            session_secret: None,
            credentials: None,
            guard_window: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables (all prefixed with `PINGKEEPER_`):
    /// - `HTTP_PORT`: HTTP port (default: 8080)
    /// - `TARGETS`: comma-separated URLs to monitor (required)
    /// - `MAX_HISTORY`, `MAX_LATENCY_SAMPLES`, `MAX_INCIDENTS`: per-target caps
    /// - `CYCLE_MIN_SECS`, `CYCLE_MAX_SECS`: idle time between cycles
    /// - `PROBE_GAP_MIN_SECS`, `PROBE_GAP_MAX_SECS`: pause between probes
    /// - `RATE_LIMIT_WINDOW_SECS`, `RATE_LIMIT_MAX`: on-demand rate limit
    /// - `RATE_LIMIT_MAX_CLIENTS`: client identities tracked before sweeping
    /// - `SESSION_TTL_SECS`, `SESSION_SECRET`: session tokens
    /// - `AUTH_USERNAME`, `AUTH_PASSPHRASE`: login credentials
    /// - `GUARD_WINDOW_SECS`: refusal window before a scheduled cycle
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut cfg = Self::default();

        if let Some(port) = parse(&get, "HTTP_PORT")? {
            cfg.http_port = port;
        }

        if let Some(targets) = get("TARGETS") {
            cfg.targets = targets
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }

        if let Some(n) = parse(&get, "MAX_HISTORY")? {
            cfg.limits.max_entries = n;
        }
        if let Some(n) = parse(&get, "MAX_LATENCY_SAMPLES")? {
            cfg.limits.max_latencies = n;
        }
        if let Some(n) = parse(&get, "MAX_INCIDENTS")? {
            cfg.limits.max_incidents = n;
        }

        if let Some(d) = parse_secs(&get, "CYCLE_MIN_SECS")? {
            cfg.cadence.cycle_min = d;
        }
        if let Some(d) = parse_secs(&get, "CYCLE_MAX_SECS")? {
            cfg.cadence.cycle_max = d;
        }
        if let Some(d) = parse_secs(&get, "PROBE_GAP_MIN_SECS")? {
            cfg.cadence.probe_gap_min = d;
        }
        if let Some(d) = parse_secs(&get, "PROBE_GAP_MAX_SECS")? {
            cfg.cadence.probe_gap_max = d;
        }

        if let Some(d) = parse_secs(&get, "RATE_LIMIT_WINDOW_SECS")? {
            cfg.rate_limit_window = d;
        }
        if let Some(n) = parse(&get, "RATE_LIMIT_MAX")? {
            cfg.rate_limit_max = n;
        }
        if let Some(n) = parse(&get, "RATE_LIMIT_MAX_CLIENTS")? {
            cfg.rate_limit_max_clients = n;
        }
        if let Some(d) = parse_secs(&get, "SESSION_TTL_SECS")? {
            cfg.session_ttl = d;
        }
        if let Some(d) = parse_secs(&get, "GUARD_WINDOW_SECS")? {
            cfg.guard_window = d;
        }

        cfg.session_secret = get("SESSION_SECRET");
        cfg.credentials = match (get("AUTH_USERNAME"), get("AUTH_PASSPHRASE")) {
            (Some(username), Some(passphrase)) => Some(Credentials {
                username,
                passphrase,
            }),
            _ => None,
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        if self.cadence.cycle_min > self.cadence.cycle_max {
            return Err(ConfigError::Range(format!(
                "cycle interval min {:?} exceeds max {:?}",
                self.cadence.cycle_min, self.cadence.cycle_max
            )));
        }
        if self.cadence.probe_gap_min > self.cadence.probe_gap_max {
            return Err(ConfigError::Range(format!(
                "probe gap min {:?} exceeds max {:?}",
                self.cadence.probe_gap_min, self.cadence.probe_gap_max
            )));
        }
        if self.cadence.cycle_max > MAX_DELAY || self.cadence.probe_gap_max > MAX_DELAY {
            return Err(ConfigError::Range(format!(
                "cycle interval and probe gap may not exceed {}s",
                MAX_DELAY.as_secs()
            )));
        }
        if self.session_ttl.is_zero() {
            return Err(ConfigError::Range("session TTL must be positive".to_string()));
        }
        if self.rate_limit_max == 0 {
            return Err(ConfigError::Range(
                "rate limit must allow at least one request".to_string(),
            ));
        }
        if self.rate_limit_max_clients == 0 {
            return Err(ConfigError::Range(
                "rate limiter must track at least one client".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse<T, G>(get: &G, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| ConfigError::Invalid {
            key: format!("{}{}", PREFIX, name),
            value,
        }),
    }
}

fn parse_secs<G>(get: &G, name: &str) -> Result<Option<Duration>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    Ok(parse::<u64, G>(get, name)?.map(Duration::from_secs))
}
