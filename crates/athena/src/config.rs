use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runner::QueryError;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_WORKGROUP: &str = "primary";
const DEFAULT_WAIT_INTERVAL_MS: u64 = 1_000;
const DEFAULT_MAX_WAIT_INTERVAL_MS: u64 = 10_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 60;

// ── Env helpers ─────────────────────────────────────────────────

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries `{PROFILE}_{KEY}` first, falls back to `{KEY}`.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.as_str(), "true" | "1"),
        None => default,
    }
}

/// Profile prefix from `ATHENA_PROFILE`, upper-cased (empty when unset).
fn active_profile() -> String {
    env_opt("ATHENA_PROFILE")
        .map(|s| s.to_uppercase())
        .unwrap_or_default()
}

fn profiled_region(profile: &str) -> String {
    profiled_env_opt(profile, "ATHENA_REGION")
        .or_else(|| profiled_env_opt(profile, "AWS_REGION"))
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

// ── QueryConfig ─────────────────────────────────────────────────

/// Per-call polling policy.
///
/// With the default `backoff_factor` of `1.0` the runner sleeps exactly
/// `wait_interval` between status checks. Larger factors grow the interval
/// after every non-terminal attempt, capped at `max_wait_interval`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Pause between two consecutive status checks.
    pub wait_interval: Duration,
    /// Maximum number of status checks before giving up (must be >= 1).
    pub max_attempts: u32,
    /// AWS region the query runs in.
    pub region: String,
    /// Multiplier applied to the interval after each non-terminal attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Upper bound for the backed-off interval.
    #[serde(default = "default_max_wait_interval")]
    pub max_wait_interval: Duration,
    /// Send a best-effort stop request when the attempt budget runs out.
    #[serde(default)]
    pub cancel_on_timeout: bool,
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_max_wait_interval() -> Duration {
    Duration::from_millis(DEFAULT_MAX_WAIT_INTERVAL_MS)
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            wait_interval: Duration::from_millis(DEFAULT_WAIT_INTERVAL_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            region: DEFAULT_REGION.to_string(),
            backoff_factor: default_backoff_factor(),
            max_wait_interval: default_max_wait_interval(),
            cancel_on_timeout: false,
        }
    }
}

impl QueryConfig {
    /// Fixed-interval policy: `max_attempts` checks, `wait_interval` apart.
    pub fn new(wait_interval: Duration, max_attempts: u32, region: impl Into<String>) -> Self {
        Self {
            wait_interval,
            max_attempts,
            region: region.into(),
            ..Self::default()
        }
    }

    /// Enable exponential backoff.
    pub fn with_backoff(mut self, factor: f64, max_wait_interval: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_wait_interval = max_wait_interval;
        self
    }

    pub fn with_cancel_on_timeout(mut self, cancel: bool) -> Self {
        self.cancel_on_timeout = cancel;
        self
    }

    /// Build config from environment variables (see [`RunnerConfig::from_env`]
    /// for the profile rules).
    pub fn from_env() -> Self {
        Self::from_env_profiled(&active_profile())
    }

    /// Build config for a specific named profile.
    pub fn from_env_profiled(profile: &str) -> Self {
        Self {
            wait_interval: Duration::from_millis(profiled_env_parse(
                profile,
                "ATHENA_WAIT_INTERVAL_MS",
                DEFAULT_WAIT_INTERVAL_MS,
            )),
            max_attempts: profiled_env_parse(profile, "ATHENA_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            region: profiled_region(profile),
            backoff_factor: profiled_env_parse(profile, "ATHENA_BACKOFF_FACTOR", 1.0),
            max_wait_interval: Duration::from_millis(profiled_env_parse(
                profile,
                "ATHENA_MAX_WAIT_INTERVAL_MS",
                DEFAULT_MAX_WAIT_INTERVAL_MS,
            )),
            cancel_on_timeout: profiled_env_bool(profile, "ATHENA_CANCEL_ON_TIMEOUT", false),
        }
    }

    /// Check the invariants the poll loop relies on.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.max_attempts == 0 {
            return Err(QueryError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(QueryError::InvalidConfig(format!(
                "backoff_factor must be a finite number >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }

    /// Interval to sleep after a non-terminal attempt that waited `current`.
    pub(crate) fn next_interval(&self, current: Duration) -> Duration {
        if self.backoff_factor <= 1.0 {
            return current;
        }
        let cap = self.max_wait_interval.max(self.wait_interval);
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .unwrap_or(cap)
            .min(cap)
    }
}

// ── RunnerConfig ────────────────────────────────────────────────

/// Construction parameters for [`crate::QueryRunner`].
///
/// Credentials are never stored here; they come from the AWS default chain
/// (environment, shared config files, instance metadata), optionally narrowed
/// to a named profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// AWS region for the Athena client.
    pub region: String,
    /// Named profile from the shared AWS config files.
    #[serde(default)]
    pub aws_profile: Option<String>,
    /// Default database for [`crate::QueryRunner::execute_sql`].
    #[serde(default)]
    pub database: Option<String>,
    /// Default workgroup for [`crate::QueryRunner::execute_sql`].
    #[serde(default)]
    pub workgroup: Option<String>,
    /// Default S3 location for query output.
    #[serde(default)]
    pub output_location: Option<String>,
}

impl RunnerConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            aws_profile: None,
            database: None,
            workgroup: None,
            output_location: None,
        }
    }

    /// Build config from environment variables.
    ///
    /// Reads `ATHENA_PROFILE` to determine the profile prefix. For each key,
    /// tries `{PROFILE}_ATHENA_*` first, then `ATHENA_*`. `ATHENA_REGION`
    /// falls back to `AWS_REGION` before using the default.
    pub fn from_env() -> Self {
        Self::from_env_profiled(&active_profile())
    }

    /// Build config for a specific named profile.
    pub fn from_env_profiled(profile: &str) -> Self {
        Self {
            region: profiled_region(profile),
            aws_profile: profiled_env_opt(profile, "ATHENA_AWS_PROFILE"),
            database: profiled_env_opt(profile, "ATHENA_DATABASE"),
            workgroup: Some(profiled_env_or(profile, "ATHENA_WORKGROUP", DEFAULT_WORKGROUP)),
            output_location: profiled_env_opt(profile, "ATHENA_OUTPUT_LOCATION"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
