//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BACKOFF_MAX_MINUTES, DEFAULT_BACKOFF_MIN_MINUTES, DEFAULT_CLUSTER_TOKEN_LIFETIME_SECS,
    DEFAULT_EXPIRY_MARGIN_SECS, DEFAULT_FALLBACK_REQUEUE_SECS, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_MAX_CONCURRENT_RECONCILIATIONS, DEFAULT_METRICS_PORT,
    DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS, DEFAULT_TOKEN_DIRECTORY,
};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Directory where cluster tokens are staged for the Google exchange
    pub token_directory: PathBuf,
    /// Remove staged token files once the exchange completes.
    /// Turn off only to inspect the files while diagnosing a federation problem.
    pub remove_token_file: bool,
    /// Lifetime requested for cluster identity tokens (seconds)
    pub cluster_token_lifetime_secs: i64,
    /// Requeue interval after a failed reconciliation, before the safety margin (seconds)
    pub fallback_requeue_secs: u64,
    /// Safety margin subtracted from every requeue (seconds)
    pub expiry_margin_secs: u64,
    /// Timeout for outbound federation HTTP calls (seconds)
    pub http_timeout_secs: u64,
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// How long to wait for the HTTP server to bind (seconds)
    pub server_startup_timeout_secs: u64,
    /// Poll interval while waiting for the HTTP server (milliseconds)
    pub server_poll_interval_ms: u64,
    /// Maximum reconciliations running at once across all bindings
    pub max_concurrent_reconciliations: u16,
    /// Fibonacci backoff floor for hard errors (minutes)
    pub backoff_min_minutes: u64,
    /// Fibonacci backoff ceiling for hard errors (minutes)
    pub backoff_max_minutes: u64,
    /// Log format (json, text)
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            token_directory: PathBuf::from(DEFAULT_TOKEN_DIRECTORY),
            remove_token_file: true,
            cluster_token_lifetime_secs: DEFAULT_CLUSTER_TOKEN_LIFETIME_SECS,
            fallback_requeue_secs: DEFAULT_FALLBACK_REQUEUE_SECS,
            expiry_margin_secs: DEFAULT_EXPIRY_MARGIN_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            backoff_min_minutes: DEFAULT_BACKOFF_MIN_MINUTES,
            backoff_max_minutes: DEFAULT_BACKOFF_MAX_MINUTES,
            log_format: LogFormat::Text,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token_directory: std::env::var("TOKEN_DIRECTORY")
                .map_or(defaults.token_directory, PathBuf::from),
            remove_token_file: env_var_or_default_bool(
                "REMOVE_TOKEN_FILE",
                defaults.remove_token_file,
            ),
            cluster_token_lifetime_secs: env_var_or_default(
                "CLUSTER_TOKEN_LIFETIME_SECS",
                defaults.cluster_token_lifetime_secs,
            ),
            fallback_requeue_secs: env_var_or_default(
                "FALLBACK_REQUEUE_SECS",
                defaults.fallback_requeue_secs,
            ),
            expiry_margin_secs: env_var_or_default(
                "EXPIRY_MARGIN_SECS",
                defaults.expiry_margin_secs,
            ),
            http_timeout_secs: env_var_or_default("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
            metrics_port: env_var_or_default("METRICS_PORT", defaults.metrics_port),
            server_startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                defaults.server_startup_timeout_secs,
            ),
            server_poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                defaults.server_poll_interval_ms,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            backoff_min_minutes: env_var_or_default(
                "BACKOFF_MIN_MINUTES",
                defaults.backoff_min_minutes,
            ),
            backoff_max_minutes: env_var_or_default(
                "BACKOFF_MAX_MINUTES",
                defaults.backoff_max_minutes,
            ),
            log_format: std::env::var("LOG_FORMAT")
                .map_or(defaults.log_format, |v| LogFormat::parse(&v)),
        }
    }

    /// Requeue delay after a failed reconciliation (fallback minus margin, floor 0)
    pub fn fallback_requeue_duration(&self) -> Duration {
        Duration::from_secs(
            self.fallback_requeue_secs
                .saturating_sub(self.expiry_margin_secs),
        )
    }

    /// Safety margin as a duration
    pub fn expiry_margin_duration(&self) -> Duration {
        Duration::from_secs(self.expiry_margin_secs)
    }

    /// Timeout for federation HTTP calls
    pub fn http_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().map_or(default, |v| {
        matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
    })
}
