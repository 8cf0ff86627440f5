//! Client configuration.
//!
//! Built once at startup and shared read-only (`Arc<LudiceConfig>`) by the API
//! client and the session controller.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors from reading configuration overrides
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Endpoint paths relative to the API base URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub start_game: String,
    pub write_result: String,
    pub cancel_find: String,
    pub check_match: String,
    /// Path template, `{username}` is substituted
    pub get_balance: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            start_game: "/start/game".to_string(),
            write_result: "/write/res".to_string(),
            cancel_find: "/cancel/find".to_string(),
            check_match: "/check/match".to_string(),
            get_balance: "/get/{username}/balance".to_string(),
        }
    }
}

impl Endpoints {
    /// Balance path for the given user
    pub fn balance_for(&self, username: &str) -> String {
        self.get_balance.replace("{username}", username)
    }
}

/// Immutable client configuration
#[derive(Clone, Debug)]
pub struct LudiceConfig {
    /// Backend API base URL, without trailing slash
    pub api_base_url: String,
    pub endpoints: Endpoints,
    pub min_bet: u64,
    pub max_bet: u64,
    /// Interval between opponent polls
    pub poll_interval: Duration,
    /// Hard deadline for one opponent search
    pub poll_max_time: Duration,
    /// Pre-shared HMAC key. Shipped to clients, so not actually secret.
    pub secret_key: String,
    /// Enables debug-level logging by default
    pub debug: bool,
    /// Placeholder balance until the backend answers
    pub initial_balance: u64,
    /// Loading screen duration before the main menu
    pub splash_delay: Duration,
}

impl Default for LudiceConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            endpoints: Endpoints::default(),
            min_bet: 10,
            max_bet: 1_000_000,
            poll_interval: Duration::from_millis(2_000),
            poll_max_time: Duration::from_millis(300_000),
            secret_key: "our_secret_key".to_string(),
            debug: true,
            initial_balance: 100,
            splash_delay: Duration::from_millis(1_000),
        }
    }
}

impl LudiceConfig {
    /// Defaults overridden by `LUDICE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `LUDICE_*` key
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("LUDICE_API_BASE_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = lookup("LUDICE_SECRET_KEY") {
            config.secret_key = key;
        }
        if let Some(v) = parse_var(&lookup, "LUDICE_MIN_BET")? {
            config.min_bet = v;
        }
        if let Some(v) = parse_var(&lookup, "LUDICE_MAX_BET")? {
            config.max_bet = v;
        }
        if let Some(ms) = parse_var(&lookup, "LUDICE_POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "LUDICE_POLL_MAX_TIME_MS")? {
            config.poll_max_time = Duration::from_millis(ms);
        }
        if let Some(v) = parse_var(&lookup, "LUDICE_INITIAL_BALANCE")? {
            config.initial_balance = v;
        }
        if let Some(raw) = lookup("LUDICE_DEBUG") {
            config.debug = match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "LUDICE_DEBUG",
                        value: raw,
                    })
                }
            };
        }

        if config.min_bet > config.max_bet {
            return Err(ConfigError::InvalidValue {
                key: "LUDICE_MIN_BET",
                value: config.min_bet.to_string(),
            });
        }

        Ok(config)
    }

    /// Default `tracing` filter directive for this configuration
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "warn"
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(None),
    }
}
