use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration as StdDuration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Process configuration, loaded once at startup from the environment
/// (a `.env` file is read in `main` before this runs).
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_address: SocketAddr,
    /// Movie catalog base URL and API key
    pub tmdb_base_url: String,
    pub tmdb_api_key: String,
    /// Classification service base URL, API key and model
    pub classifier_base_url: String,
    pub classifier_api_key: String,
    pub classifier_model: String,
    /// Requests each client may make per quota window
    pub daily_limit: u32,
    /// Quota window length in seconds
    pub window_secs: u64,
    /// How often the reclaimer sweeps expired quota entries, in seconds
    pub sweep_interval_secs: u64,
    /// Default log level when RUST_LOG is unset
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_address: parse_var("BIND_ADDRESS", "127.0.0.1:3000")?,
            tmdb_base_url: var_or("TMDB_BASE_URL", "https://api.themoviedb.org/3"),
            tmdb_api_key: require_var("TMDB_API_KEY")?,
            classifier_base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com"),
            classifier_api_key: require_var("OPENAI_API_KEY")?,
            classifier_model: var_or("OPENAI_MODEL", "gpt-4o-mini"),
            daily_limit: parse_var("DAILY_REQUEST_LIMIT", "20")?,
            window_secs: parse_var("QUOTA_WINDOW_SECS", "86400")?,
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", "3600")?,
            log_level: var_or("LOG_LEVEL", "info"),
        })
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_secs as i64)
    }

    pub fn sweep_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.sweep_interval_secs)
    }
}

fn var_or(var: &'static str, default: &str) -> String {
    env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn require_var(var: &'static str) -> Result<String, ConfigError> {
    env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn parse_var<T: FromStr>(var: &'static str, default: &str) -> Result<T, ConfigError> {
    let raw = var_or(var, default);
    raw.parse().map_err(|_| ConfigError::Invalid { var, value: raw })
}
