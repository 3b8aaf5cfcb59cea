use std::time::Duration;

use crate::{Error, Result};

/// Runtime configuration loaded from environment variables at startup.
///
/// Strategy parameters live in the TOML file named by `strategy_config_path`;
/// this struct only covers where data comes from and where records go.
#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: String,

    // Candle source
    pub data_dir: String,
    pub htf_timeframe: String,
    pub ltf_timeframe: String,
    pub htf_count: usize,
    pub ltf_count: usize,

    // Audit records
    pub record_dir: String,

    // Runner
    pub poll_interval: Duration,

    // Strategy config file path
    pub strategy_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Every variable has a default; malformed
    /// numbers are a `Config` error.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Ok(Config {
            symbol: env_or("FVG_SYMBOL", "EURUSD"),
            data_dir: env_or("FVG_DATA_DIR", "data"),
            htf_timeframe: env_or("FVG_HTF", "M15"),
            ltf_timeframe: env_or("FVG_LTF", "M1"),
            htf_count: parsed_env("FVG_HTF_COUNT", 20)?,
            ltf_count: parsed_env("FVG_LTF_COUNT", 50)?,
            record_dir: env_or("FVG_RECORD_DIR", "records"),
            poll_interval: Duration::from_secs(parsed_env("FVG_POLL_SECS", 5)?),
            strategy_config_path: env_or("STRATEGY_CONFIG_PATH", "config/strategy.toml"),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} must be a number, got '{raw}'"))),
        None => Ok(default),
    }
}
