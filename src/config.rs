//! Environment configuration. `.env` is loaded first when present.

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::engine::EngineConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: String,
    /// `None` runs with in-memory stores.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub engine: EngineConfig,
    /// Fractional width of the simulated price band, e.g. 0.04 for ±2%.
    pub quote_jitter: f64,
    /// Starting balance of the seeded demo account.
    pub demo_balance: Decimal,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            lock_timeout: Duration::from_millis(parse_or("LOCK_TIMEOUT_MS", 5_000u64)?),
            quote_timeout: Duration::from_millis(parse_or("QUOTE_TIMEOUT_MS", 2_000u64)?),
            max_retries: parse_or("SETTLEMENT_MAX_RETRIES", defaults.max_retries)?,
            retry_backoff: Duration::from_millis(parse_or("RETRY_BACKOFF_MS", 25u64)?),
        };

        let quote_jitter: f64 = parse_or("QUOTE_JITTER_PCT", 0.04)?;
        if !(0.0..1.0).contains(&quote_jitter) {
            return Err(ConfigError::InvalidValue {
                key: "QUOTE_JITTER_PCT",
                value: quote_jitter.to_string(),
            });
        }

        let demo_balance: Decimal = parse_or("DEMO_BALANCE", Decimal::new(1_000_000, 2))?;
        if demo_balance.is_sign_negative() {
            return Err(ConfigError::InvalidValue {
                key: "DEMO_BALANCE",
                value: demo_balance.to_string(),
            });
        }

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 5u32)?,
            engine,
            quote_jitter,
            demo_balance,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(default),
    }
}
