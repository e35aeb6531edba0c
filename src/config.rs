use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

/// Timestamps in or before this year are treated as mis-parsed.
pub const DEFAULT_MIN_YEAR: i32 = 2000;

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub max_file_size: usize,
    pub min_year: i32,
    pub default_unit_price: Option<f64>,
    pub dataset_capacity: u64,
    pub dataset_ttl: Duration,
    pub fetch_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_file_size: default_max_file_size(),
            min_year: DEFAULT_MIN_YEAR,
            default_unit_price: None,
            dataset_capacity: 64,
            dataset_ttl: Duration::from_secs(30 * 60),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse {}={:?}", key, raw)),
        _ => Ok(default),
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        let defaults = Config::default();
        let default_unit_price = match std::env::var("LIVESTREAM_DEFAULT_UNIT_PRICE") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|p| p.is_finite() && *p >= 0.0)
                    .ok_or_else(|| anyhow::anyhow!("LIVESTREAM_DEFAULT_UNIT_PRICE must be a non-negative number, got {:?}", raw))?,
            ),
            _ => None,
        };

        Ok(Config {
            bind_addr: env_or("LIVESTREAM_BIND_ADDR", defaults.bind_addr)?,
            max_file_size: env_or("LIVESTREAM_MAX_FILE_SIZE", defaults.max_file_size)?,
            min_year: env_or("LIVESTREAM_MIN_YEAR", defaults.min_year)?,
            default_unit_price,
            dataset_capacity: env_or("LIVESTREAM_DATASET_CAPACITY", defaults.dataset_capacity)?,
            dataset_ttl: Duration::from_secs(env_or("LIVESTREAM_DATASET_TTL_SECS", defaults.dataset_ttl.as_secs())?),
            fetch_timeout: Duration::from_secs(env_or(
                "LIVESTREAM_FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )?),
        })
    }
}

pub fn load_config() -> Result<Config> {
    let config = Config::new()?;
    tracing::info!(
        "Configuration loaded (min year: {}, max upload: {}KB, dataset capacity: {})",
        config.min_year,
        config.max_file_size / 1024,
        config.dataset_capacity
    );
    Ok(config)
}
