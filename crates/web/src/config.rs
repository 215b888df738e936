use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub api_keys: String,
    pub event_buffer: usize,
    pub commission_cache_ttl: Duration,
    /// Period of the due-transition sweep; `None` leaves it to an external scheduler.
    pub scheduler_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: std::env::var("HOST").context("Cannot load HOST env variable")?,
            port: std::env::var("PORT")
                .context("Cannot load PORT env variable")?
                .parse()
                .context("PORT must be a number")?,
            database_url: std::env::var("DATABASE_URL")
                .context("Cannot load DATABASE_URL env variable")?,
            api_keys: std::env::var("API_KEYS").unwrap_or_default(),
            event_buffer: optional_number::<usize>("EVENT_BUFFER")?.unwrap_or(256),
            commission_cache_ttl: Duration::from_secs(
                optional_number::<u64>("COMMISSION_CACHE_TTL_SECS")?.unwrap_or(3600),
            ),
            scheduler_interval: optional_number::<u64>("SCHEDULER_INTERVAL_SECS")?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }
}

fn optional_number<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} must be a number")),
        Err(_) => Ok(None),
    }
}
