use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'text' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub stellr_base_url: String,
    /// Falls back to Vault when unset.
    pub stellr_api_key: Option<String>,
    pub vendor_timeout: Duration,
    pub enable_test_vendor: bool,
    pub retry_interval: Duration,
    pub retry_stale_after: Duration,
    pub retry_max_attempts: i32,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        let config = Config {
            server_port: parse_or("SERVER_PORT", 3000)?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            stellr_base_url: env::var("STELLR_BASE_URL").context("STELLR_BASE_URL is required")?,
            stellr_api_key: env::var("STELLR_API_KEY").ok().filter(|k| !k.is_empty()),
            vendor_timeout: Duration::from_millis(parse_or("VENDOR_TIMEOUT_MS", 3000)?),
            enable_test_vendor: parse_or("ENABLE_TEST_VENDOR", false)?,
            retry_interval: Duration::from_secs(parse_or("RETRY_INTERVAL_SECS", 300)?),
            retry_stale_after: Duration::from_secs(parse_or("RETRY_STALE_AFTER_SECS", 300)?),
            retry_max_attempts: parse_or("RETRY_MAX_ATTEMPTS", 3)?,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_default()
                .parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if self.server_port == 0 {
            anyhow::bail!("SERVER_PORT must be greater than 0");
        }
        if self.database_max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be greater than 0");
        }
        if self.vendor_timeout.is_zero() {
            anyhow::bail!("VENDOR_TIMEOUT_MS must be greater than 0");
        }
        if self.retry_interval.is_zero() {
            anyhow::bail!("RETRY_INTERVAL_SECS must be greater than 0");
        }
        if self.retry_max_attempts < 1 {
            anyhow::bail!("RETRY_MAX_ATTEMPTS must be at least 1");
        }

        url::Url::parse(&self.stellr_base_url).context("STELLR_BASE_URL is not a valid URL")?;

        Ok(())
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", key, e)),
        _ => Ok(default),
    }
}
