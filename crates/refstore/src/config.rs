//! Store configuration.
//!
//! ```toml
//! [database]
//! url = "${DATABASE_URL}"
//! max_connections = 32
//!
//! [retry]
//! max_attempts = 5
//! base_delay_ms = 20
//! max_delay_ms = 1000
//!
//! [resolver]
//! timeout_ms = 3000
//! ```

use crate::error::{StoreError, StoreResult};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Transaction retry tuning for serialization conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 20,
            max_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { timeout_ms: 3_000 }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_max_connections() -> usize {
    16
}

impl StoreConfig {
    /// Configuration with defaults for everything except the URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig {
                url: database_url.into(),
                max_connections: default_max_connections(),
            },
            retry: RetryConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }

    /// Parse TOML text. `${VAR}` references in `database.url` are expanded
    /// from the process environment.
    pub fn from_toml_str(raw: &str) -> StoreResult<Self> {
        Self::from_toml_with(raw, |key| std::env::var(key).ok())
    }

    fn from_toml_with(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let mut config: StoreConfig = toml::from_str(raw)
            .map_err(|e| StoreError::Config(format!("failed to parse config: {e}")))?;
        config.database.url = expand_env_vars(&config.database.url, lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Build from `DATABASE_URL` and optional `REFSTORE_MAX_CONNECTIONS`,
    /// after loading a `.env` file if one exists.
    pub fn from_env() -> StoreResult<Self> {
        let _ = dotenvy::dotenv();
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::Config("DATABASE_URL is not set".into()))?;
        let mut config = Self::new(url);
        if let Ok(raw) = std::env::var("REFSTORE_MAX_CONNECTIONS") {
            config.database.max_connections = raw.trim().parse().map_err(|_| {
                StoreError::Config(format!("invalid REFSTORE_MAX_CONNECTIONS: {raw}"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> StoreResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(StoreError::Config("database.url must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(StoreError::Config(
                "database.max_connections must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(StoreError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(StoreError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

fn expand_env_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> StoreResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                return Err(StoreError::Config(format!(
                    "unterminated env var reference: ${{{key}"
                )));
            }
            if key.is_empty() {
                return Err(StoreError::Config("invalid env var reference: ${}".into()));
            }

            let v = lookup(&key).ok_or_else(|| {
                StoreError::Config(format!("missing env var for config expansion: {key}"))
            })?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}
