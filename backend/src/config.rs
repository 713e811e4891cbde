//! Configuration management for the Stockroom back-office
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with STOCKROOM__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT verification configuration
    pub jwt: JwtConfig,

    /// Document number generation
    pub numbering: NumberingConfig,

    /// Sales document defaults
    pub sales: SalesConfig,

    /// Log output
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,

    /// Apply pending migrations at start-up
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret shared with the identity provider that signs tokens
    pub secret: String,
}

/// Bounds of the retry loop wrapped around document-creating transactions
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct NumberingConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Wall-clock ceiling across all attempts
    pub max_total_ms: u64,
}

impl NumberingConfig {
    pub fn max_total(&self) -> Duration {
        Duration::from_millis(self.max_total_ms)
    }
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_backoff_ms: 20,
            max_backoff_ms: 120,
            max_total_ms: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SalesConfig {
    /// Days between issue and due date when none is given
    pub default_due_days: i64,

    /// Take stock off the shelves as soon as a quote becomes an invoice
    pub reduce_stock_on_conversion: bool,
}

impl Default for SalesConfig {
    fn default() -> Self {
        Self {
            default_due_days: 30,
            reduce_stock_on_conversion: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("STOCKROOM__ENVIRONMENT")
            .or_else(|_| std::env::var("STOCKROOM_ENVIRONMENT"))
            .unwrap_or_else(|_| "development".into());
        let numbering = NumberingConfig::default();
        let sales = SalesConfig::default();

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.run_migrations", environment == "development")?
            .set_default("numbering.max_attempts", numbering.max_attempts)?
            .set_default("numbering.base_backoff_ms", numbering.base_backoff_ms)?
            .set_default("numbering.max_backoff_ms", numbering.max_backoff_ms)?
            .set_default("numbering.max_total_ms", numbering.max_total_ms)?
            .set_default("sales.default_due_days", sales.default_due_days)?
            .set_default("sales.reduce_stock_on_conversion", sales.reduce_stock_on_conversion)?
            .set_default("logging.format", "pretty")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STOCKROOM__ prefix)
            .add_source(
                Environment::with_prefix("STOCKROOM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
