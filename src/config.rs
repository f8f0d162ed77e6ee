//! Configuration for the reservation engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Expiry reaper configuration
    pub reaper: ReaperConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "reservation-engine".to_string(),
            database: DatabaseConfig::default(),
            reaper: ReaperConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection URL
    pub url: String,

    /// Maximum pool connections
    pub max_connections: u32,

    /// Minimum pool connections
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/bookshop".to_string(),
            max_connections: 20,
            min_connections: 5,
        }
    }
}

/// Expiry reaper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Seconds between sweeps
    pub interval_secs: u64,

    /// Idle seconds after which a cart counts as abandoned
    pub cart_ttl_secs: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            cart_ttl_secs: 60,
        }
    }
}

impl ReaperConfig {
    /// Sweep period as a tokio-compatible duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Cart time-to-live for cutoff arithmetic.
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cart_ttl_secs as i64)
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        if let Ok(secs) = std::env::var("REAPER_INTERVAL_SECS") {
            config.reaper.interval_secs = secs
                .parse()
                .map_err(|e| crate::Error::Config(format!("invalid REAPER_INTERVAL_SECS: {}", e)))?;
        }

        if let Ok(secs) = std::env::var("CART_TTL_SECS") {
            config.reaper.cart_ttl_secs = secs
                .parse()
                .map_err(|e| crate::Error::Config(format!("invalid CART_TTL_SECS: {}", e)))?;
        }

        Ok(config)
    }
}
