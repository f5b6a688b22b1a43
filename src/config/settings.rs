//! Service settings loading from config.toml
//!
//! Settings are read from a TOML file when one exists and fall back to defaults
//! otherwise. `DATABASE_URL` and `BIND_ADDRESS` from the environment (or `.env`)
//! take precedence over the file.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::core::recurrence::CatchUpPolicy;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Top-level configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP listener settings
    pub server: ServerSettings,
    /// Database settings
    pub database: DatabaseSettings,
    /// Deal defaults and limits
    pub deals: DealSettings,
    /// Background sweep settings
    pub sweep: SweepSettings,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to bind, e.g. `0.0.0.0:8080`
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Database settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection URL understood by `SeaORM`
    pub url: String,
    /// Whether sqlx logs every statement
    pub log_statements: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            log_statements: false,
        }
    }
}

/// Deal defaults and limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DealSettings {
    /// Capacity applied when a new deal does not specify one
    pub default_max_redemptions: i32,
    /// Upper bound on `limit` for list endpoints
    pub max_page_size: u64,
}

impl Default for DealSettings {
    fn default() -> Self {
        Self {
            default_max_redemptions: 100,
            max_page_size: 200,
        }
    }
}

/// Background sweep settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Seconds between sweeps; 0 disables the background task
    pub interval_secs: u64,
    /// How recurring deals that missed several intervals are advanced
    pub catch_up: CatchUpPolicy,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            catch_up: CatchUpPolicy::SingleInterval,
        }
    }
}

impl Settings {
    /// Overrides file values with `DATABASE_URL` and `BIND_ADDRESS` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            debug!("DATABASE_URL overrides configured database url");
            self.database.url = url;
        }
        if let Some(addr) = lookup("BIND_ADDRESS") {
            debug!("BIND_ADDRESS overrides configured bind address");
            self.server.bind_address = addr;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.deals.default_max_redemptions <= 0 {
            return Err(Error::Config {
                message: format!(
                    "deals.default_max_redemptions must be positive, got {}",
                    self.deals.default_max_redemptions
                ),
            });
        }
        if self.deals.max_page_size == 0 {
            return Err(Error::Config {
                message: "deals.max_page_size must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Parses settings from TOML text.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    settings.validate()?;
    Ok(settings)
}

/// Loads settings from a TOML file, using defaults when the file does not exist.
///
/// # Errors
/// Returns an error if:
/// - The file exists but cannot be read
/// - The TOML syntax is invalid or a value has the wrong type
/// - A value is out of range
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No config file at {:?}, using defaults", path);
        let settings = Settings::default();
        settings.validate()?;
        return Ok(settings);
    }

    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path:?}: {e}"),
    })?;
    parse_settings(&contents)
}

/// Loads settings from `CONFIG_PATH` (default `./config.toml`) and applies
/// environment overrides.
pub fn load_default_settings() -> Result<Settings> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let mut settings = load_settings(&path)?;
    settings.apply_overrides(|key| std::env::var(key).ok());
    Ok(settings)
}
