//! Configuration management for the visit analytics dashboard.
//!
//! This module handles loading and managing application configuration
//! from an optional configuration file and environment variables.

use std::env;

use config::{Config as ConfigBuilder, ConfigError, Environment, File};

use crate::core::analytics::DEFAULT_TOP_LIMIT;
use crate::core::timeline::DEFAULT_BUCKET_MINUTES;
use crate::models::Config;

/// Environment variable prefix, e.g. `APP_DASHBOARD__TOP_LIMIT=20`
pub const ENV_PREFIX: &str = "APP";

/// Load configuration from the configuration file and environment variables
pub fn load_config() -> Result<Config, ConfigError> {
    let config_file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config/default.toml".to_string());
    load_config_from(&config_file)
}

/// Load configuration layering `config_file` (if present) and `APP_*` variables over defaults
pub fn load_config_from(config_file: &str) -> Result<Config, ConfigError> {
    let config = ConfigBuilder::builder()
        .set_default("dashboard.top_limit", DEFAULT_TOP_LIMIT as u64)?
        .set_default("dashboard.bucket_minutes", u64::from(DEFAULT_BUCKET_MINUTES))?
        .set_default("export.output_dir", "exports")?
        .add_source(File::with_name(config_file).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}
