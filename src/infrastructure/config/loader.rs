use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use std::path::Path;
use thiserror::Error;

use crate::domain::models::Config;

/// Project configuration directory, relative to the working directory.
pub const CONFIG_DIR: &str = ".fleetmon";

/// Prefix of environment overrides; nested keys are split on `__`.
pub const ENV_PREFIX: &str = "FLEETMON_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_workers: {0}. Must be at least 1")]
    InvalidMaxWorkers(usize),

    #[error("Invalid batch_size: {0}. Must be at least 1")]
    InvalidBatchSize(usize),

    #[error("Invalid page_size: {0}. Must be at least 1")]
    InvalidPageSize(usize),

    #[error("Invalid max_pages: {0}. Must be at least 1")]
    InvalidMaxPages(u32),

    #[error("Invalid auth_attempts: {0}. Must be at least 1")]
    InvalidAuthAttempts(u32),

    #[error(
        "Invalid timeouts: request_timeout_secs ({0}) must be positive and not above timeout_ceiling_secs ({1})"
    )]
    InvalidTimeouts(u64, u64),

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error("Invalid burst_size: {0}. Must be at least 1")]
    InvalidBurstSize(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("{0} base_url cannot be empty")]
    EmptyBaseUrl(&'static str),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .fleetmon/config.yaml
    /// 3. .fleetmon/local.yaml (optional local overrides)
    /// 4. `extra`, usually the file named by `--config`
    /// 5. Environment variables (FLEETMON_* prefix, highest priority)
    pub fn load(extra: Option<&Path>) -> Result<Config> {
        Self::load_in(Path::new(CONFIG_DIR), extra)
    }

    /// [`load`](Self::load) with the project directory given explicitly.
    pub fn load_in(project_dir: &Path, extra: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(project_dir.join("config.yaml")))
            .merge(Yaml::file(project_dir.join("local.yaml")));
        if let Some(path) = extra {
            anyhow::ensure!(path.exists(), "Config file {} not found", path.display());
            figment = figment.merge(Yaml::file(path));
        }

        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a single file over the defaults, ignoring
    /// the environment.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.monitoring.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl("monitoring"));
        }
        if config.inventory.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl("inventory"));
        }

        if config.dispatch.max_workers == 0 {
            return Err(ConfigError::InvalidMaxWorkers(config.dispatch.max_workers));
        }
        if config.dispatch.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(config.dispatch.batch_size));
        }

        if config.inventory.page_size == 0 {
            return Err(ConfigError::InvalidPageSize(config.inventory.page_size));
        }
        if config.inventory.max_pages == 0 {
            return Err(ConfigError::InvalidMaxPages(config.inventory.max_pages));
        }

        let monitoring = &config.monitoring;
        if monitoring.auth_attempts == 0 {
            return Err(ConfigError::InvalidAuthAttempts(monitoring.auth_attempts));
        }
        if monitoring.request_timeout_secs == 0
            || monitoring.request_timeout_secs > monitoring.timeout_ceiling_secs
        {
            return Err(ConfigError::InvalidTimeouts(
                monitoring.request_timeout_secs,
                monitoring.timeout_ceiling_secs,
            ));
        }

        if config.rate_limit.requests_per_second <= 0.0 {
            return Err(ConfigError::InvalidRateLimit(
                config.rate_limit.requests_per_second,
            ));
        }
        if config.rate_limit.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(config.rate_limit.burst_size));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}
