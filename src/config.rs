//! Configuration management for Copernicus Connect
//!
//! This module provides unified configuration management with first-run
//! initialization, multi-source loading, environment overrides and
//! zero-config defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::download::DownloadConfig;
use crate::app::http::ClientConfig;
use crate::constants::{catalog, env, files, limits, search, workers};
use crate::errors::{ConfigError, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Remote catalog and broker endpoints
    pub catalog: CatalogSettings,
    /// HTTP client settings
    pub client: ClientConfig,
    /// Search settings
    pub search: SearchSettings,
    /// Download orchestrator settings
    pub download: DownloadConfig,
    /// Hourly quota settings
    pub quota: QuotaSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Catalog and broker endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Dataset description service
    pub dataset_base_url: String,
    /// Harmonised data access broker
    pub broker_base_url: String,
    /// Request rate for catalog and capability fetches (requests per second)
    pub rate_limit_rps: u32,
    /// Broker bearer token; `HDA_TOKEN` takes precedence
    pub token: Option<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            dataset_base_url: catalog::DATASET_BASE_URL.to_string(),
            broker_base_url: catalog::BROKER_BASE_URL.to_string(),
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            token: None,
        }
    }
}

/// Search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Wall-clock budget of one search
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Result cutoff used when none is stored (0 = unlimited)
    pub default_limit: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            timeout: search::DEFAULT_TIMEOUT,
            default_limit: 0,
        }
    }
}

/// Hourly quota settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSettings {
    /// Downloads allowed per trailing hour
    pub hourly_cap: usize,
    /// Ledger location (defaults to `~/.hda_download_status`)
    pub ledger_path: Option<PathBuf>,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            hourly_cap: limits::HOURLY_DOWNLOAD_CAP,
            ledger_path: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            colored_output: true,
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (if exists)
    /// 3. Environment variables
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        let config_path = match config_file_override {
            Some(ref path) => Some(path.clone()),
            None => Self::find_config_file(),
        };

        if let Some(path) = config_path {
            if path.exists() {
                debug!("Loading config from: {}", path.display());
                config = Self::load_from_file(&path).await?;
            } else if config_file_override.is_some() {
                return Err(ConfigError::NotFound { path }.into());
            }
        }

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `HDA_TIMEOUT` and `HDA_TOKEN` from `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> std::result::Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(env::TIMEOUT) {
            let seconds: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: env::TIMEOUT.to_string(),
                value: raw.clone(),
                reason: "Expected a whole number of seconds".to_string(),
            })?;
            let timeout = Duration::from_secs(seconds);
            debug!("{} overrides timeouts with {:?}", env::TIMEOUT, timeout);
            self.search.timeout = timeout;
            self.client.request_timeout = timeout;
        }

        if let Some(token) = lookup(env::TOKEN).filter(|t| !t.trim().is_empty()) {
            self.catalog.token = Some(token.trim().to_string());
        }

        Ok(())
    }

    /// Check values that would only fail later at runtime
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.catalog.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "catalog.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Rate limit must be greater than zero".to_string(),
            });
        }

        if self.search.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "search.timeout".to_string(),
                value: "0s".to_string(),
                reason: "Search timeout must be greater than zero".to_string(),
            });
        }

        self.download
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                field: "download".to_string(),
                value: format!("{:?}", self.download),
                reason: e.to_string(),
            })
    }

    /// HTTP client configuration with the catalog rate limit applied
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            rate_limit_rps: self.catalog.rate_limit_rps,
            ..self.client.clone()
        }
    }

    /// Initialize configuration on first run
    ///
    /// Creates a default config file if none exists and notifies the user
    pub async fn initialize_first_run() -> Result<Option<PathBuf>> {
        let config_path = Self::get_default_config_path()?;

        if config_path.exists() {
            return Ok(Some(config_path));
        }

        info!("Creating default configuration file...");

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Read {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&config_path, Self::generate_default_config_content())
            .await
            .map_err(|source| ConfigError::Read {
                path: config_path.clone(),
                source,
            })?;

        println!("Created default configuration file:");
        println!("   {}", config_path.display());
        println!("   You can customize settings by editing this file.");
        println!();

        Ok(Some(config_path))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from("./copernicus-connect.toml")];
        if let Ok(path) = Self::get_default_config_path() {
            search_paths.push(path);
        }

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Get the default config file path for the current user
    pub fn get_default_config_path() -> std::result::Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDirectory)?;
        Ok(config_dir.join("copernicus-connect").join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::from)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    fn generate_default_config_content() -> String {
        format!(
            r#"# Copernicus Connect Configuration
# This file was automatically generated on first run.

[catalog]
dataset_base_url = "{}"
broker_base_url = "{}"
rate_limit_rps = {}
# token = "..."  # HDA_TOKEN takes precedence

[client]
request_timeout = "60s"
connect_timeout = "30s"

[search]
timeout = "{}s"  # overridden by HDA_TIMEOUT
default_limit = 0  # 0 = unlimited

[download]
worker_count = {}
max_attempts = {}
retry_delay = "{}s"
request_timeout = "{}s"
chunk_size = {}

[quota]
hourly_cap = {}
# ledger_path = "/path/to/{}"

[logging]
level = "info"  # error, warn, info, debug, trace
colored_output = true
"#,
            catalog::DATASET_BASE_URL,
            catalog::BROKER_BASE_URL,
            limits::DEFAULT_RATE_LIMIT_RPS,
            search::DEFAULT_TIMEOUT.as_secs(),
            workers::DEFAULT_WORKER_COUNT,
            workers::MAX_ATTEMPTS,
            workers::RETRY_DELAY.as_secs(),
            workers::REQUEST_TIMEOUT.as_secs(),
            files::DOWNLOAD_CHUNK_SIZE,
            limits::HOURLY_DOWNLOAD_CAP,
            files::LEDGER_FILE_NAME,
        )
    }
}
