//! Download orchestrator configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{files, workers};
use crate::errors::{DownloadError, DownloadResult};

/// Configuration for a download batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Number of items downloaded concurrently
    pub worker_count: usize,
    /// Attempts per item, including the first
    pub max_attempts: u32,
    /// Fixed wait between failed attempts
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Limit for receiving response headers and for each body read
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Capacity of the event channel created by callers
    pub event_buffer_size: usize,
    /// Write buffer size for streamed product files
    pub chunk_size: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            worker_count: workers::DEFAULT_WORKER_COUNT,
            max_attempts: workers::MAX_ATTEMPTS,
            retry_delay: workers::RETRY_DELAY,
            request_timeout: workers::REQUEST_TIMEOUT,
            event_buffer_size: workers::EVENT_BUFFER_SIZE,
            chunk_size: files::DOWNLOAD_CHUNK_SIZE,
        }
    }
}

impl DownloadConfig {
    /// Validate configuration values and return errors for invalid settings
    pub fn validate(&self) -> DownloadResult<()> {
        if self.worker_count == 0 {
            return Err(DownloadError::ConfigurationError(
                "Worker count cannot be zero".to_string(),
            ));
        }

        if self.worker_count > workers::MAX_WORKER_COUNT {
            return Err(DownloadError::ConfigurationError(format!(
                "Worker count ({}) exceeds maximum ({})",
                self.worker_count,
                workers::MAX_WORKER_COUNT
            )));
        }

        if self.max_attempts == 0 {
            return Err(DownloadError::ConfigurationError(
                "At least one attempt per item is required".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(DownloadError::ConfigurationError(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(DownloadError::ConfigurationError(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        if self.chunk_size == 0 {
            return Err(DownloadError::ConfigurationError(
                "Chunk size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for DownloadConfig
#[derive(Debug, Default)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Build the configuration, validating it first
    pub fn build(self) -> DownloadResult<DownloadConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_provider_policy() {
        let config = DownloadConfig::default();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        assert!(DownloadConfigBuilder::new().worker_count(0).build().is_err());
        assert!(DownloadConfigBuilder::new().worker_count(64).build().is_err());
        assert!(DownloadConfigBuilder::new().max_attempts(0).build().is_err());
        assert!(DownloadConfigBuilder::new()
            .request_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_toml_durations() {
        let config: DownloadConfig = toml::from_str(
            r#"
            worker_count = 2
            retry_delay = "250ms"
            "#,
        )
        .unwrap();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.max_attempts, 3);
    }
}
