//! HTTP client configuration and building logic
//!
//! This module handles the configuration and construction of the HTTP client
//! shared by catalog, capability, broker and download requests.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};

use crate::constants::{http, limits};

/// Configuration for the shared HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Sent with every request; some map servers reject anonymous agents
    pub user_agent: String,
    /// TCP keep-alive settings
    #[serde(with = "humantime_serde")]
    pub tcp_keepalive: Option<Duration>,
    /// TCP nodelay (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum number of idle connections per host
    pub pool_max_per_host: usize,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Rate limit for catalog and capability fetches (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: http::USER_AGENT.to_string(),
            tcp_keepalive: Some(Duration::from_secs(30)),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client with the specified configuration
    pub fn build_http_client(&self) -> reqwest::Result<Client> {
        self.base_builder().timeout(self.request_timeout).build()
    }

    /// Builds a client without an overall request timeout
    ///
    /// Product files can take far longer than one request timeout to stream,
    /// so download callers bound each read themselves.
    pub fn build_streaming_client(&self) -> reqwest::Result<Client> {
        self.base_builder().build()
    }

    fn base_builder(&self) -> ClientBuilder {
        // Both options accept `None` to disable the feature
        Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(self.connect_timeout)
            .tcp_nodelay(self.tcp_nodelay)
            .tcp_keepalive(self.tcp_keepalive)
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_per_host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert!(config.tcp_nodelay);
        assert!(config.user_agent.starts_with("Copernicus-Connect/"));
        assert_eq!(config.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_http_client_with_custom_config() {
        let config = ClientConfig {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            tcp_keepalive: None,
            ..Default::default()
        };

        assert!(config.build_http_client().is_ok());
        assert!(config.build_streaming_client().is_ok());
    }

    #[test]
    fn test_config_toml_durations() {
        let config: ClientConfig = toml::from_str(
            r#"
            tcp_nodelay = false
            pool_max_per_host = 2
            request_timeout = "45s"
            connect_timeout = "5s"
            tcp_keepalive = "1m"
            rate_limit_rps = 3
            user_agent = "qgis-plugin/2.0"
            "#,
        )
        .unwrap();

        assert_eq!(config.request_timeout, Duration::from_secs(45));
        assert_eq!(config.tcp_keepalive, Some(Duration::from_secs(60)));
        assert_eq!(config.pool_idle_timeout, Some(http::POOL_IDLE_TIMEOUT));
        assert_eq!(config.rate_limit_rps, 3);
        assert_eq!(config.user_agent, "qgis-plugin/2.0");
    }
}
