//! Rate-limited HTTP operations
//!
//! Catalog and capability fetches go through a single [`HttpHandler`] so the
//! remote services see a bounded request rate no matter how many datasets the
//! caller resolves in a row.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Jitter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder};
use url::Url;

use super::config::ClientConfig;
use crate::errors::ConfigError;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// HTTP operations handler with request rate limiting
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: DirectRateLimiter,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limit
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the rate limit is zero
    pub fn new(client: Client, rate_limit_rps: u32) -> Result<Self, ConfigError> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// Builds a handler and its client from configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = config
            .build_http_client()
            .map_err(|e| ConfigError::InvalidValue {
                field: "client".to_string(),
                value: String::new(),
                reason: e.to_string(),
            })?;
        Self::new(client, config.rate_limit_rps)
    }

    fn build_rate_limiter(rate_limit_rps: u32) -> Result<DirectRateLimiter, ConfigError> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| ConfigError::InvalidValue {
            field: "rate_limit_rps".to_string(),
            value: rate_limit_rps.to_string(),
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Issues a rate-limited GET and returns the raw response
    ///
    /// Status codes are not interpreted here; callers map them onto their
    /// own error types.
    pub async fn get_response(&self, url: &Url) -> reqwest::Result<reqwest::Response> {
        tracing::debug!("GET {}", url);
        self.send(self.client.get(url.as_str())).await
    }

    /// Sends a prepared request once the rate limiter admits it
    pub async fn send(&self, request: RequestBuilder) -> reqwest::Result<reqwest::Response> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;
        request.send().await
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_creation() {
        let rate_limiter = HttpHandler::build_rate_limiter(5).unwrap();
        rate_limiter.until_ready().await;
    }

    #[test]
    fn test_rate_limiter_zero_fails() {
        let result = HttpHandler::build_rate_limiter(0);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[tokio::test]
    async fn test_http_handler_from_config() {
        let handler = HttpHandler::from_config(&ClientConfig::default());
        assert!(handler.is_ok());
    }
}
