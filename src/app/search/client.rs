//! Broker search client

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::models::{ResultSet, SearchMatch, SearchQuery};
use crate::app::http::HttpHandler;
use crate::constants::search;
use crate::errors::{SearchError, SearchResult};

/// Authenticated access to the data broker
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// GET a broker path and decode the JSON answer
    async fn get(&self, path: &str) -> SearchResult<Value>;

    /// Run a search, stopping after `limit` results when given
    async fn search(&self, query: &SearchQuery, limit: Option<u32>) -> SearchResult<ResultSet>;

    /// Bearer token used for broker calls and file downloads
    fn token(&self) -> Option<String>;
}

/// reqwest implementation of [`SearchClient`]
#[derive(Debug, Clone)]
pub struct BrokerClient {
    http: Arc<HttpHandler>,
    base_url: String,
    token: Option<String>,
}

impl BrokerClient {
    pub fn new(http: Arc<HttpHandler>, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> SearchResult<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| SearchError::InvalidUrl {
            url: raw,
            error: e.to_string(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> SearchResult<RequestBuilder> {
        let token = self.token.as_deref().ok_or(SearchError::MissingToken)?;
        Ok(request.bearer_auth(token))
    }

    async fn send_json(&self, request: RequestBuilder) -> SearchResult<Value> {
        let response = self.http.send(self.authorize(request)?).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::ServerError {
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn fallback_download_url(&self, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, search::DOWNLOAD_PATH, id)
    }
}

#[async_trait]
impl SearchClient for BrokerClient {
    async fn get(&self, path: &str) -> SearchResult<Value> {
        let url = self.url(path)?;
        debug!("Broker GET {}", url);
        self.send_json(self.http.client().get(url)).await
    }

    async fn search(&self, query: &SearchQuery, limit: Option<u32>) -> SearchResult<ResultSet> {
        let url = self.url(search::SEARCH_PATH)?;
        let mut matches = Vec::new();
        let mut start_index = 0u32;

        loop {
            let page_size = match limit {
                Some(limit) => search::PAGE_SIZE.min(limit.saturating_sub(start_index)),
                None => search::PAGE_SIZE,
            };
            if page_size == 0 {
                break;
            }

            let body = query.page_body(start_index, page_size);
            let page = self
                .send_json(self.http.client().post(url.clone()).json(&body))
                .await?;

            let found = matches_in_page(&page, |id| self.fallback_download_url(id));
            let received = found.len() as u32;
            matches.extend(found);
            debug!("Search page at {} returned {} result(s)", start_index, received);

            let total = page
                .pointer("/properties/totalResults")
                .and_then(Value::as_u64);
            start_index += received;
            let exhausted = received < page_size
                || total.map(|t| u64::from(start_index) >= t).unwrap_or(false);
            if exhausted {
                break;
            }
        }

        info!("Search for {} found {} result(s)", query.dataset_id(), matches.len());
        Ok(ResultSet::new(matches))
    }

    fn token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Products in one page of a broker search response
///
/// Features without an `id` are skipped. The download URL is the feature's
/// `properties.location` when present.
pub fn matches_in_page(page: &Value, fallback_url: impl Fn(&str) -> String) -> Vec<SearchMatch> {
    let Some(features) = page.get("features").and_then(Value::as_array) else {
        return Vec::new();
    };

    features
        .iter()
        .filter_map(|feature| {
            let id = feature.get("id")?.as_str()?.to_string();
            let properties = feature.get("properties");
            let size = properties
                .and_then(|p| p.get("size"))
                .and_then(Value::as_u64);
            let download_url = properties
                .and_then(|p| p.get("location"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| fallback_url(&id));
            Some(SearchMatch {
                id,
                size,
                download_url,
            })
        })
        .collect()
}
