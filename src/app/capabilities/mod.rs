//! OGC capability document fetching and parsing
//!
//! [`parse_wms_document`] and [`parse_wmts_document`] are pure functions over
//! the document text. [`LayerCatalog`] fetches documents for resolved
//! endpoints and applies the per-protocol failure policy.

pub mod models;
pub mod wms;
pub mod wmts;
mod xml;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

pub use models::{Capabilities, LayerRecord, ServiceMetadata};
pub use wms::parse_wms_document;
pub use wmts::parse_wmts_document;

use crate::app::catalog::{ServiceEndpoint, ServiceType};
use crate::app::http::HttpHandler;
use crate::constants::services;
use crate::errors::{CapabilitiesError, CapabilitiesResult};

/// Capability URL with query and fragment removed
///
/// # Errors
///
/// Returns `CapabilitiesError::InvalidUrl` when the URL cannot be parsed.
pub fn strip_query(url: &str) -> CapabilitiesResult<String> {
    let mut parsed = parse_url(url)?;
    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed.to_string())
}

/// GetCapabilities request URL for a service
///
/// Existing query parameters are kept; `service`, `request` and `version`
/// are only added when not already present (compared case-insensitively).
///
/// # Errors
///
/// Returns `CapabilitiesError::InvalidUrl` when the URL cannot be parsed.
pub fn capabilities_request_url(url: &str, service_type: ServiceType) -> CapabilitiesResult<Url> {
    let mut parsed = parse_url(url)?;
    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let version = match service_type {
        ServiceType::Wms => services::WMS_VERSION,
        ServiceType::Wmts => services::WMTS_VERSION,
    };
    let defaults = [
        ("service", service_type.as_str()),
        ("request", "GetCapabilities"),
        ("version", version),
    ];
    for (key, value) in defaults {
        if !pairs.iter().any(|(k, _)| k.eq_ignore_ascii_case(key)) {
            pairs.push((key.to_string(), value.to_string()));
        }
    }

    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    Ok(parsed)
}

fn parse_url(url: &str) -> CapabilitiesResult<Url> {
    Url::parse(url).map_err(|e| CapabilitiesError::InvalidUrl {
        url: url.to_string(),
        error: e.to_string(),
    })
}

/// Source of raw capability documents
#[async_trait]
pub trait CapabilitiesFetcher: Send + Sync {
    /// Fetch the document at a GetCapabilities request URL
    ///
    /// # Errors
    ///
    /// Returns `CapabilitiesError` on transport failures and non-success statuses.
    async fn fetch_document(&self, url: &Url) -> CapabilitiesResult<String>;
}

#[async_trait]
impl CapabilitiesFetcher for HttpHandler {
    async fn fetch_document(&self, url: &Url) -> CapabilitiesResult<String> {
        let response = self.get_response(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CapabilitiesError::ServerError {
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl<T: CapabilitiesFetcher + ?Sized> CapabilitiesFetcher for Arc<T> {
    async fn fetch_document(&self, url: &Url) -> CapabilitiesResult<String> {
        (**self).fetch_document(url).await
    }
}

/// Builds layer catalogs for resolved endpoints
pub struct LayerCatalog<F> {
    fetcher: F,
}

impl<F: CapabilitiesFetcher> LayerCatalog<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Fetch and parse one capability URL
    ///
    /// Both protocols report failures the same way here.
    ///
    /// # Errors
    ///
    /// Returns `CapabilitiesError` on invalid URLs, transport failures or
    /// malformed documents.
    pub async fn fetch(&self, url: &str, service_type: ServiceType) -> CapabilitiesResult<Capabilities> {
        let base_url = strip_query(url)?;
        let request = capabilities_request_url(url, service_type)?;
        debug!("Fetching {} capabilities from {}", service_type, request);

        let document = self.fetcher.fetch_document(&request).await?;
        match service_type {
            ServiceType::Wms => parse_wms_document(&document, &base_url),
            ServiceType::Wmts => parse_wmts_document(&document, &base_url),
        }
    }

    /// Layers of a resolved endpoint
    ///
    /// A WMS endpoint that cannot be fetched or parsed yields an empty
    /// catalog and a warning, so callers can fall back to other sources.
    /// WMTS failures are returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns `CapabilitiesError` for WMTS endpoints only.
    pub async fn layers_for(&self, endpoint: &ServiceEndpoint) -> CapabilitiesResult<Capabilities> {
        let result = self
            .fetch(&endpoint.capabilities_url, endpoint.service_type)
            .await;

        match (endpoint.service_type, result) {
            (ServiceType::Wms, Err(e)) => {
                warn!(
                    "No WMS layers for {} ({}): {}",
                    endpoint.dataset_id, endpoint.capabilities_url, e
                );
                let base_url = strip_query(&endpoint.capabilities_url)
                    .unwrap_or_else(|_| endpoint.capabilities_url.clone());
                Ok(Capabilities::empty(ServiceType::Wms, base_url))
            }
            (_, result) => result,
        }
    }
}
