//! Dataset identifier to capability URL resolution

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use super::endpoints::{
    append_get_capabilities, classify_service, dedup_key, infer_service_type,
    normalize_dataset_id, requests_capabilities, service_root,
};
use super::models::{DatasetDocument, NotAvailableReason, Resolution, ServiceEndpoint, ServiceType};
use crate::app::http::HttpHandler;
use crate::constants::catalog;
use crate::errors::{CatalogError, CatalogResult};

/// Source of dataset description documents
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Fetch the description of an already normalized identifier
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` when the document cannot be fetched or decoded.
    async fn fetch_description(&self, dataset_id: &str) -> CatalogResult<DatasetDocument>;
}

/// HTTP client for the dataset description service
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Arc<HttpHandler>,
    base_url: String,
}

impl CatalogClient {
    pub fn new(http: Arc<HttpHandler>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Client for the public description service
    pub fn with_default_base(http: Arc<HttpHandler>) -> Self {
        Self::new(http, catalog::DATASET_BASE_URL)
    }

    fn description_url(&self, dataset_id: &str) -> CatalogResult<Url> {
        let raw = format!("{}/{}", self.base_url, dataset_id);
        Url::parse(&raw).map_err(|e| CatalogError::InvalidUrl {
            url: raw,
            error: e.to_string(),
        })
    }
}

#[async_trait]
impl DatasetSource for CatalogClient {
    async fn fetch_description(&self, dataset_id: &str) -> CatalogResult<DatasetDocument> {
        let url = self.description_url(dataset_id)?;
        let response = self.http.get_response(&url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::ServerError {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Resolves dataset identifiers to capability endpoints
pub struct EndpointResolver<S> {
    source: S,
}

impl<S: DatasetSource> EndpointResolver<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Resolve a dataset identifier
    ///
    /// Never fails: fetch problems and empty descriptions both come back as
    /// [`Resolution::NotAvailable`].
    pub async fn resolve(&self, dataset_id: &str) -> Resolution {
        let normalized = normalize_dataset_id(dataset_id);
        if normalized != dataset_id {
            debug!("Normalized dataset id {} to {}", dataset_id, normalized);
        }

        let document = match self.source.fetch_description(&normalized).await {
            Ok(document) => document,
            Err(e) => {
                warn!("Could not fetch description for {}: {}", normalized, e);
                return Resolution::NotAvailable {
                    dataset_id: dataset_id.to_string(),
                    reason: NotAvailableReason::FetchFailed(e.to_string()),
                };
            }
        };

        let resolution = resolve_document(dataset_id, &document);
        match &resolution {
            Resolution::Resolved { endpoints, .. } => {
                info!("Resolved {} to {} endpoint(s)", dataset_id, endpoints.len())
            }
            Resolution::NotAvailable { .. } => {
                info!("No service URLs found for {}", dataset_id)
            }
        }
        resolution
    }
}

/// Endpoints accumulated in discovery order, unique by base URL
struct EndpointSet {
    dataset_id: String,
    seen: HashSet<String>,
    endpoints: Vec<ServiceEndpoint>,
}

impl EndpointSet {
    fn new(dataset_id: &str) -> Self {
        Self {
            dataset_id: dataset_id.to_string(),
            seen: HashSet::new(),
            endpoints: Vec::new(),
        }
    }

    fn push(&mut self, capabilities_url: String, service_type: ServiceType) {
        if self.seen.insert(dedup_key(&capabilities_url)) {
            self.endpoints.push(ServiceEndpoint {
                capabilities_url,
                service_type,
                dataset_id: self.dataset_id.clone(),
            });
        }
    }

    fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Run the resolution cascade over a fetched description
///
/// Branches are tried in order and the first that yields anything wins:
/// capability hrefs from the STAC bundle, the per-layer URL table, plain STAC
/// hrefs, then URLs embedded in the raw metadata record.
pub fn resolve_document(dataset_id: &str, document: &DatasetDocument) -> Resolution {
    let mut found = EndpointSet::new(dataset_id);
    let stac_hrefs = document.stac_hrefs();

    // Hrefs under `assets.wmts` are WMTS services whatever their URL says
    if stac_hrefs.iter().any(|href| requests_capabilities(href)) {
        for href in &stac_hrefs {
            found.push(href.clone(), ServiceType::Wmts);
        }
    }

    if found.is_empty() {
        for raw in document.layers.values().flat_map(|layer| layer.urls()) {
            let Some(root) = service_root(&raw) else {
                debug!("Skipping unparseable layer URL {}", raw);
                continue;
            };
            let (url, service_type) = classify_service(&root);
            found.push(append_get_capabilities(url.as_str(), service_type), service_type);
        }
    }

    if found.is_empty() {
        for href in &stac_hrefs {
            found.push(append_get_capabilities(href, ServiceType::Wmts), ServiceType::Wmts);
        }
    }

    if found.is_empty() {
        if let Some(raw) = document.raw_metadata.as_deref() {
            for url in capability_urls_in_metadata(raw) {
                let service_type = infer_service_type(&url);
                found.push(url, service_type);
            }
        }
    }

    if found.is_empty() {
        Resolution::NotAvailable {
            dataset_id: dataset_id.to_string(),
            reason: NotAvailableReason::NoServiceUrls,
        }
    } else {
        Resolution::Resolved {
            endpoints: found.endpoints,
            display_title: document.display_title(),
        }
    }
}

/// Capability URLs in `<URL>` elements of an ISO metadata record
///
/// The record is scanned as text, not parsed: it is often not well formed,
/// and element content may hold raw `&` or HTML entities. Any namespace
/// prefix on the tag is accepted. Only `&amp;` is unescaped.
pub fn capability_urls_in_metadata(raw: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let mut rest = raw;

    while let Some((content, after)) = next_url_element(rest) {
        let value = content.trim().replace("&amp;", "&");
        if value.contains("GetCapabilities") {
            urls.push(value);
        }
        rest = after;
    }

    urls
}

/// Content of the next `<[prefix:]URL>` element and the text after it
fn next_url_element(text: &str) -> Option<(&str, &str)> {
    let mut cursor = 0;
    loop {
        let open = cursor + text[cursor..].find('<')?;
        let close = open + text[open..].find('>')?;
        let tag = &text[open + 1..close];
        if let Some(inner) = tag.rfind('<') {
            // Stray `<` in text, look again from the later one
            cursor = open + 1 + inner;
            continue;
        }
        cursor = close + 1;

        if !tag.starts_with('/') && is_url_tag(tag) {
            let body = &text[cursor..];
            let end = find_url_end_tag(body)?;
            let after = &body[end..];
            let after = after.find('>').map_or("", |i| &after[i + 1..]);
            return Some((&body[..end], after));
        }
    }
}

/// Offset of the next `</[prefix:]URL>` in `text`
fn find_url_end_tag(text: &str) -> Option<usize> {
    let mut cursor = 0;
    loop {
        let open = cursor + text[cursor..].find("</")?;
        let close = open + text[open..].find('>')?;
        if is_url_tag(&text[open + 2..close]) {
            return Some(open);
        }
        cursor = open + 2;
    }
}

fn is_url_tag(tag: &str) -> bool {
    let name = tag.split_whitespace().next().unwrap_or_default();
    name.rsplit(':').next() == Some("URL")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: serde_json::Value) -> DatasetDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_stac_capability_hrefs_are_final() {
        let doc = document(json!({
            "title": "Ocean currents",
            "stacData": {
                "cur": {"assets": {"wmts": {"href": "https://wmts.marine.copernicus.eu/teroWmts/GLO/cur?request=GetCapabilities&service=WMS"}}}
            },
            "layers": {
                "l1": {"wmtsUrl": "https://wmts.marine.copernicus.eu/teroWmts/GLO/other/tile"}
            }
        }));

        let resolution = resolve_document("EO:MO:DAT:GLO", &doc);
        let endpoints = resolution.endpoints();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].service_type, ServiceType::Wmts);
        assert_eq!(
            endpoints[0].capabilities_url,
            "https://wmts.marine.copernicus.eu/teroWmts/GLO/cur?request=GetCapabilities&service=WMS"
        );
    }

    #[test]
    fn test_layer_table_is_deduplicated() {
        let doc = document(json!({
            "title": "Land cover",
            "layers": {
                "a": {"timeSpecificUrls": [
                    "https://maps.example.org/geo/WMS?layers=a&time=2020",
                    "https://maps.example.org/geo/WMS?layers=a&time=2021"
                ]},
                "b": {"wmtsUrl": ["https://maps.example.org/geo/WMS?layers=b"]}
            }
        }));

        let resolution = resolve_document("X:Y:Z:W", &doc);
        assert_eq!(
            resolution,
            Resolution::Resolved {
                endpoints: vec![ServiceEndpoint {
                    capabilities_url: "https://maps.example.org/geo/WMS/?service=WMS&request=GetCapabilities".to_string(),
                    service_type: ServiceType::Wms,
                    dataset_id: "X:Y:Z:W".to_string(),
                }],
                display_title: "Land cover".to_string(),
            }
        );
    }

    #[test]
    fn test_plain_stac_hrefs_used_when_no_layers() {
        let doc = document(json!({
            "stacData": {"x": {"assets": {"wmts": {"href": "https://tiles.example.org/wmts"}}}}
        }));

        let resolution = resolve_document("A:B:C:D", &doc);
        let endpoints = resolution.endpoints();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(
            endpoints[0].capabilities_url,
            "https://tiles.example.org/wmts?service=WMTS&request=GetCapabilities"
        );
    }

    #[test]
    fn test_raw_metadata_fallback() {
        let raw = r#"<gmd:MD_Metadata xmlns:gmd="http://www.isotc211.org/2005/gmd">
            <gmd:onLine><gmd:CI_OnlineResource><gmd:linkage>
              <gmd:URL>https://maps.example.org/wms?service=WMS&amp;request=GetCapabilities</gmd:URL>
            </gmd:linkage></gmd:CI_OnlineResource></gmd:onLine>
            <gmd:onLine><gmd:linkage><gmd:URL>https://example.org/download.zip</gmd:URL></gmd:linkage></gmd:onLine>
        </gmd:MD_Metadata>"#;
        let doc = DatasetDocument {
            raw_metadata: Some(raw.to_string()),
            ..Default::default()
        };

        let resolution = resolve_document("A:B:C:D", &doc);
        let endpoints = resolution.endpoints();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(
            endpoints[0].capabilities_url,
            "https://maps.example.org/wms?service=WMS&request=GetCapabilities"
        );
        assert_eq!(endpoints[0].service_type, ServiceType::Wms);
    }

    #[test]
    fn test_metadata_scan_survives_broken_markup() {
        let raw = "<a>x</b></c><gmd:URL>https://a.org/wms?request=GetCapabilities</gmd:URL>\
                   <URL>https://b.org/wmts?request=GetCapabilities</URL><<< trailing <gmd:URL>";
        assert_eq!(
            capability_urls_in_metadata(raw),
            vec![
                "https://a.org/wms?request=GetCapabilities",
                "https://b.org/wmts?request=GetCapabilities",
            ]
        );
    }

    #[test]
    fn test_metadata_scan_keeps_raw_ampersands_and_entities() {
        let raw = "<gmd:URL>https://a.org/wms?service=WMS&request=GetCapabilities</gmd:URL>\
                   <gmd:URL>https://c.org/ows?request=GetCapabilities&amp;map=%2Fa&nbsp;</gmd:URL>\
                   <gmd:URL>https://c.org/data.zip?x=1&amp;y=2</gmd:URL>";
        assert_eq!(
            capability_urls_in_metadata(raw),
            vec![
                "https://a.org/wms?service=WMS&request=GetCapabilities",
                "https://c.org/ows?request=GetCapabilities&map=%2Fa&nbsp;",
            ]
        );
    }

    #[test]
    fn test_metadata_scan_ignores_other_elements() {
        let raw = "a < b </gmd:URL> <gmd:URLSet>https://x.org?request=GetCapabilities</gmd:URLSet>\
                   <gmd:URL xml:lang=\"en\"> https://d.org/wms?request=GetCapabilities </gmd:URL>";
        assert_eq!(
            capability_urls_in_metadata(raw),
            vec!["https://d.org/wms?request=GetCapabilities"]
        );
    }

    #[test]
    fn test_stac_hrefs_are_always_wmts() {
        let doc = document(json!({
            "stacData": {
                "a": {"assets": {"wmts": {"href": "https://tiles.example.org/ows?request=GetCapabilities"}}}
            }
        }));
        let endpoints = resolve_document("A:B:C:D", &doc).endpoints().to_vec();
        assert_eq!(endpoints[0].service_type, ServiceType::Wmts);

        let doc = document(json!({
            "stacData": {"b": {"assets": {"wmts": {"href": "https://tiles.example.org/ows"}}}}
        }));
        let endpoints = resolve_document("A:B:C:D", &doc).endpoints().to_vec();
        assert_eq!(endpoints[0].service_type, ServiceType::Wmts);
        assert_eq!(
            endpoints[0].capabilities_url,
            "https://tiles.example.org/ows?service=WMTS&request=GetCapabilities"
        );
    }

    #[test]
    fn test_malformed_layer_table_still_reaches_metadata() {
        let doc = document(json!({
            "layers": null,
            "stacData": {"x": {"assets": []}},
            "rawMetadata": "<gmd:URL>https://e.org/wms?service=WMS&amp;request=GetCapabilities</gmd:URL>"
        }));

        let resolution = resolve_document("A:B:C:D", &doc);
        assert_eq!(
            resolution.endpoints()[0].capabilities_url,
            "https://e.org/wms?service=WMS&request=GetCapabilities"
        );
    }

    #[test]
    fn test_empty_description_is_not_available() {
        let resolution = resolve_document("A:B:C:D", &DatasetDocument::default());
        assert_eq!(
            resolution,
            Resolution::NotAvailable {
                dataset_id: "A:B:C:D".to_string(),
                reason: NotAvailableReason::NoServiceUrls,
            }
        );
    }
}
