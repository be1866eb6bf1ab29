//! Service root normalization
//!
//! Raw layer URLs found in dataset descriptions point at tiles, exports or
//! time-specific requests. These helpers reduce them to the service root,
//! apply the host-specific rewrites and produce GetCapabilities URLs.

use url::Url;

use super::models::ServiceType;
use crate::constants::{catalog, services};

/// Reduce a hierarchical dataset identifier to the one the description service knows
///
/// Sub-product identifiers of the marine provider carry a fifth segment that
/// names a single product. Those are cut back to their first four segments.
/// Anything else is returned unchanged.
pub fn normalize_dataset_id(dataset_id: &str) -> String {
    let parts: Vec<&str> = dataset_id.split(':').collect();
    let is_sub_product = parts.len() > catalog::PARENT_ID_SEGMENTS
        && (parts[catalog::PARENT_ID_SEGMENTS].starts_with(catalog::PROVIDER_PREFIX)
            || catalog::ORGANIZATION_CODES.contains(&parts[1]));

    if is_sub_product {
        parts[..catalog::PARENT_ID_SEGMENTS].join(":")
    } else {
        dataset_id.to_string()
    }
}

/// Service root of a raw layer URL, without query or fragment
///
/// The final path segment is dropped unless it already names a service
/// endpoint. Returns `None` when the URL cannot be parsed or has no path.
pub fn service_root(raw: &str) -> Option<Url> {
    let mut url = Url::parse(raw.trim()).ok()?;
    let trimmed = url.path().trim_end_matches('/').to_string();
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.len() <= 1 {
        return None;
    }

    let last = parts[parts.len() - 1];
    let kept = if services::ENDPOINT_TOKENS.contains(&last) {
        &parts[..]
    } else {
        &parts[..parts.len() - 1]
    };

    url.set_path(&format!("{}/", kept.join("/")));
    url.set_query(None);
    url.set_fragment(None);
    Some(url)
}

/// Rewrite an ArcGIS REST root into its WMSServer form
///
/// The `rest` segment is removed, and `MapServer` or `ImageServer` roots gain
/// a trailing `WMSServer` segment. Applying the rewrite twice is a no-op.
pub fn arcgis_wms_root(url: &Url) -> Url {
    let mut parts: Vec<String> = url
        .path()
        .trim_matches('/')
        .split('/')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();

    if let Some(idx) = parts.iter().position(|part| part == "rest") {
        parts.remove(idx);
    }

    let is_server_root = parts
        .last()
        .map(|last| {
            let last = last.to_ascii_lowercase();
            last == "mapserver" || last == "imageserver"
        })
        .unwrap_or(false);
    if is_server_root {
        parts.push("WMSServer".to_string());
    }

    let mut rewritten = url.clone();
    rewritten.set_path(&format!("/{}/", parts.join("/")));
    rewritten.set_query(None);
    rewritten.set_fragment(None);
    rewritten
}

/// Apply host rewrites to a service root and decide its protocol
pub fn classify_service(root: &Url) -> (Url, ServiceType) {
    let text = root.as_str();
    let lower = text.to_ascii_lowercase();

    let (url, service_type) = if lower.contains(services::GIOLANDPUBLIC_PATTERN) {
        (arcgis_wms_root(root), ServiceType::Wms)
    } else if lower.contains(services::GEOSERVER_PATTERN) {
        (append_segment(root, services::GEOSERVER_SUFFIX), ServiceType::Wms)
    } else if lower.contains(services::MARINE_WMTS_PATTERN) {
        (append_segment(root, services::MARINE_WMTS_SUFFIX), ServiceType::Wmts)
    } else if root.path().to_ascii_lowercase().contains("wmts") {
        (root.clone(), ServiceType::Wmts)
    } else {
        (root.clone(), ServiceType::Wms)
    };

    if url.as_str().starts_with(services::ARCGIS_REST_PREFIX) {
        (arcgis_wms_root(&url), service_type)
    } else {
        (url, service_type)
    }
}

fn append_segment(root: &Url, segment: &str) -> Url {
    let mut url = root.clone();
    let path = format!("{}{}", url.path(), segment);
    url.set_path(&path);
    url
}

/// Guess the protocol of a URL that came without any structured hint
pub fn infer_service_type(url: &str) -> ServiceType {
    let lower = url.to_ascii_lowercase();
    if lower.contains("service=wmts") || lower.contains("wmts") {
        ServiceType::Wmts
    } else {
        ServiceType::Wms
    }
}

/// Whether the URL already requests a capabilities document
pub fn requests_capabilities(url: &str) -> bool {
    url.to_ascii_lowercase().contains("request=getcapabilities")
}

fn has_query_key(url: &str, key: &str) -> bool {
    url.split_once('?')
        .map(|(_, query)| {
            query
                .split('&')
                .filter_map(|pair| pair.split('=').next())
                .any(|name| name.eq_ignore_ascii_case(key))
        })
        .unwrap_or(false)
}

/// Turn a service root into a GetCapabilities URL
///
/// Idempotent: a URL that already carries `request=GetCapabilities` is
/// returned unchanged, and an existing `service` parameter is kept.
pub fn append_get_capabilities(url: &str, service_type: ServiceType) -> String {
    if requests_capabilities(url) {
        return url.to_string();
    }

    let mut out = url.to_string();
    if !out.contains('?') {
        out.push('?');
    } else if !out.ends_with('?') && !out.ends_with('&') {
        out.push('&');
    }

    if !has_query_key(url, "service") {
        out.push_str("service=");
        out.push_str(service_type.as_str());
        out.push('&');
    }
    out.push_str("request=GetCapabilities");
    out
}

/// Key used to deduplicate endpoints: the URL without query and trailing slash
pub fn dedup_key(url: &str) -> String {
    let base = url.split(['?', '#']).next().unwrap_or(url);
    base.trim_end_matches('/').to_string()
}
