//! Catalog data types
//!
//! Documents returned by the dataset description service are deserialized
//! leniently: every field is optional and a URL table may hold either a single
//! string or a list of strings. A field that is `null` or of an unexpected
//! shape reads as empty, so one odd entry never hides the rest of the
//! document.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::constants::catalog;

/// OGC mapping service family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceType {
    /// Web Map Service, rendered on demand
    Wms,
    /// Web Map Tile Service, pre-rendered tiles
    Wmts,
}

impl ServiceType {
    /// Protocol tag as used in `service=` query parameters
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Wms => "WMS",
            ServiceType::Wmts => "WMTS",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wms" => Ok(ServiceType::Wms),
            "wmts" => Ok(ServiceType::Wmts),
            other => Err(format!("unknown service type '{}', expected wms or wmts", other)),
        }
    }
}

/// A resolved capability-document URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// GetCapabilities URL
    pub capabilities_url: String,
    /// Declared protocol family
    pub service_type: ServiceType,
    /// Identifier the resolution was requested for
    pub dataset_id: String,
}

/// Why a dataset produced no endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotAvailableReason {
    /// Description document could not be fetched or decoded
    FetchFailed(String),
    /// Description was fetched but no branch yielded a URL
    NoServiceUrls,
}

/// Outcome of resolving one dataset identifier
///
/// `NotAvailable` is a normal outcome, not an error: callers offer a fallback
/// data source instead of reporting a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// At least one capability URL was found
    Resolved {
        endpoints: Vec<ServiceEndpoint>,
        display_title: String,
    },
    /// Nothing usable for this identifier
    NotAvailable {
        dataset_id: String,
        reason: NotAvailableReason,
    },
}

impl Resolution {
    /// Endpoints of a successful resolution, empty otherwise
    pub fn endpoints(&self) -> &[ServiceEndpoint] {
        match self {
            Resolution::Resolved { endpoints, .. } => endpoints,
            Resolution::NotAvailable { .. } => &[],
        }
    }

    /// Whether any endpoint was found
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

/// Single string or list of strings, as found in layer URL tables
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Flatten into a list
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(url) => vec![url],
            OneOrMany::Many(urls) => urls,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            OneOrMany::One(url) => url.is_empty(),
            OneOrMany::Many(urls) => urls.is_empty(),
        }
    }
}

/// Field value, or the default when it is `null` or cannot be read
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Map whose unreadable entries are dropped
fn lenient_map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Object(entries) = Value::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|(key, value)| Some((key, serde_json::from_value(value).ok()?)))
        .collect())
}

/// One entry of the per-layer URL table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerEntry {
    #[serde(rename = "timeSpecificUrls", default, deserialize_with = "lenient")]
    pub time_specific_urls: Option<OneOrMany>,
    #[serde(rename = "wmtsUrl", default, deserialize_with = "lenient")]
    pub wmts_url: Option<OneOrMany>,
}

impl LayerEntry {
    /// Time-specific URLs when present and non-empty, else the WMTS URLs
    pub fn urls(&self) -> Vec<String> {
        match (&self.time_specific_urls, &self.wmts_url) {
            (Some(urls), _) if !urls.is_empty() => urls.clone().into_vec(),
            (_, Some(urls)) => urls.clone().into_vec(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StacHref {
    #[serde(default, deserialize_with = "lenient")]
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StacAssets {
    #[serde(default, deserialize_with = "lenient")]
    pub wmts: Option<StacHref>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StacBundle {
    #[serde(default, deserialize_with = "lenient")]
    pub assets: Option<StacAssets>,
}

/// Dataset description document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetDocument {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, rename = "abstract", deserialize_with = "lenient")]
    pub abstract_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub layers: BTreeMap<String, LayerEntry>,
    #[serde(default, rename = "stacData", deserialize_with = "lenient_map")]
    pub stac_data: BTreeMap<String, StacBundle>,
    #[serde(default, rename = "rawMetadata", deserialize_with = "lenient")]
    pub raw_metadata: Option<String>,
}

impl DatasetDocument {
    /// Title for display, with the catalog's placeholder when absent
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| catalog::UNKNOWN_PRODUCT.to_string())
    }

    /// `stacData[*].assets.wmts.href` values
    pub fn stac_hrefs(&self) -> Vec<String> {
        self.stac_data
            .values()
            .filter_map(|bundle| bundle.assets.as_ref()?.wmts.as_ref()?.href.clone())
            .filter(|href| !href.is_empty())
            .collect()
    }
}

/// A dataset as listed by the broker catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Colon-delimited hierarchical identifier
    pub dataset_id: String,
    pub title: String,
    pub abstract_text: String,
    /// Capability URLs advertised directly by the listing
    pub capability_urls: Vec<String>,
    /// Terms-of-use identifiers; the first one gates searches
    pub terms: Vec<String>,
    pub temporal_begin: Option<String>,
    pub temporal_end: Option<String>,
    pub thumbnail: Option<String>,
}

impl DatasetDescriptor {
    /// Terms-of-use reference that must be accepted before searching
    pub fn terms_of_use(&self) -> Option<&str> {
        self.terms.first().map(String::as_str)
    }
}
