//! Normalized capability catalog types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::app::catalog::ServiceType;

/// Service-level description from a capability document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub provider: String,
}

/// One layer, ready to be opened by a raster consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRecord {
    /// Layer name (WMS) or identifier (WMTS)
    pub name: String,
    pub title: String,
    /// Chosen CRS (WMS) or tile matrix set (WMTS)
    pub reference_system: String,
    /// Chosen image MIME type
    pub format: String,
    pub style: Option<String>,
    /// Key-value string a raster layer constructor accepts as is
    pub connection_string: String,
    pub service_type: ServiceType,
    /// Enumerated dimension values, WMTS only; dimensions without values are absent
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dimensions: BTreeMap<String, Vec<String>>,
}

/// Parsed capability document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub service_type: ServiceType,
    /// Capability URL with its query removed, as embedded in connection strings
    pub base_url: String,
    pub service: ServiceMetadata,
    pub layers: Vec<LayerRecord>,
}

impl Capabilities {
    /// Catalog with no layers, used where a failed fetch is not fatal
    pub fn empty(service_type: ServiceType, base_url: impl Into<String>) -> Self {
        Self {
            service_type,
            base_url: base_url.into(),
            service: ServiceMetadata::default(),
            layers: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
