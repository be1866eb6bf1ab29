//! Integration tests for dataset resolution and layer listing
//!
//! A dataset identifier is resolved against an in-memory description source
//! and the resulting endpoints are fed through the layer catalog.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use copernicus_connect::app::capabilities::CapabilitiesFetcher;
use copernicus_connect::app::{
    DatasetDocument, DatasetSource, EndpointResolver, LayerCatalog, NotAvailableReason, Resolution,
    ServiceEndpoint, ServiceType,
};
use copernicus_connect::errors::{CapabilitiesError, CapabilitiesResult, CatalogError, CatalogResult};
use serde_json::json;
use url::Url;

/// Serves one description document and records requested identifiers
struct FixedSource {
    document: Option<serde_json::Value>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl FixedSource {
    fn new(document: serde_json::Value) -> Self {
        Self {
            document: Some(document),
            requested: Arc::default(),
        }
    }

    fn failing() -> Self {
        Self {
            document: None,
            requested: Arc::default(),
        }
    }
}

#[async_trait]
impl DatasetSource for FixedSource {
    async fn fetch_description(&self, dataset_id: &str) -> CatalogResult<DatasetDocument> {
        self.requested.lock().unwrap().push(dataset_id.to_string());
        match &self.document {
            Some(document) => Ok(serde_json::from_value(document.clone())?),
            None => Err(CatalogError::ServerError { status: 404 }),
        }
    }
}

const WMS_DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<WMS_Capabilities version="1.3.0" xmlns="http://www.opengis.net/wms">
  <Service>
    <Title>Corine Land Cover 2018</Title>
  </Service>
  <Capability>
    <Request>
      <GetMap>
        <Format>image/jpeg</Format>
        <Format>image/png</Format>
      </GetMap>
    </Request>
    <Layer>
      <Title>Root</Title>
      <CRS>EPSG:4326</CRS>
      <CRS>EPSG:3857</CRS>
      <Layer>
        <Name>12</Name>
        <Title>Corine Land Cover 2018 raster</Title>
      </Layer>
    </Layer>
  </Capability>
</WMS_Capabilities>"#;

/// Answers every request with the same document, or fails
struct StaticFetcher {
    document: Option<&'static str>,
    requested: Mutex<Vec<String>>,
}

#[async_trait]
impl CapabilitiesFetcher for StaticFetcher {
    async fn fetch_document(&self, url: &Url) -> CapabilitiesResult<String> {
        self.requested.lock().unwrap().push(url.to_string());
        self.document
            .map(str::to_string)
            .ok_or(CapabilitiesError::ServerError { status: 503 })
    }
}

#[tokio::test]
async fn test_land_monitoring_dataset_resolves_to_wms_server() {
    let source = FixedSource::new(json!({
        "title": "CORINE Land Cover",
        "layers": {
            "clc2018": {
                "wmtsUrl": "https://image.discomap.eea.europa.eu/arcgis/rest/services/Corine/CLC2018_WM/MapServer/export"
            }
        }
    }));
    let resolver = EndpointResolver::new(source);

    let resolution = resolver.resolve("EEA:GIO:LAND:GIOLANDPUBLIC:v1").await;

    let Resolution::Resolved {
        endpoints,
        display_title,
    } = &resolution
    else {
        panic!("expected a resolved dataset, got {:?}", resolution);
    };
    assert_eq!(display_title, "CORINE Land Cover");
    assert_eq!(endpoints.len(), 1);

    let endpoint = &endpoints[0];
    assert_eq!(endpoint.service_type, ServiceType::Wms);
    assert_eq!(endpoint.dataset_id, "EEA:GIO:LAND:GIOLANDPUBLIC:v1");
    assert!(endpoint.capabilities_url.starts_with(
        "https://image.discomap.eea.europa.eu/arcgis/services/Corine/CLC2018_WM/MapServer/WMSServer/"
    ));
    assert!(!endpoint.capabilities_url.contains("/rest/"));
    assert!(endpoint.capabilities_url.contains("request=GetCapabilities"));
}

#[tokio::test]
async fn test_sub_product_identifier_is_truncated_before_fetch() {
    let source = FixedSource::new(json!({}));
    let requested = Arc::clone(&source.requested);
    let resolver = EndpointResolver::new(source);

    let land = resolver.resolve("EEA:GIO:LAND:GIOLANDPUBLIC:v1").await;
    let marine = resolver
        .resolve("EO:MO:DAT:GLOBAL_ANALYSISFORECAST_PHY_001_024:cmems_mod_glo_phy_anfc_0.083deg_P1D-m")
        .await;
    let plain = resolver.resolve("EO:ESA:DAT:SENTINEL-1").await;

    assert_eq!(
        *requested.lock().unwrap(),
        vec![
            "EEA:GIO:LAND:GIOLANDPUBLIC".to_string(),
            "EO:MO:DAT:GLOBAL_ANALYSISFORECAST_PHY_001_024".to_string(),
            "EO:ESA:DAT:SENTINEL-1".to_string(),
        ]
    );

    // Outcomes are reported under the identifier the caller used
    for (resolution, id) in [
        (land, "EEA:GIO:LAND:GIOLANDPUBLIC:v1"),
        (plain, "EO:ESA:DAT:SENTINEL-1"),
    ] {
        match resolution {
            Resolution::NotAvailable { dataset_id, .. } => assert_eq!(dataset_id, id),
            other => panic!("unexpected resolution {:?}", other),
        }
    }
    assert!(!marine.is_resolved());
}

#[tokio::test]
async fn test_unavailable_outcomes_are_distinguishable() {
    let empty = EndpointResolver::new(FixedSource::new(json!({"title": "Nothing here"})));
    assert_eq!(
        empty.resolve("EO:ESA:DAT:SENTINEL-2").await,
        Resolution::NotAvailable {
            dataset_id: "EO:ESA:DAT:SENTINEL-2".to_string(),
            reason: NotAvailableReason::NoServiceUrls,
        }
    );

    let failing = EndpointResolver::new(FixedSource::failing());
    match failing.resolve("EO:ESA:DAT:SENTINEL-2").await {
        Resolution::NotAvailable {
            reason: NotAvailableReason::FetchFailed(_),
            ..
        } => {}
        other => panic!("expected a fetch failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_resolved_endpoint_lists_layers() {
    let resolver = EndpointResolver::new(FixedSource::new(json!({
        "layers": {
            "clc": {"wmtsUrl": "https://image.discomap.eea.europa.eu/arcgis/rest/services/Corine/CLC2018_WM/MapServer/export"}
        }
    })));
    let resolution = resolver.resolve("EEA:GIO:LAND:GIOLANDPUBLIC:v1").await;

    let catalog = LayerCatalog::new(StaticFetcher {
        document: Some(WMS_DOCUMENT),
        requested: Mutex::new(Vec::new()),
    });
    let capabilities = catalog
        .layers_for(&resolution.endpoints()[0])
        .await
        .unwrap();

    assert_eq!(capabilities.service.title, "Corine Land Cover 2018");
    assert_eq!(capabilities.layers.len(), 1);
    let layer = &capabilities.layers[0];
    assert_eq!(layer.name, "12");
    assert_eq!(layer.reference_system, "EPSG:3857");
    assert_eq!(layer.format, "image/png");
    assert!(layer.connection_string.starts_with(
        "url=https://image.discomap.eea.europa.eu/arcgis/services/Corine/CLC2018_WM/MapServer/WMSServer/"
    ));
    assert!(layer.connection_string.contains("layers=12"));
}

#[tokio::test]
async fn test_layer_catalog_failure_policy() {
    let catalog = LayerCatalog::new(StaticFetcher {
        document: None,
        requested: Mutex::new(Vec::new()),
    });

    let wms = ServiceEndpoint {
        capabilities_url: "https://maps.example.org/geo/WMS/?service=WMS&request=GetCapabilities"
            .to_string(),
        service_type: ServiceType::Wms,
        dataset_id: "EO:EX:DAT:A".to_string(),
    };
    let empty = catalog.layers_for(&wms).await.unwrap();
    assert!(empty.is_empty());

    let wmts = ServiceEndpoint {
        capabilities_url: "https://wmts.marine.copernicus.eu/teroWmts?service=WMTS&request=GetCapabilities"
            .to_string(),
        service_type: ServiceType::Wmts,
        dataset_id: "EO:MO:DAT:B".to_string(),
    };
    assert!(matches!(
        catalog.layers_for(&wmts).await,
        Err(CapabilitiesError::ServerError { status: 503 })
    ));

    // The typed fetch reports WMS failures too
    assert!(catalog
        .fetch(&wms.capabilities_url, ServiceType::Wms)
        .await
        .is_err());
}
