//! Core application logic for Copernicus Connect
//!
//! This module contains the catalog resolver, the OGC capability parsers,
//! the broker search layer, the hourly download quota and the download
//! orchestrator.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use copernicus_connect::app::{CatalogClient, ClientConfig, EndpointResolver, HttpHandler};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let http = Arc::new(HttpHandler::from_config(&ClientConfig::default())?);
//! let resolver = EndpointResolver::new(CatalogClient::with_default_base(http));
//!
//! let resolution = resolver.resolve("EO:MO:DAT:GLOBAL_ANALYSISFORECAST_PHY_001_024").await;
//! for endpoint in resolution.endpoints() {
//!     println!("{} {}", endpoint.service_type, endpoint.capabilities_url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod catalog;
pub mod download;
pub mod http;
pub mod quota;
pub mod search;

// Re-export main public API
pub use capabilities::{
    parse_wms_document, parse_wmts_document, Capabilities, CapabilitiesFetcher, LayerCatalog,
    LayerRecord, ServiceMetadata,
};
pub use catalog::{
    normalize_dataset_id, parse_dataset_listing, resolve_document, CatalogClient,
    DatasetDescriptor, DatasetDocument, DatasetSource, EndpointResolver, NotAvailableReason,
    Resolution, ServiceEndpoint, ServiceType,
};
pub use download::{
    BatchReport, CancelToken, DownloadConfig, DownloadEvent, DownloadOrchestrator, DownloadTask,
    FileTransport, HttpTransport, TaskState,
};
pub use http::{ClientConfig, HttpHandler};
pub use quota::{
    BatchQuota, DownloadDirStore, DownloadLedger, HourlyQuota, QuotaStatus, SearchLimitStore,
};
pub use search::{
    BrokerClient, FieldSchema, QueryBuilder, ResultSet, SearchClient, SearchGuard, SearchMatch,
    SearchQuery, SearchSummary, TermsStatus,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Ensure public API is accessible
        let config = ClientConfig::default();
        assert!(config.tcp_nodelay);
        assert_eq!(DownloadConfig::default().max_attempts, 3);
        assert_eq!(ServiceType::Wmts.as_str(), "WMTS");
    }
}
