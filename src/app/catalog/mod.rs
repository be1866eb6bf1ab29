//! Dataset catalog access and endpoint resolution
//!
//! A dataset identifier such as `EO:MO:DAT:GLOBAL_ANALYSISFORECAST_PHY_001_024`
//! is turned into zero or more OGC capability URLs by fetching its description
//! document and running [`resolve_document`] over it.

pub mod endpoints;
pub mod listing;
pub mod models;
pub mod resolver;

pub use endpoints::{append_get_capabilities, normalize_dataset_id};
pub use listing::{listing_path, parse_dataset_listing};
pub use models::{
    DatasetDescriptor, DatasetDocument, NotAvailableReason, Resolution, ServiceEndpoint,
    ServiceType,
};
pub use resolver::{resolve_document, CatalogClient, DatasetSource, EndpointResolver};
