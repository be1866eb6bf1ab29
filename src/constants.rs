//! Application constants for Copernicus Connect
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Overrides the client and search timeout (seconds)
    pub const TIMEOUT: &str = "HDA_TIMEOUT";

    /// Bearer token used for broker requests and file downloads
    pub const TOKEN: &str = "HDA_TOKEN";
}

/// Remote catalog endpoints
pub mod catalog {
    /// Dataset description service, queried as `<BASE_URL>/<dataset id>`
    pub const DATASET_BASE_URL: &str = "https://moi-be.wekeo.eu/api/dataset";

    /// Harmonised data access broker
    pub const BROKER_BASE_URL: &str = "https://gateway.prod.wekeo2.eu/hda-broker/api/v1";

    /// Number of colon-delimited segments kept for sub-product identifiers
    pub const PARENT_ID_SEGMENTS: usize = 4;

    /// Segment 5 prefix marking a marine sub-product
    pub const PROVIDER_PREFIX: &str = "cmems";

    /// Segment 2 organization codes whose sub-products share a parent service
    pub const ORGANIZATION_CODES: &[&str] = &["MO", "GIO"];

    /// Page size requested when listing datasets
    pub const LISTING_PAGE_SIZE: usize = 2000;

    /// Fallback product title when the description has none
    pub const UNKNOWN_PRODUCT: &str = "Unknown product";

    /// Abstract used when a listing entry carries none
    pub const NO_DESCRIPTION: &str = "No description available.";
}

/// Host and path patterns used to classify service roots
pub mod services {
    /// Path tokens that already name a service endpoint and are kept verbatim
    pub const ENDPOINT_TOKENS: &[&str] =
        &["WMSServer", "WMS", "WFS", "MapServer", "FeatureServer"];

    /// ArcGIS land-monitoring services published through REST
    pub const GIOLANDPUBLIC_PATTERN: &str =
        "discomap.eea.europa.eu/arcgis/rest/services/giolandpublic/";

    /// Prefix of ArcGIS REST roots that must be rewritten to WMSServer
    pub const ARCGIS_REST_PREFIX: &str = "https://image.discomap.eea.europa.eu/arcgis/rest/";

    /// GeoServer host serving land-cover products
    pub const GEOSERVER_PATTERN: &str = "geoserver.vlcc.geoville";

    /// Suffix appended to GeoServer roots
    pub const GEOSERVER_SUFFIX: &str = "wms";

    /// Marine WMTS host
    pub const MARINE_WMTS_PATTERN: &str = "wmts.marine.copernicus.eu";

    /// Suffix appended to marine WMTS roots
    pub const MARINE_WMTS_SUFFIX: &str = "teroWmts";

    /// WMS protocol version requested and embedded in connection strings
    pub const WMS_VERSION: &str = "1.3.0";

    /// WMTS protocol version requested
    pub const WMTS_VERSION: &str = "1.0.0";

    /// Preferred image format
    pub const PREFERRED_FORMAT: &str = "image/png";

    /// Preferred WMS coordinate reference system
    pub const PREFERRED_CRS: &str = "EPSG:3857";

    /// Secondary WMS coordinate reference system, also the fallback
    pub const FALLBACK_CRS: &str = "EPSG:4326";

    /// Tile matrix set used when a WMTS layer links none
    pub const DEFAULT_TILE_MATRIX_SET: &str = "EPSG:3857";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "Copernicus-Connect/0.1.0 (GIS data access tool)";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 8;
}

/// Rate limiting configuration
pub mod limits {
    /// Request rate for catalog and capability fetches (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 10;

    /// Provider-imposed download cap per trailing hour
    pub const HOURLY_DOWNLOAD_CAP: usize = 100;

    /// Length of the quota window in minutes
    pub const QUOTA_WINDOW_MINUTES: i64 = 60;
}

/// Broker search configuration
pub mod search {
    use super::Duration;

    /// Hard wall-clock budget for one search call
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Results requested per broker page
    pub const PAGE_SIZE: u32 = 100;

    /// Broker path for searches (POST)
    pub const SEARCH_PATH: &str = "dataaccess/search";

    /// Broker path for a dataset's queryable fields, followed by the dataset id
    pub const QUERYABLE_PATH: &str = "dataaccess/queryable";

    /// Broker path for product downloads, followed by the product id
    pub const DOWNLOAD_PATH: &str = "dataaccess/download";

    /// Broker path listing the user's accepted terms
    pub const TERMS_PATH: &str = "termsaccepted";

    /// Paging parameters the broker manages itself
    pub const HIDDEN_FIELDS: &[&str] = &["itemsPerPage", "startIndex"];
}

/// Download worker configuration
pub mod workers {
    use super::Duration;

    /// Default number of download workers
    pub const DEFAULT_WORKER_COUNT: usize = 4;

    /// Maximum recommended concurrent workers
    pub const MAX_WORKER_COUNT: usize = 16;

    /// Attempts per item before it is marked failed
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Fixed delay between failed attempts
    pub const RETRY_DELAY: Duration = Duration::from_secs(5);

    /// Per-request timeout for file downloads
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// Channel buffer size for download events
    pub const EVENT_BUFFER_SIZE: usize = 100;
}

/// File names and layout
pub mod files {
    /// Hourly download ledger, relative to the home directory
    pub const LEDGER_FILE_NAME: &str = ".hda_download_status";

    /// Search result cutoff store, relative to the home directory
    pub const SEARCH_LIMIT_FILE_NAME: &str = ".hda_limit";

    /// Download directory store, relative to the home directory
    pub const DOWNLOAD_PATH_FILE_NAME: &str = ".hda_path";

    /// Default download directory, relative to the home directory
    pub const DEFAULT_DOWNLOAD_DIR: &str = "HDA_Downloads";

    /// Extension given to every downloaded product
    pub const PRODUCT_EXTENSION: &str = "zip";

    /// Download chunk size for streaming (8KB)
    pub const DOWNLOAD_CHUNK_SIZE: usize = 8 * 1024;
}

// Re-export commonly used constants for convenience
pub use env::{TIMEOUT as ENV_TIMEOUT, TOKEN as ENV_TOKEN};
pub use http::USER_AGENT;
pub use limits::{DEFAULT_RATE_LIMIT_RPS, HOURLY_DOWNLOAD_CAP};
pub use workers::{DEFAULT_WORKER_COUNT, MAX_ATTEMPTS};
