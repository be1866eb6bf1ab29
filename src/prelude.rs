//! Prelude module for Copernicus Connect Library
//!
//! This module re-exports the most commonly used items from the library,
//! so typical integrations need a single
//! `use copernicus_connect::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use copernicus_connect::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let http = Arc::new(HttpHandler::from_config(&ClientConfig::default())?);
//!     let resolver = EndpointResolver::new(CatalogClient::with_default_base(Arc::clone(&http)));
//!     let catalog = LayerCatalog::new(http);
//!
//!     let resolution = resolver.resolve("EO:MO:DAT:GLOBAL_ANALYSISFORECAST_PHY_001_024").await;
//!     for endpoint in resolution.endpoints() {
//!         for layer in catalog.layers_for(endpoint).await?.layers {
//!             println!("{}", layer.connection_string);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    // Catalog and capabilities
    Capabilities,
    CatalogClient,
    ClientConfig,
    EndpointResolver,
    HttpHandler,
    LayerCatalog,
    LayerRecord,
    Resolution,
    ServiceEndpoint,
    ServiceType,

    // Search
    BrokerClient,
    ResultSet,
    SearchClient,
    SearchGuard,
    SearchQuery,

    // Downloads and quota
    BatchQuota,
    BatchReport,
    CancelToken,
    DownloadConfig,
    DownloadEvent,
    DownloadLedger,
    DownloadOrchestrator,
    HourlyQuota,
    HttpTransport,
    TaskState,
};

// Commonly used constants
pub use crate::constants::{DEFAULT_WORKER_COUNT, ENV_TOKEN, HOURLY_DOWNLOAD_CAP, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        let _client_config = ClientConfig::default();
        let download_config = DownloadConfig::default();

        assert_eq!(download_config.worker_count, DEFAULT_WORKER_COUNT);
        assert_eq!(HOURLY_DOWNLOAD_CAP, 100);
        assert!(USER_AGENT.contains("Copernicus-Connect"));
    }

    #[tokio::test]
    async fn test_prelude_integration_pattern() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().unwrap();
        let quota = HourlyQuota::new(DownloadLedger::new(temp_dir.path().join("ledger")), 10);
        let status = quota.reserve(3).await.unwrap();
        assert_eq!(status.remaining, 7);
    }
}
