//! Copernicus Connect Library
//!
//! Resolves Copernicus datasets to OGC WMS/WMTS map services, parses their
//! capability documents into ready-to-use layer connection strings, and
//! searches and downloads products through the WEkEO data broker under the
//! provider's hourly download quota.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
