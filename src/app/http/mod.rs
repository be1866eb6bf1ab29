//! Shared HTTP plumbing
//!
//! - `config`: client configuration and building
//! - `handler`: rate-limited GET used by the catalog and capability fetchers

pub mod config;
pub mod handler;

pub use config::ClientConfig;
pub use handler::HttpHandler;
