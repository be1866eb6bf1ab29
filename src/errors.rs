//! Error types for Copernicus Connect
//!
//! This module defines error types for all components of the application.
//! Resolution failures are not represented here: an unresolvable dataset is a
//! legitimate empty outcome (see [`crate::app::catalog::Resolution`]).

use std::path::PathBuf;

use thiserror::Error;

/// Dataset description and listing fetch errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// HTTP request failed
    #[error("Catalog request failed")]
    Http(#[from] reqwest::Error),

    /// Server returned a non-success status
    #[error("Catalog server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Response body was not the expected JSON document
    #[error("Malformed catalog document")]
    Json(#[from] serde_json::Error),

    /// Invalid URL built from a dataset identifier
    #[error("Invalid catalog URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },
}

/// Capability document fetch and parse errors
#[derive(Error, Debug)]
pub enum CapabilitiesError {
    /// HTTP request failed
    #[error("Capabilities request failed")]
    Http(#[from] reqwest::Error),

    /// Server returned a non-success status
    #[error("Capabilities server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Capability URL could not be parsed
    #[error("Invalid capabilities URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Document is not well-formed XML
    #[error("Malformed capabilities document at byte {position}: {reason}")]
    Xml { position: u64, reason: String },

    /// Document is XML but not a capabilities document of the expected kind
    #[error("Not a {service} capabilities document (root element <{root}>)")]
    UnexpectedDocument { service: String, root: String },
}

/// Search and broker errors
#[derive(Error, Debug)]
pub enum SearchError {
    /// Wrapped search did not finish within its wall-clock budget
    #[error("Search timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// HTTP request failed
    #[error("Broker request failed")]
    Http(#[from] reqwest::Error),

    /// Broker returned a non-success status
    #[error("Broker error: HTTP {status}")]
    ServerError { status: u16 },

    /// Broker response was not the expected JSON document
    #[error("Malformed broker response")]
    Json(#[from] serde_json::Error),

    /// No bearer token available for an authenticated call
    #[error("No broker token configured. Set HDA_TOKEN or add it to the config file")]
    MissingToken,

    /// Supervisory task ended without producing a result
    #[error("Search task terminated unexpectedly: {reason}")]
    TaskFailed { reason: String },

    /// Invalid URL built for a broker call
    #[error("Invalid broker URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },
}

/// Query construction errors
#[derive(Error, Debug)]
pub enum QueryError {
    /// Required fields have no value
    #[error("The following required fields are missing: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    /// A value does not fit its field kind
    #[error("Invalid value for field {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Query document has no dataset identifier
    #[error("The query must include a 'dataset_id' field")]
    MissingDatasetId,

    /// Query document is not a JSON object
    #[error("Query must be a JSON object")]
    NotAnObject,

    /// Query document could not be parsed
    #[error("Could not parse JSON query")]
    Json(#[from] serde_json::Error),
}

/// Download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP request error
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations
    #[error("File I/O error")]
    Io(#[from] std::io::Error),

    /// Request exceeded its timeout
    #[error("Download timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Server returned a status other than 200
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Item exhausted its attempts
    #[error("Maximum attempts ({max_attempts}) exceeded for {item_id}: {last_error}")]
    MaxAttemptsExceeded {
        item_id: String,
        max_attempts: u32,
        last_error: String,
    },

    /// User requested cancellation
    #[error("Download cancelled")]
    Cancelled,

    /// Batch refused by the hourly quota
    #[error(transparent)]
    Quota(#[from] QuotaError),

    /// Invalid orchestrator configuration
    #[error("Invalid download configuration: {0}")]
    ConfigurationError(String),

    /// Worker task panicked or was aborted
    #[error("Download worker terminated unexpectedly: {reason}")]
    WorkerPanic { reason: String },
}

/// Hourly quota and settings store errors
#[derive(Error, Debug)]
pub enum QuotaError {
    /// Requested batch is larger than what remains in the window
    #[error(
        "It is not allowed to select more than {allowed} files at once. \
         The provider only supports {cap} downloads per hour. \
         You have already downloaded {consumed} files in the last hour"
    )]
    Exceeded {
        requested: usize,
        allowed: usize,
        consumed: usize,
        cap: usize,
    },

    /// Ledger or store file I/O failed
    #[error("Quota store I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored value is not a non-negative integer
    #[error("Invalid stored value in {path}: {value}")]
    InvalidValue { path: PathBuf, value: String },

    /// Selection does not describe items of the result list
    #[error("Invalid selection: {reason}")]
    InvalidSelection { reason: String },

    /// Home directory could not be determined
    #[error("Could not determine home directory")]
    NoHomeDirectory,

    /// Blocking ledger task failed
    #[error("Ledger task failed: {reason}")]
    TaskFailed { reason: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// User config directory is unavailable
    #[error("Could not determine user config directory")]
    NoConfigDirectory,
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Capabilities error
    #[error(transparent)]
    Capabilities(#[from] CapabilitiesError),

    /// Search error
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Query error
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Quota error
    #[error(transparent)]
    Quota(#[from] QuotaError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (the user may simply retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Search(SearchError::Timeout { .. })
                | AppError::Search(SearchError::Http(_))
                | AppError::Catalog(CatalogError::Http(_))
                | AppError::Capabilities(CapabilitiesError::Http(_))
                | AppError::Download(DownloadError::Timeout { .. })
                | AppError::Download(DownloadError::Http(_))
                | AppError::Download(DownloadError::Quota(QuotaError::Exceeded { .. }))
                | AppError::Quota(QuotaError::Exceeded { .. })
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Catalog(_) => "catalog",
            AppError::Capabilities(_) => "capabilities",
            AppError::Search(_) => "search",
            AppError::Query(_) => "query",
            AppError::Download(_) => "download",
            AppError::Quota(_) => "quota",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Catalog result type alias
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Capabilities result type alias
pub type CapabilitiesResult<T> = std::result::Result<T, CapabilitiesError>;

/// Search result type alias
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Quota result type alias
pub type QuotaResult<T> = std::result::Result<T, QuotaError>;
