//! Command-line argument parsing for Copernicus Connect
//!
//! This module defines the CLI structure using clap derive macros: dataset
//! discovery, endpoint resolution, layer listing, product search, quota-aware
//! downloading and the persisted user settings.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::app::catalog::ServiceType;

/// Copernicus Connect - Browse and fetch Copernicus data through WEkEO
#[derive(Parser, Debug)]
#[command(
    name = "copernicus_connect",
    version,
    about = "Discover Copernicus datasets, list their WMS/WMTS layers and download products",
    long_about = "Resolves Copernicus datasets to OGC WMS/WMTS services, lists their layers as \
connection strings, and searches and downloads products through the WEkEO broker while \
respecting the provider's hourly download quota."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the datasets offered by the broker
    Datasets(DatasetsArgs),

    /// Resolve a dataset to its map service endpoints
    Resolve {
        /// Dataset identifier (e.g. "EO:MO:DAT:GLOBAL_ANALYSISFORECAST_PHY_001_024")
        dataset_id: String,
    },

    /// List the map layers of a dataset or of a capabilities URL
    Layers(LayersArgs),

    /// Search products with a JSON query
    Search(SearchArgs),

    /// Search and download products
    Download(DownloadArgs),

    /// Show downloads used in the last hour
    Quota,

    /// Show or change persisted settings
    Settings(SettingsArgs),

    /// Check configuration, token and download directory
    Status,
}

/// Arguments for the datasets command
#[derive(Args, Debug, Clone)]
pub struct DatasetsArgs {
    /// Only show datasets whose id or title contains this text
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Also print the capabilities URL of each dataset
    #[arg(long)]
    pub urls: bool,
}

/// Map service protocol accepted on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceArg {
    Wms,
    Wmts,
}

impl From<ServiceArg> for ServiceType {
    fn from(arg: ServiceArg) -> Self {
        match arg {
            ServiceArg::Wms => ServiceType::Wms,
            ServiceArg::Wmts => ServiceType::Wmts,
        }
    }
}

/// Arguments for the layers command
#[derive(Args, Debug, Clone)]
pub struct LayersArgs {
    /// Dataset identifier to resolve first
    #[arg(required_unless_present = "url", conflicts_with = "url")]
    pub dataset_id: Option<String>,

    /// Capabilities URL to read directly
    #[arg(long, requires = "service")]
    pub url: Option<String>,

    /// Protocol of --url
    #[arg(long, value_enum)]
    pub service: Option<ServiceArg>,
}

/// Arguments for the search command
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// JSON query file (must contain "dataset_id")
    #[arg(long, value_name = "FILE")]
    pub query: PathBuf,

    /// Check the query against the dataset's queryable fields first
    #[arg(long)]
    pub validate: bool,

    /// Maximum number of results (overrides the stored limit, 0 = unlimited)
    #[arg(short, long)]
    pub limit: Option<u32>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// JSON query file (must contain "dataset_id")
    #[arg(long, value_name = "FILE")]
    pub query: PathBuf,

    /// Download every result
    #[arg(long, conflicts_with_all = ["select", "range"])]
    pub all: bool,

    /// Comma-separated result identifiers to download
    #[arg(long, value_delimiter = ',', conflicts_with = "range")]
    pub select: Option<Vec<String>>,

    /// 1-based inclusive interval of results, e.g. "3-10"
    #[arg(long, value_name = "A-B")]
    pub range: Option<String>,

    /// Destination directory (defaults to the stored download path)
    #[arg(short, long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Number of concurrent download workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Maximum number of search results (overrides the stored limit)
    #[arg(short, long)]
    pub limit: Option<u32>,

    /// Show what would be downloaded without downloading
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for settings management
#[derive(Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub action: SettingsAction,
}

/// Settings actions
#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Show or set the search result cutoff (0 = unlimited)
    Limit {
        /// New cutoff
        value: Option<u32>,
    },

    /// Show or set the download directory
    Path {
        /// New absolute directory
        dir: Option<PathBuf>,
    },
}

/// How the download command picks results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    All,
    Named(Vec<String>),
    Interval { start: usize, end: usize },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

impl DownloadArgs {
    /// Check argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Some(0) = self.workers {
            return Err("Number of workers must be greater than 0".to_string());
        }

        if let Some(ids) = &self.select {
            if ids.iter().all(|id| id.trim().is_empty()) {
                return Err("--select needs at least one identifier".to_string());
            }
        }

        self.selection_mode().map(|_| ())
    }

    /// Selection described by `--all`, `--select` or `--range`
    ///
    /// Without any of them every result is selected.
    pub fn selection_mode(&self) -> Result<SelectionMode, String> {
        if let Some(range) = &self.range {
            let (start, end) = parse_range(range)?;
            return Ok(SelectionMode::Interval { start, end });
        }

        if let Some(ids) = &self.select {
            let ids = ids
                .iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect();
            return Ok(SelectionMode::Named(ids));
        }

        Ok(SelectionMode::All)
    }
}

/// Parse "A-B" into a pair of positive integers
pub fn parse_range(text: &str) -> Result<(usize, usize), String> {
    let (start, end) = text
        .split_once('-')
        .ok_or_else(|| format!("Invalid range '{}': expected A-B", text))?;

    let parse = |value: &str| -> Result<usize, String> {
        value
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| format!("Invalid range bound '{}': expected a positive integer", value))
    };

    Ok((parse(start)?, parse(end)?))
}
