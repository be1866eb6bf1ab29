//! Command-line interface components
//!
//! This module contains CLI-specific code for the Copernicus Connect
//! application, including argument parsing, progress display, startup checks
//! and the command handlers.

pub mod args;
pub mod commands;
pub mod progress;
pub mod startup;

pub use args::{
    Cli, Commands, DatasetsArgs, DownloadArgs, GlobalArgs, LayersArgs, SearchArgs, SelectionMode,
    ServiceArg, SettingsAction, SettingsArgs,
};
pub use commands::{
    handle_datasets, handle_download, handle_layers, handle_quota, handle_resolve, handle_search,
    handle_settings, handle_status, CommandContext,
};
pub use progress::{ProgressConfig, ProgressDisplay, ProgressSummary};
pub use startup::{show_startup_status, validate_startup, StartupCheck, StartupStatus};
