//! Copernicus Connect CLI application
//!
//! Command-line interface for discovering Copernicus datasets, listing their
//! map layers, and downloading products through the WEkEO broker.

use std::process;

use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use copernicus_connect::cli::{
    handle_datasets, handle_download, handle_layers, handle_quota, handle_resolve, handle_search,
    handle_settings, handle_status, validate_startup, Cli, CommandContext, Commands,
};
use copernicus_connect::config::AppConfig;
use copernicus_connect::errors::{AppError, Result};

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    init_logging(&cli);

    info!("Copernicus Connect v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Settings(args) => handle_settings(args).await,
        Commands::Status => {
            let (_, status) = validate_startup(cli.global.config).await;
            handle_status(&status)
        }
        Commands::Download(args) => {
            let (config, status) = validate_startup(cli.global.config).await;
            if !status.is_ready() {
                error!("Startup validation failed: {}", status.summary());
                return Err(AppError::generic(status.summary()));
            }
            info!("Executing download command");
            handle_download(&CommandContext::new(config)?, args).await
        }
        command => {
            let ctx = CommandContext::new(AppConfig::load(cli.global.config).await?)?;
            match command {
                Commands::Datasets(args) => handle_datasets(&ctx, args).await,
                Commands::Resolve { dataset_id } => handle_resolve(&ctx, &dataset_id).await,
                Commands::Layers(args) => handle_layers(&ctx, args).await,
                Commands::Search(args) => handle_search(&ctx, args).await,
                Commands::Quota => handle_quota(&ctx).await,
                Commands::Settings(_) | Commands::Status | Commands::Download(_) => Ok(()),
            }
        }
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let mut filter = EnvFilter::from_default_env();
    match format!("copernicus_connect={}", log_level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log directive: {}", e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
