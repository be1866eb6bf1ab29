//! Command handlers for the Copernicus Connect CLI
//!
//! This module implements the command handlers that coordinate between CLI
//! arguments and the core application functionality.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::catalog::{listing_path, parse_dataset_listing, NotAvailableReason};
use crate::app::download::{spawn_signal_listener, DownloadOrchestrator, HttpTransport};
use crate::app::quota::{select_all, select_interval, select_named};
use crate::app::search::{check_terms, load_field_schema, QueryBuilder, SearchSummary};
use crate::app::{
    BrokerClient, CatalogClient, Capabilities, DownloadDirStore, DownloadLedger, EndpointResolver,
    HourlyQuota, HttpHandler, LayerCatalog, Resolution, ResultSet, SearchClient, SearchGuard,
    SearchLimitStore, SearchQuery, ServiceType, TermsStatus,
};
use crate::cli::args::{
    DatasetsArgs, DownloadArgs, LayersArgs, SearchArgs, SelectionMode, SettingsAction,
    SettingsArgs,
};
use crate::cli::progress::{ProgressConfig, ProgressDisplay};
use crate::cli::startup::{show_startup_status, StartupStatus};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Shared clients built once per invocation
pub struct CommandContext {
    pub config: AppConfig,
    pub http: Arc<HttpHandler>,
}

impl CommandContext {
    pub fn new(config: AppConfig) -> Result<Self> {
        let http = Arc::new(HttpHandler::from_config(&config.client_config())?);
        Ok(Self { config, http })
    }

    fn broker(&self) -> Arc<BrokerClient> {
        Arc::new(BrokerClient::new(
            Arc::clone(&self.http),
            self.config.catalog.broker_base_url.clone(),
            self.config.catalog.token.clone(),
        ))
    }

    fn resolver(&self) -> EndpointResolver<CatalogClient> {
        EndpointResolver::new(CatalogClient::new(
            Arc::clone(&self.http),
            self.config.catalog.dataset_base_url.clone(),
        ))
    }

    fn quota(&self) -> Result<HourlyQuota> {
        let ledger = match &self.config.quota.ledger_path {
            Some(path) => DownloadLedger::new(path.clone()),
            None => DownloadLedger::in_home()?,
        };
        Ok(HourlyQuota::new(ledger, self.config.quota.hourly_cap))
    }
}

/// Handle the datasets command
pub async fn handle_datasets(ctx: &CommandContext, args: DatasetsArgs) -> Result<()> {
    let broker = ctx.broker();
    let response = broker.get(&listing_path()).await?;
    let mut datasets = parse_dataset_listing(&response);

    if let Some(filter) = &args.filter {
        let needle = filter.to_lowercase();
        datasets.retain(|d| {
            d.dataset_id.to_lowercase().contains(&needle) || d.title.to_lowercase().contains(&needle)
        });
    }

    info!("Listing {} datasets", datasets.len());
    for dataset in &datasets {
        println!("{}  {}", dataset.dataset_id, dataset.title);
        if args.urls {
            for url in &dataset.capability_urls {
                println!("    {}", url);
            }
        }
    }
    println!();
    println!("{} datasets", datasets.len());
    Ok(())
}

/// Handle the resolve command
pub async fn handle_resolve(ctx: &CommandContext, dataset_id: &str) -> Result<()> {
    match ctx.resolver().resolve(dataset_id).await {
        Resolution::Resolved {
            endpoints,
            display_title,
        } => {
            println!("{}", display_title);
            for endpoint in &endpoints {
                println!("  {:<5} {}", endpoint.service_type, endpoint.capabilities_url);
            }
        }
        Resolution::NotAvailable { dataset_id, reason } => {
            println!("No map service available for {}", dataset_id);
            match reason {
                NotAvailableReason::FetchFailed(e) => println!("  description fetch failed: {}", e),
                NotAvailableReason::NoServiceUrls => {
                    println!("  the description advertises no WMS or WMTS service")
                }
            }
        }
    }
    Ok(())
}

/// Handle the layers command
pub async fn handle_layers(ctx: &CommandContext, args: LayersArgs) -> Result<()> {
    let catalog = LayerCatalog::new(Arc::clone(&ctx.http));

    if let (Some(url), Some(service)) = (&args.url, args.service) {
        let capabilities = catalog.fetch(url, ServiceType::from(service)).await?;
        print_layers(&capabilities);
        return Ok(());
    }

    let dataset_id = args
        .dataset_id
        .as_deref()
        .ok_or_else(|| AppError::generic("A dataset id or --url is required"))?;

    let resolution = ctx.resolver().resolve(dataset_id).await;
    if !resolution.is_resolved() {
        println!("No map service available for {}", dataset_id);
        return Ok(());
    }

    for endpoint in resolution.endpoints() {
        match catalog.layers_for(endpoint).await {
            Ok(capabilities) => print_layers(&capabilities),
            Err(e) => {
                warn!("Could not read {}: {}", endpoint.capabilities_url, e);
                println!("{} ({}): {}", endpoint.capabilities_url, endpoint.service_type, e);
            }
        }
    }
    Ok(())
}

fn print_layers(capabilities: &Capabilities) {
    let title = if capabilities.service.title.is_empty() {
        capabilities.base_url.as_str()
    } else {
        capabilities.service.title.as_str()
    };
    println!("{} [{}] - {} layers", title, capabilities.service_type, capabilities.layers.len());
    for layer in &capabilities.layers {
        println!("  {}  {}", layer.name, layer.title);
        println!("    {}", layer.connection_string);
    }
}

/// Handle the search command
pub async fn handle_search(ctx: &CommandContext, args: SearchArgs) -> Result<()> {
    let broker = ctx.broker();
    let query = read_query(&args.query).await?;
    let query = if args.validate {
        validate_query(broker.as_ref(), query).await?
    } else {
        query
    };

    let limit = search_limit(args.limit)?;
    let results = run_search(ctx, broker, query, limit).await?;
    let summary = SearchSummary::new(&results, limit);

    if args.json {
        let body = json!({
            "count": summary.count,
            "volume": summary.volume,
            "limit_reached": summary.limit_reached(),
            "results": results.matches,
        });
        let text =
            serde_json::to_string_pretty(&body).map_err(|e| AppError::generic(e.to_string()))?;
        println!("{}", text);
    } else {
        print_results(&results);
        println!();
        println!("{}", summary);
    }
    Ok(())
}

/// Handle the download command
///
/// Searches, checks the dataset's terms and the hourly quota, then downloads
/// the selected results with progress reporting.
pub async fn handle_download(ctx: &CommandContext, args: DownloadArgs) -> Result<()> {
    let start_time = Instant::now();
    args.validate().map_err(AppError::generic)?;

    let broker = ctx.broker();
    let query = read_query(&args.query).await?;
    ensure_terms_accepted(broker.as_ref(), query.dataset_id()).await?;

    let limit = search_limit(args.limit)?;
    let results = run_search(ctx, Arc::clone(&broker), query, limit).await?;
    println!("{}", SearchSummary::new(&results, limit));
    if results.is_empty() {
        return Ok(());
    }

    let quota = ctx.quota()?;
    let status = quota.status().await?;
    let ids = results.ids();
    let selected = match args.selection_mode().map_err(AppError::generic)? {
        SelectionMode::All => select_all(&ids, &status)?,
        SelectionMode::Named(names) => select_named(&ids, &names, &status)?,
        SelectionMode::Interval { start, end } => select_interval(&ids, start, end, &status)?,
    };

    let dest_dir = match &args.dest {
        Some(dir) => dir.clone(),
        None => DownloadDirStore::in_home()?.load()?,
    };

    if args.dry_run {
        println!("Would download {} files to {}:", selected.len(), dest_dir.display());
        for id in &selected {
            println!("  {}", id);
        }
        return Ok(());
    }

    let mut config = ctx.config.download.clone();
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }
    let event_buffer = config.event_buffer_size;

    let transport = Arc::new(HttpTransport::new(broker.token())?);
    let orchestrator = DownloadOrchestrator::new(transport, config)?.with_quota(Arc::new(quota));
    let signals = spawn_signal_listener(orchestrator.cancel_token());

    let (tx, rx) = mpsc::channel(event_buffer);
    let display = ProgressDisplay::new(ProgressConfig::default(), selected.len()).spawn(rx);

    let report = orchestrator.run(&results, &selected, &dest_dir, tx).await;
    signals.abort();
    let summary = display
        .await
        .map_err(|e| AppError::generic(format!("Progress display failed: {}", e)))?;
    let report = report?;

    println!();
    println!(
        "Downloaded {} of {} files to {} in {:.1}s",
        report.succeeded(),
        selected.len(),
        dest_dir.display(),
        start_time.elapsed().as_secs_f64()
    );

    if report.cancelled {
        println!("Download cancelled by user");
        return Ok(());
    }

    if !summary.errors.is_empty() {
        println!("The following downloads failed:");
        for error in &summary.errors {
            println!("  {}", error);
        }
        return Err(AppError::generic(format!(
            "{} of {} downloads failed",
            summary.errors.len(),
            selected.len()
        )));
    }
    Ok(())
}

/// Handle the quota command
pub async fn handle_quota(ctx: &CommandContext) -> Result<()> {
    let status = ctx.quota()?.status().await?;
    println!(
        "Downloads in the last hour: {} of {} ({} remaining)",
        status.consumed, status.cap, status.remaining
    );
    Ok(())
}

/// Handle the settings command
pub async fn handle_settings(args: SettingsArgs) -> Result<()> {
    match args.action {
        SettingsAction::Limit { value } => {
            let store = SearchLimitStore::in_home()?;
            if let Some(value) = value {
                store.save(value)?;
                info!("Stored search limit {}", value);
            }
            match store.load()? {
                0 => println!("Search limit: unlimited"),
                limit => println!("Search limit: {}", limit),
            }
        }
        SettingsAction::Path { dir } => {
            let store = DownloadDirStore::in_home()?;
            if let Some(dir) = dir {
                store.save(&dir)?;
                info!("Stored download directory {}", dir.display());
            }
            println!("Download directory: {}", store.load()?.display());
        }
    }
    Ok(())
}

/// Handle the status command
pub fn handle_status(status: &StartupStatus) -> Result<()> {
    show_startup_status(status);
    Ok(())
}

async fn read_query(path: &Path) -> Result<SearchQuery> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(SearchQuery::from_json_str(&text)?)
}

/// Check the query against the dataset's field schema
async fn validate_query(client: &BrokerClient, query: SearchQuery) -> Result<SearchQuery> {
    let schema = load_field_schema(client, query.dataset_id()).await?;
    debug!("Loaded {} queryable fields", schema.fields().len());
    Ok(QueryBuilder::new(&schema, query.dataset_id())
        .with_query(&query)
        .build()?)
}

/// Explicit limit, else the stored one; 0 means unlimited either way
fn search_limit(explicit: Option<u32>) -> Result<Option<u32>> {
    match explicit {
        Some(limit) => Ok(Some(limit).filter(|l| *l > 0)),
        None => Ok(SearchLimitStore::in_home()?.load_limit()?),
    }
}

async fn run_search(
    ctx: &CommandContext,
    broker: Arc<BrokerClient>,
    query: SearchQuery,
    limit: Option<u32>,
) -> Result<ResultSet> {
    let guard = SearchGuard::new(broker, ctx.config.search.timeout);
    info!("Searching {} (limit {:?})", query.dataset_id(), limit);
    let results = guard.search(query, limit).await.map_err(AppError::from);
    if let Err(e) = &results {
        if e.is_recoverable() {
            println!("The search did not complete. Please try again.");
        }
    }
    results
}

/// Refuse to download when the dataset's terms are known to be unaccepted
async fn ensure_terms_accepted(client: &BrokerClient, dataset_id: &str) -> Result<()> {
    let listing = match client.get(&listing_path()).await {
        Ok(listing) => listing,
        Err(e) => {
            warn!("Could not load dataset listing for the terms check: {}", e);
            return Ok(());
        }
    };

    let term_id = parse_dataset_listing(&listing)
        .into_iter()
        .find(|d| d.dataset_id == dataset_id)
        .and_then(|d| d.terms_of_use().map(str::to_string));

    let Some(term_id) = term_id else {
        debug!("No terms of use listed for {}", dataset_id);
        return Ok(());
    };

    match check_terms(client, &term_id).await {
        TermsStatus::Accepted => Ok(()),
        TermsStatus::NotAccepted => Err(AppError::generic(format!(
            "The terms '{}' of {} have not been accepted. Accept them in your WEkEO account first.",
            term_id, dataset_id
        ))),
        TermsStatus::Unknown(reason) => {
            warn!("Terms of {} could not be verified: {}", dataset_id, reason);
            Ok(())
        }
    }
}

fn print_results(results: &ResultSet) {
    for (index, item) in results.iter().enumerate() {
        let size = item
            .size
            .map(crate::app::search::format_size)
            .unwrap_or_else(|| "size unknown".to_string());
        println!("{:>4}. {}  ({})", index + 1, item.id, size);
    }
}
