//! listgen-export - Retail listing-template export service
//!
//! Turns a (chain, company, sales code, price memo) request into a
//! retailer-formatted spreadsheet export, streaming job progress over SSE.

use anyhow::Result;
use clap::Parser;
use listgen_common::config::{load_toml_config, resolve_config_path};
use listgen_common::logging::init_logging;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use listgen_export::config::{ServiceConfig, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
use listgen_export::db::{SqliteCatalogSource, SqliteProgressStore, SqliteReferenceStore};
use listgen_export::services::{
    CatalogFetcher, ExportService, ExportSettings, ProgressPoller, ProgressStore,
    ReferenceResolver, TemplateRegistry, WalkdirIndexer,
};
use listgen_export::AppState;

#[derive(Parser, Debug)]
#[command(name = "listgen-export", version, about = "Retail listing-template export service")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR, CONFIG_FILE_NAME);
    let mut config: ServiceConfig = load_toml_config(config_path.as_deref())?;
    config.apply_env_overrides();
    init_logging(&config.logging)?;

    info!("Starting listgen-export v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config: {}", path.display());
    }
    info!("Image root: {}", config.image_root.display());

    // Progress records live in the service database
    let db_pool = listgen_export::db::init_database_pool(&config.database).await?;
    let progress: Arc<dyn ProgressStore> = Arc::new(SqliteProgressStore::new(db_pool));

    let abandoned = progress.abandon_running().await?;
    if abandoned > 0 {
        warn!(abandoned, "Marked jobs from a previous run as failed");
    }

    let reference_pool = listgen_common::db::open_url(&config.reference_database, 4).await?;
    if config.catalog.is_empty() {
        warn!("No [catalog] databases configured; every export will fail to connect");
    }
    let catalog = SqliteCatalogSource::connect(&config.catalog).await;

    let service = ExportService::new(
        CatalogFetcher::new(
            Arc::new(catalog),
            config.limits.max_items,
            config.limits.attribute_batch_size,
        ),
        ReferenceResolver::new(Arc::new(SqliteReferenceStore::new(reference_pool))),
        Arc::new(WalkdirIndexer::new()),
        Arc::new(TemplateRegistry::builtin()),
        progress.clone(),
        ExportSettings {
            image_root: config.image_root.clone(),
            job_timeout: config.job_timeout(),
            progress_ttl: config.progress_ttl(),
        },
    );

    let poller = ProgressPoller::new(
        progress,
        config.poll_interval(),
        config.progress.max_polls,
        config.progress.missing_grace_polls,
    );

    let state = AppState::new(Arc::new(service), poller);
    let app = listgen_export::build_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
