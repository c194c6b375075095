use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seedstream_core::{
    load_config, JackettProvider, LibrqbitEngine, RankContext, ResourceManager,
    ResumeStore, SearchAggregator, SearchProvider, StreamService, StreamSynthesizer,
    TransferEngine,
};
use seedstream_server::api::create_router;
use seedstream_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // An explicit SEEDSTREAM_CONFIG must exist; the default file is optional
    let config_path = match std::env::var("SEEDSTREAM_CONFIG") {
        Ok(path) => Some(PathBuf::from(path)),
        Err(_) => Some(PathBuf::from("config.toml")).filter(|path| path.exists()),
    };

    // Load and validate configuration
    match &config_path {
        Some(path) => info!("Loading configuration from {:?}", path),
        None => info!("No config file found, using defaults and environment"),
    }
    let config = load_config(config_path.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    info!("Configuration loaded successfully");
    info!("Download path: {:?}", config.engine.download_path);
    info!("Resume records: {:?}", config.resources.torrent_dir);

    // Transfer engine
    let engine: Arc<dyn TransferEngine> = Arc::new(
        LibrqbitEngine::new(&config.engine)
            .await
            .context("Failed to start transfer engine")?,
    );
    info!("Transfer engine initialized ({})", engine.name());

    // Resource manager, restored from resume records
    let store = ResumeStore::open(&config.resources.torrent_dir)
        .await
        .context("Failed to open resume store")?;
    let manager = ResourceManager::new(engine, store, &config.resources);
    manager.restore().await;
    manager.start();

    // Search providers
    let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::new();
    if let Some(jackett_config) = &config.search.jackett {
        info!("Initializing Jackett provider at {}", jackett_config.url);
        providers.push(Arc::new(
            JackettProvider::new(jackett_config.clone())
                .context("Failed to create Jackett provider")?,
        ));
    }
    if providers.is_empty() {
        warn!("No search providers configured; searches will return nothing");
    }
    let aggregator = Arc::new(SearchAggregator::from_config(providers, &config.search));

    // Stream service
    let streams = Arc::new(StreamService::new(
        aggregator,
        StreamSynthesizer::new(manager.clone(), &config.ranking),
        RankContext::from_config(&config.ranking),
    ));

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), manager.clone(), streams));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    manager.stop();

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
