use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use aviary::config::{Cli, Config};
use aviary::routes;
use aviary::state::AppState;
use aviary::store::{DocumentStore, MemoryStore, WatchedStore};
use aviary::triggers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure uploads directory exists
    std::fs::create_dir_all(config.uploads_path())?;

    // Wire the consistency engine to the store
    let registry = Arc::new(triggers::registry());
    tracing::info!("Registered {} reactive triggers", registry.len());
    let store: Arc<dyn DocumentStore> =
        Arc::new(WatchedStore::new(Arc::new(MemoryStore::new()), registry));

    // Build app state
    let state = AppState {
        store,
        uploads_dir: config.uploads_path().clone(),
        config,
    };

    // Build router
    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    // Start server
    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    )
    .parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
