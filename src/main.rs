//! lumen-hub server entry point.
//!
//! Starts the Axum HTTP server with the REST and WebSocket endpoints.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use lumen_hub::actions::ActionDispatcher;
use lumen_hub::app_state::AppState;
use lumen_hub::build_app;
use lumen_hub::bus::{Bus, PubSub};
use lumen_hub::config::HubConfig;
use lumen_hub::store::memory::MemoryStore;
use lumen_hub::store::postgres::PgStore;
use lumen_hub::store::Store;
use lumen_hub::ws::ConnectionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = HubConfig::from_env().map_err(|err| anyhow::anyhow!(err.to_string()))?;
    tracing::info!(addr = %config.listen_addr, "starting lumen-hub");

    // Build the bus and open its transport, exactly once
    let transport = PubSub::new(config.channel_capacity);
    let bus = Bus::new(transport, config.poll_interval());
    bus.connect().await?;

    // Select the store
    let store: Arc<dyn Store> = if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.database_connect_timeout_secs,
            ))
            .connect(&config.database_url)
            .await?;
        tracing::info!("connected to PostgreSQL store");
        Arc::new(PgStore::new(pool))
    } else {
        tracing::warn!("persistence disabled, running on a volatile in-memory store");
        Arc::new(MemoryStore::new())
    };

    // Build application state
    let dispatcher = Arc::new(ActionDispatcher::new(Arc::clone(&store), bus.clone()));
    let app_state = AppState {
        store,
        bus,
        registry: Arc::new(ConnectionRegistry::new()),
        dispatcher,
    };

    // Build router and serve
    let app = build_app(app_state);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
