use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use media_quota::{
    config::{Config, StoreBackend},
    create_app,
    database::{Database, InMemoryQuotaStore, PgQuotaStore},
    handlers::AppState,
    services::compression::CompressionEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "media_quota=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let engine = CompressionEngine::from_settings(config.compression.clone());
    if !engine.video_available() {
        tracing::warn!("No video encoder available; videos will pass through uncompressed");
    }

    let state = match config.store_backend {
        StoreBackend::Postgres => {
            let database = Database::new(&config.database_url).await?;
            database.migrate().await?;
            tracing::info!("Database migrations applied");
            AppState::new(config.clone(), Arc::new(PgQuotaStore::new(database)), engine).await?
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory quota store; usage is lost on restart");
            let store = Arc::new(InMemoryQuotaStore::with_default_catalog());
            AppState::new(config.clone(), store, engine).await?
        }
    };

    let app = create_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Media quota server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown handler: {}", e);
    }
    tracing::info!("Shutting down");
}
