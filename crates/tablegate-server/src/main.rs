//! Tablegate authentication service binary.

use std::sync::Arc;

use clap::Parser;
use tablegate_core::SledUserStore;
use tablegate_server::{create_router, AppState, Args, ServerConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablegate_server=info,tablegate_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = ServerConfig::from(args);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listen_addr,
        data_path = %config.data_path.display(),
        hash_cost = config.hash.cost,
        token_ttl_secs = config.token_ttl.as_secs(),
        "starting Tablegate"
    );

    let store = SledUserStore::open(&config.data_path)?;
    info!(users = store.len(), "user store opened");

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config, Arc::new(store.clone()))?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("listening on {}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.flush()?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl+c");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}
