mod api;
mod middleware;

use std::sync::Arc;
use std::time::Duration;

use grocery_scraper::{build_adapters, Orchestrator};
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(grocery_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let stores = grocery_core::load_stores_or_default(&config.stores_path)?;
    let adapters = build_adapters(&config, &stores)?;
    let orchestrator = Arc::new(
        Orchestrator::new(adapters)
            .with_source_timeout(Duration::from_secs(config.source_timeout_secs)),
    );
    tracing::info!(
        env = %config.env,
        stores = ?orchestrator.stores(),
        "source adapters ready"
    );

    let state = AppState::new(Arc::clone(&orchestrator), config.max_results);
    let app = build_app(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
