mod aggregator;
mod analytics;
mod api;
mod config;
mod error;
mod fetcher;
mod git_analyzer;
mod model;
mod store;
mod workspace;

use anyhow::{Context, Result};
use config::Config;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("🚀 Repo Analytics API starting...");

    let config = Config::from_env()?;
    let workspace_root = config.engine.workspace_root.clone();

    let state = api::AppState {
        analyzer: Arc::new(analytics::Analyzer::new(&config.engine)),
        store: Arc::new(store::InMemoryStore::with_demo_teams()),
        cors_origin: Arc::from(config.cors_origin.as_str()),
    };
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("👂 Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Requests cancelled mid-clone release their own workspaces; this catches
    // anything a previous crash left behind.
    info!("🧹 Cleaning up temporary workspaces...");
    workspace::sweep_stale_workspaces(&workspace_root).await;

    info!("👋 Repo Analytics API shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("🛑 Shutdown signal received, draining in-flight requests..."),
        Err(err) => {
            error!("Failed to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(test)]
mod api_tests;
