//! Context graph server
//!
//! Collects a point-in-time graph of the cluster's resources and their
//! relations on every request and serves it over HTTP.

use anyhow::Result;
use context_graph_server::{api, config::ServerConfig, SERVER_VERSION};
use graph_lib::{GraphService, GraphState};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting context-graph-server");

    let config = ServerConfig::load()?;
    info!(
        port = config.port,
        num_workers = config.num_workers,
        testing = config.testing,
        "Server configured"
    );

    let state = GraphState::builder()
        .config(config.collector_config())
        .fetcher(config.fetcher()?)
        .build()
        .await?;
    state
        .logger
        .log_startup(SERVER_VERSION, config.port, config.testing);

    let app_state = Arc::new(api::AppState::new(GraphService::new(state.clone())));
    state.health.set_ready(true).await;

    tokio::select! {
        result = api::serve(config.port, app_state) => {
            if let Err(e) = &result {
                error!(error = %e, "API server stopped");
            }
            state.logger.log_shutdown("API server stopped");
            result
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            state.logger.log_shutdown("SIGINT received");
            info!("Shutting down");
            Ok(())
        }
    }
}
