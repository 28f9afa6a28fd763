//! Itinera API
//!
//! HTTP service for the travel planner. Conversations and their messages
//! live in Postgres; sending a message runs the Researcher, WeatherAnalyst
//! and Planner stages and streams their progress back as server-sent events.

use anyhow::{Context, Result};
use itinera_pipeline::mcp::McpConnector;
use itinera_pipeline::ollama::OllamaBackend;
use itinera_pipeline::{PipelineBridge, StageAdapter, catalog};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod db;
mod repository;
mod service;
mod store;
#[cfg(test)]
mod testing;

use crate::api::AppState;
use crate::config::Config;
use crate::store::PgConversationStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "itinera_api=debug,itinera_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Itinera API...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(
        "Loaded configuration: model={}, ollama={}, tools={}",
        config.model_id,
        config.ollama_host,
        config.mcp_server_url.as_deref().unwrap_or("disabled")
    );

    info!("Connecting to database...");
    let pool = connect_with_retry(&config.database_url).await?;
    info!("Database connection pool created");

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let bridge = build_bridge(&config)?;
    info!("Pipeline ready: {}", bridge.stages().join(" -> "));

    let addr = config.bind_addr.clone();
    let state = AppState {
        store: Arc::new(PgConversationStore::new(pool)),
        bridge: Arc::new(bridge),
        config: Arc::new(config),
    };

    // Build router with all API endpoints
    let app = api::create_router(state);

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Itinera API stopped");
    Ok(())
}

/// Wire the travel planner stages to Ollama and, when configured, the tool server
fn build_bridge(config: &Config) -> Result<PipelineBridge> {
    let backend = OllamaBackend::new(
        config.ollama_host.clone(),
        config.model_id.clone(),
        config.max_tool_rounds,
    );
    let adapter = StageAdapter::new(backend, catalog::travel_planner(), config.stage_timeout);
    let stages = adapter.stage_names();

    let bridge = PipelineBridge::new(stages, Arc::new(adapter)).context("Invalid stage list")?;

    Ok(match &config.mcp_server_url {
        Some(url) => {
            let connector = McpConnector::new(url.clone(), config.tool_timeout)
                .context("Failed to build tool server client")?;
            bridge
                .with_tools(Arc::new(connector))
                .with_tool_timeout(config.tool_timeout)
        }
        None => {
            warn!("MCP_SERVER_URL is empty; stages run without tools");
            bridge
        }
    })
}

/// Connect to Postgres with retry logic and exponential backoff
///
/// The database may still be starting when the API comes up.
async fn connect_with_retry(database_url: &str) -> Result<PgPool> {
    const MAX_RETRIES: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        match db::create_pool(database_url).await {
            Ok(pool) => {
                if attempt > 1 {
                    info!("Connected to database after {} attempt(s)", attempt);
                }
                return Ok(pool);
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    return Err(e).context(format!(
                        "Failed to connect to database after {} attempts",
                        MAX_RETRIES
                    ));
                }

                warn!(
                    "Failed to connect to database (attempt {}/{}): {}",
                    attempt, MAX_RETRIES, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                // Exponential backoff with cap
                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
