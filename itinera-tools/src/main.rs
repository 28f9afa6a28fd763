//! Itinera Tools
//!
//! Travel tool server speaking MCP (JSON-RPC over streamable HTTP). The
//! WeatherAnalyst stage leases a session here for the length of a run.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod rpc;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "itinera_tools=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Itinera Tools...");

    let addr = std::env::var("TOOLS_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8090".to_string());

    let app = rpc::create_router(Arc::new(rpc::Sessions::default()));

    info!(
        "Serving {} tools on {}/mcp",
        tools::catalog().len(),
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
