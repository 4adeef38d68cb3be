//! # Fanout Server
//!
//! Runs the HTTP surface: health, metric snapshots, the SSE metric stream and
//! the cached completion endpoint.

use anyhow::Context;
use clap::Parser;
use fanout_core::config::ConfigLoader;
use fanout_core::logging::init_tracing;
use fanout_core::web::{create_app, state::AppState};
use fanout_core::AppContext;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "fanout-server")]
#[command(about = "Pub/sub broker, tiered response cache and analytics fan-out over HTTP")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Address to bind, overriding FANOUT_WEB__BIND_ADDRESS
    #[arg(short, long, env = "FANOUT_BIND")]
    bind: Option<String>,

    /// Load and validate configuration, print it, then exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = ConfigLoader::from_env().context("failed to load configuration")?;
    if cli.check_config {
        println!(
            "{}",
            serde_json::to_string_pretty(&ConfigLoader::sanitize_for_logging(&config))?
        );
        return Ok(());
    }

    let bind_address = cli
        .bind
        .unwrap_or_else(|| config.web.bind_address.clone());

    let context = Arc::new(
        AppContext::from_config(config)
            .await
            .context("failed to build application context")?,
    );
    context.start().await?;

    let app = create_app(AppState::new(Arc::clone(&context)));
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(bind_address = %bind_address, "Fanout server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    context.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
