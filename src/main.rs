//! `graphrun-server` binary entry point.

use std::sync::Arc;

use graphrun::cli::Cli;
use graphrun::config::ServerConfig;
use graphrun::engine::AgentGraph;
use graphrun::orchestrator::Orchestrator;
use graphrun::server::{router, AppState};
use graphrun::store::ThreadStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> graphrun::error::Result<()> {
    ServerConfig::load_dotenv();
    let cli = Cli::parse_args();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("graphrun={default_level},tower_http=info"))),
        )
        .init();

    let config = cli.load_config()?;
    let addr = config.socket_addr()?;
    info!(?config, "starting graphrun-server");

    let engine = AgentGraph::from_config(&config)?;
    let store = Arc::new(ThreadStore::new());
    let orchestrator = Orchestrator::new(store, Arc::new(engine)).with_idle_timeout(config.idle_timeout());
    let app = router(AppState::new(orchestrator));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            warn!("received Ctrl+C, shutting down");
        })
        .await?;

    Ok(())
}
