mod aggregator;
mod api;
mod config;
mod contracts;
mod db;
mod error;
mod flow;
mod models;
mod odds;
mod parser;
mod prizes;
mod query;
mod refresher;
mod rpc;
mod tx;
mod units;

use std::sync::{Arc, Mutex};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Prize view starting...");

    let cfg = config::load()?;
    for net in &cfg.networks {
        info!(
            "  {} (chain {}): pool {}, ticket {}",
            net.name, net.chain_id, net.prize_pool, net.ticket.symbol
        );
    }

    // Run DB migrations once at startup
    {
        let conn = db::connect(&cfg.db_path)?;
        db::run_migrations(&conn)?;
    }

    let shared_conn = Arc::new(Mutex::new(db::connect(&cfg.db_path)?));
    let state = api::AppState::new(cfg, shared_conn)?;

    let api_handle = tokio::spawn({
        let state = state.clone();
        async move { api::serve(state).await }
    });

    let refresher_handle = tokio::spawn({
        let state = state.clone();
        async move { refresher::run(state).await }
    });

    // Graceful shutdown
    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        res = refresher_handle => match res {
            Ok(Ok(_)) => info!("Refresher exited cleanly"),
            Ok(Err(e)) => error!("Refresher error: {:?}", e),
            Err(e) => error!("Refresher task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("Prize view stopped.");
    Ok(())
}
