//! PineCone Game Server - telemetry-driven multiplayer catching game
//!
//! This is the main entry point for the game server. It runs:
//! - the telemetry ingestor reading the dashboard's live-devices stream
//! - the fixed-rate game loop
//! - WebSocket connections pushing world snapshots to viewers
//! - a health endpoint

mod app;
mod config;
mod game;
mod http;
mod telemetry;
mod util;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::GameLoop;
use crate::http::build_router;
use crate::telemetry::TelemetryIngestor;
use crate::util::shutdown::{shutdown_channel, wait_for_signal};
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    init_tracing(&config.log_level);
    init_server_time();

    info!("Starting PineCone Game Server");
    info!("Server address: {}", config.server_addr);
    info!("Telemetry upstream: {}", config.realtime_base_url);

    let state = AppState::new(config.clone());
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    // Telemetry ingestor
    let ingestor = TelemetryIngestor::new(&config, state.world.clone())?;
    let ingestor_task = tokio::spawn(ingestor.run(shutdown_rx.clone()));

    // Game loop
    let game_loop = GameLoop::new(
        state.world.clone(),
        config.game.clone(),
        state.broadcaster.clone(),
    );
    let game_task = tokio::spawn(game_loop.run(shutdown_rx.clone()));

    let router = build_router(state);

    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let mut server_shutdown = shutdown_rx;
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown_tx.trigger();
    });

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { server_shutdown.wait().await })
        .await?;

    let _ = tokio::join!(ingestor_task, game_task);

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
